//! The keyed order-lifecycle state machine: one entry per (owner, sequence), consuming classified
//! events in ledger order.
//!
//! The tracker trusts its caller to present events in non-decreasing ledger-index order per order
//! key — it does not resequence. A stale event is rejected with an explicit error; an event that
//! would violate an order invariant freezes the order so that no further automatic mutation can
//! compound the inconsistency.

use std::collections::HashMap;

use log::*;
use thiserror::Error;
use xrc_common::Amount;

use crate::ledger_types::{
    AuditNote,
    CancellationMarker,
    ClassifiedEvent,
    EventKind,
    FillKind,
    Order,
    OrderKey,
    OrderStatus,
    Trade,
    TxHash,
};

#[derive(Debug, Clone, Error)]
pub enum TrackerError {
    /// An event arrived below the order's last-updated ledger index. The caller must deliver
    /// events in non-decreasing ledger order per key.
    #[error("stale event {tx_hash} for order {key}: ledger {event_ledger} precedes last update at {last_ledger}")]
    StaleEvent { key: OrderKey, tx_hash: TxHash, event_ledger: u32, last_ledger: u32 },
    /// Applying the event would leave the order provably inconsistent. The order has been frozen
    /// and flagged for manual reconciliation.
    #[error("order {key} invariant violated by {tx_hash}: {reason}")]
    OrderInvariantViolation { key: OrderKey, tx_hash: TxHash, reason: String },
}

/// The result of applying one event: the order's post-application snapshot, plus the trade the
/// event produced, if any.
#[derive(Debug, Clone)]
pub struct AppliedUpdate {
    pub order: Order,
    pub new_trade: Option<Trade>,
    /// True when the entry was synthesized by the cold-start fallback during this application.
    pub synthesized: bool,
}

#[derive(Debug, Default)]
pub struct OrderTracker {
    orders: HashMap<OrderKey, Order>,
}

impl OrderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hydrates the tracker with previously persisted order state.
    pub fn insert(&mut self, order: Order) {
        self.orders.insert(order.key(), order);
    }

    pub fn contains(&self, key: &OrderKey) -> bool {
        self.orders.contains_key(key)
    }

    pub fn get(&self, key: &OrderKey) -> Option<&Order> {
        self.orders.get(key)
    }

    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    /// Applies one classified event. Events that do not address an order return `Ok(None)`.
    pub fn apply(&mut self, event: &ClassifiedEvent) -> Result<Option<AppliedUpdate>, TrackerError> {
        let Some(key) = event.kind.order_key() else {
            return Ok(None);
        };
        match &event.kind {
            EventKind::OfferOpen { taker_gets, taker_pays, remaining_gets, remaining_pays, .. } => {
                self.apply_open(key, event, taker_gets, taker_pays, remaining_gets.clone(), remaining_pays.clone())
            },
            EventKind::OfferFill { fill, taken, paid, counterparty, .. } => {
                self.apply_fill(key, event, *fill, taken.clone(), paid.clone(), counterparty.clone())
            },
            EventKind::OfferCancel { .. } => self.apply_cancel(key, event).map(Some),
            _ => Ok(None),
        }
    }

    fn apply_open(
        &mut self,
        key: OrderKey,
        event: &ClassifiedEvent,
        taker_gets: &Amount,
        taker_pays: &Amount,
        remaining_gets: Option<Amount>,
        remaining_pays: Option<Amount>,
    ) -> Result<Option<AppliedUpdate>, TrackerError> {
        if let Some(order) = self.orders.get_mut(&key) {
            if order.is_terminal() {
                note(order, event, "OfferOpen received after terminal status");
                return Ok(Some(update(order, None, false)));
            }
            if order.created_tx_hash.is_none() {
                // The cold-start fallback created this entry from a fill that overtook its open.
                // Backfill the creation details; remaining amounts stay as the fills left them.
                debug!("📈️ Backfilling synthesized order {key} from late OfferOpen {}", event.tx_hash);
                order.created_tx_hash = Some(event.tx_hash.clone());
                order.created_ledger_index = Some(event.ledger_index);
                order.created_at = event.timestamp;
                order.original_taker_gets = Some(taker_gets.clone());
                order.original_taker_pays = Some(taker_pays.clone());
                return Ok(Some(update(order, None, false)));
            }
            warn!("📈️ Duplicate OfferOpen {} for existing order {key}; ignored", event.tx_hash);
            return Ok(None);
        }
        let order = Order::open(
            key.clone(),
            event.tx_hash.clone(),
            event.ledger_index,
            event.timestamp,
            taker_gets.clone(),
            taker_pays.clone(),
            remaining_gets,
            remaining_pays,
        );
        debug!("📈️ Order {key} opened by {}", event.tx_hash);
        let snapshot = update(&order, None, false);
        self.orders.insert(key, order);
        Ok(Some(snapshot))
    }

    fn apply_fill(
        &mut self,
        key: OrderKey,
        event: &ClassifiedEvent,
        fill: FillKind,
        taken: Option<Amount>,
        paid: Option<Amount>,
        counterparty: Option<crate::ledger_types::AccountId>,
    ) -> Result<Option<AppliedUpdate>, TrackerError> {
        let (order, synthesized) = entry_or_synthesize(&mut self.orders, &key, event);
        if let Some(guarded) = guard(order, event)? {
            return Ok(Some(guarded));
        }

        // A full fill with no explicit amounts consumed whatever was still resting.
        let taken = taken.or_else(|| match fill {
            FillKind::Full => order.remaining_taker_gets.clone(),
            FillKind::Partial => None,
        });
        let paid = paid.or_else(|| match fill {
            FillKind::Full => order.remaining_taker_pays.clone(),
            FillKind::Partial => None,
        });

        match fill {
            FillKind::Full => {
                order.remaining_taker_gets = order.remaining_taker_gets.as_ref().map(Amount::zero_like);
                order.remaining_taker_pays = order.remaining_taker_pays.as_ref().map(Amount::zero_like);
                order.status = OrderStatus::Filled;
            },
            FillKind::Partial => {
                // Compute both sides before committing either, so a rejected fill leaves the
                // order exactly as it was.
                let new_gets = reduced(&key, event, &order.remaining_taker_gets, &taken, "TakerGets");
                let new_pays = reduced(&key, event, &order.remaining_taker_pays, &paid, "TakerPays");
                let (new_gets, new_pays) = match (new_gets, new_pays) {
                    (Ok(gets), Ok(pays)) => (gets, pays),
                    (Err(e), _) | (_, Err(e)) => return Err(freeze(order, event, e)),
                };
                order.remaining_taker_gets = new_gets;
                order.remaining_taker_pays = new_pays;
                let gets_exhausted = order.remaining_taker_gets.as_ref().map(Amount::is_zero).unwrap_or(false);
                if gets_exhausted {
                    // Nothing left to give: the order is filled, any dust on the pays side clamps.
                    order.remaining_taker_pays = order.remaining_taker_pays.as_ref().map(Amount::zero_like);
                    order.status = OrderStatus::Filled;
                } else {
                    order.status = OrderStatus::PartiallyFilled;
                }
            },
        }
        let trade = Trade {
            tx_hash: event.tx_hash.clone(),
            ledger_index: event.ledger_index,
            timestamp: event.timestamp,
            taken,
            paid,
            counterparty,
        };
        order.trades.push(trade.clone());
        order.last_updated_ledger = event.ledger_index;
        debug!("📈️ Order {key} now {} after fill {}", order.status, event.tx_hash);
        Ok(Some(update(order, Some(trade), synthesized)))
    }

    fn apply_cancel(&mut self, key: OrderKey, event: &ClassifiedEvent) -> Result<AppliedUpdate, TrackerError> {
        let (order, synthesized) = entry_or_synthesize(&mut self.orders, &key, event);
        if let Some(guarded) = guard(order, event)? {
            return Ok(guarded);
        }
        order.canceled_by =
            Some(CancellationMarker { tx_hash: event.tx_hash.clone(), ledger_index: event.ledger_index });
        if order.trades.is_empty() {
            order.status = OrderStatus::Canceled;
        }
        // With prior fills the status stays PartiallyFilled; the marker carries the cancellation.
        order.last_updated_ledger = event.ledger_index;
        debug!("📈️ Order {key} canceled by {}", event.tx_hash);
        Ok(update(order, None, synthesized))
    }

}

/// The cold-start fallback: fills and cancels for orders created before the engine began
/// observing synthesize a minimal open entry, so they are never dropped.
fn entry_or_synthesize<'a>(
    orders: &'a mut HashMap<OrderKey, Order>,
    key: &OrderKey,
    event: &ClassifiedEvent,
) -> (&'a mut Order, bool) {
    let mut synthesized = false;
    let order = orders.entry(key.clone()).or_insert_with(|| {
        info!(
            "📈️ No recorded open for order {key}; synthesizing an entry with unknown originals (event {})",
            event.tx_hash
        );
        synthesized = true;
        Order::synthesized(key.clone(), event.ledger_index)
    });
    (order, synthesized)
}

/// Shared admission checks for mutating events: terminal and frozen orders only collect audit
/// notes, and events below the order's high-water ledger index are rejected as stale.
fn guard(order: &mut Order, event: &ClassifiedEvent) -> Result<Option<AppliedUpdate>, TrackerError> {
    if order.frozen {
        note(order, event, format!("{} ignored: order is frozen", event.kind.name()));
        return Ok(Some(update(order, None, false)));
    }
    if order.is_terminal() {
        note(order, event, format!("{} received after terminal status", event.kind.name()));
        return Ok(Some(update(order, None, false)));
    }
    if event.ledger_index < order.last_updated_ledger {
        return Err(TrackerError::StaleEvent {
            key: order.key(),
            tx_hash: event.tx_hash.clone(),
            event_ledger: event.ledger_index,
            last_ledger: order.last_updated_ledger,
        });
    }
    Ok(None)
}

/// The remaining amount on one side after consuming the filled amount. Sides with unknown
/// remaining (synthesized orders) stay unknown.
fn reduced(
    key: &OrderKey,
    event: &ClassifiedEvent,
    remaining: &Option<Amount>,
    consumed: &Option<Amount>,
    side: &str,
) -> Result<Option<Amount>, TrackerError> {
    let (Some(current), Some(consumed)) = (remaining.as_ref(), consumed.as_ref()) else {
        return Ok(remaining.clone());
    };
    let violation = |reason: String| TrackerError::OrderInvariantViolation {
        key: key.clone(),
        tx_hash: event.tx_hash.clone(),
        reason,
    };
    let new = current
        .checked_sub(consumed)
        .map_err(|e| violation(format!("{side}: {e}")))?;
    if new.is_negative() {
        return Err(violation(format!("{side} remaining would go negative ({current} - {consumed})")));
    }
    Ok(Some(new))
}

fn freeze(order: &mut Order, event: &ClassifiedEvent, error: TrackerError) -> TrackerError {
    error!("📈️ {error}. Freezing order for manual reconciliation.");
    order.frozen = true;
    note(order, event, format!("frozen: {error}"));
    error
}

fn note(order: &mut Order, event: &ClassifiedEvent, text: impl Into<String>) {
    let text = text.into();
    debug!("📈️ Order {}: {text} (event {})", order.key(), event.tx_hash);
    order.notes.push(AuditNote { tx_hash: event.tx_hash.clone(), ledger_index: event.ledger_index, note: text });
}

fn update(order: &Order, new_trade: Option<Trade>, synthesized: bool) -> AppliedUpdate {
    AppliedUpdate { order: order.clone(), new_trade, synthesized }
}
