//! Maps a (transaction type, flag set, metadata deltas) tuple onto zero or more semantic events.
//!
//! A single transaction can yield several events: a cross-currency payment that consumes two
//! resting offers yields one `MarketTrade` for the taker plus an `OfferFill` for each offer owner.
//! Classification follows a strict priority order per candidate object, and every decision is
//! driven by exhaustive matching over the typed deltas — never by probing loose field maps.

use thiserror::Error;
use xrc_common::Amount;

use crate::{
    config::WatchedAccounts,
    ledger_types::{ClassifiedEvent, EventKind, FillKind, TxEnvelope, TxHash, TxType},
    meta_diff::{balance_changes, ChangeKind, LedgerObjectDelta, OfferDelta},
};

#[derive(Debug, Clone, Error)]
pub enum ClassifyError {
    /// The transaction type is not modeled. Dropped and logged by the driver, never fatal.
    #[error("unclassifiable transaction type {tx_type} in {tx_hash}")]
    UnclassifiableTransaction { tx_type: String, tx_hash: TxHash },
    /// The ledger data contradicts itself (e.g. an offer field changed currency between its
    /// before and after snapshots). Surfaced, never silently coerced.
    #[error("data integrity violation in {tx_hash}: {reason}")]
    DataIntegrity { tx_hash: TxHash, reason: String },
}

/// The classifier's verdict on one transaction. `skipped` holds the parts that could not be
/// reconciled (a fill whose amounts were uncomputable, a malformed required field); the rest of
/// the transaction's events still emit, per the error-handling policy.
#[derive(Debug, Default)]
pub struct ClassifierOutput {
    pub events: Vec<ClassifiedEvent>,
    pub skipped: Vec<ClassifyError>,
}

impl ClassifierOutput {
    fn event(&mut self, tx: &TxEnvelope, kind: EventKind) {
        self.events.push(ClassifiedEvent {
            tx_hash: tx.hash.clone(),
            ledger_index: tx.ledger_index,
            timestamp: tx.timestamp(),
            account: tx.account.clone(),
            kind,
        });
    }

    fn skip(&mut self, tx: &TxEnvelope, reason: impl Into<String>) {
        self.skipped.push(ClassifyError::DataIntegrity { tx_hash: tx.hash.clone(), reason: reason.into() });
    }
}

/// Classifies one finalized transaction against its delta set.
///
/// Returns `Err` only for transaction types the engine does not model; everything else returns an
/// output whose `events` may be empty (e.g. a payment between two unwatched accounts).
pub fn classify(
    tx: &TxEnvelope,
    deltas: &[LedgerObjectDelta],
    watched: &WatchedAccounts,
) -> Result<ClassifierOutput, ClassifyError> {
    match &tx.tx_type {
        TxType::Payment => Ok(classify_payment(tx, deltas, watched)),
        TxType::OfferCreate => Ok(classify_offer_create(tx, deltas)),
        TxType::OfferCancel => Ok(classify_offer_cancel(tx)),
        TxType::Other(t) => {
            Err(ClassifyError::UnclassifiableTransaction { tx_type: t.clone(), tx_hash: tx.hash.clone() })
        },
    }
}

fn classify_payment(tx: &TxEnvelope, deltas: &[LedgerObjectDelta], watched: &WatchedAccounts) -> ClassifierOutput {
    let mut out = ClassifierOutput::default();
    let Some(amount) = tx.amount.as_ref() else {
        out.skip(tx, "payment without an Amount field");
        return out;
    };
    let delivered = tx.meta.delivered_amount.as_ref().unwrap_or(amount);

    // A payment whose SendMax denominates a different asset than the delivered amount is a
    // currency conversion that crossed the books, not a transfer.
    let is_conversion = tx.send_max.as_ref().map(|max| !max.same_asset(delivered)).unwrap_or(false);
    if is_conversion {
        let (sold, bought) = taker_flows(tx, deltas);
        out.event(tx, EventKind::MarketTrade { sold, bought });
        emit_offer_fills(tx, deltas, &mut out, None);
        return out;
    }

    match &tx.destination {
        Some(destination) if *destination != tx.account => {
            if watched.contains(destination) {
                out.event(tx, EventKind::Deposit {
                    watched: destination.clone(),
                    counterparty: tx.account.clone(),
                    amount: delivered.clone(),
                });
            }
            if watched.contains(&tx.account) {
                out.event(tx, EventKind::Withdrawal {
                    watched: tx.account.clone(),
                    counterparty: destination.clone(),
                    amount: delivered.clone(),
                });
            }
        },
        Some(_) => {}, // single-currency self payment moves nothing the engine tracks
        None => out.skip(tx, "payment without a Destination field"),
    }
    out
}

fn classify_offer_create(tx: &TxEnvelope, deltas: &[LedgerObjectDelta]) -> ClassifierOutput {
    let mut out = ClassifierOutput::default();
    let own_offer = deltas.iter().find_map(|delta| match delta {
        LedgerObjectDelta::Offer(offer) if offer.owner == tx.account && offer.sequence == tx.sequence => Some(offer),
        _ => None,
    });
    match own_offer {
        // A surviving ledger object: the order is open, possibly already partially crossed (the
        // object's amounts are then lower than the transaction's).
        Some(offer) if matches!(offer.change, ChangeKind::Created | ChangeKind::Modified) => {
            match (tx.taker_gets.as_ref(), tx.taker_pays.as_ref()) {
                (Some(gets), Some(pays)) => out.event(tx, EventKind::OfferOpen {
                    owner: tx.account.clone(),
                    sequence: tx.sequence,
                    taker_gets: gets.clone(),
                    taker_pays: pays.clone(),
                    remaining_gets: offer.taker_gets.after.clone(),
                    remaining_pays: offer.taker_pays.after.clone(),
                }),
                _ => out.skip(tx, "OfferCreate without TakerGets/TakerPays"),
            }
        },
        // The offer was consumed within its own transaction: either its object was created and
        // deleted atomically, or it crossed completely and no object was ever written. Opened and
        // closed in one step, so a single full fill and no open.
        _ => out.event(tx, EventKind::OfferFill {
            owner: tx.account.clone(),
            sequence: tx.sequence,
            fill: FillKind::Full,
            taken: tx.taker_gets.clone(),
            paid: tx.taker_pays.clone(),
            counterparty: None,
        }),
    }
    // Pre-existing offers consumed by the crossing belong to their own owners.
    emit_offer_fills(tx, deltas, &mut out, Some(tx.sequence));
    out
}

fn classify_offer_cancel(tx: &TxEnvelope) -> ClassifierOutput {
    let mut out = ClassifierOutput::default();
    match tx.offer_sequence {
        Some(sequence) => out.event(tx, EventKind::OfferCancel { owner: tx.account.clone(), sequence }),
        None => out.skip(tx, "OfferCancel without an OfferSequence field"),
    }
    out
}

/// Emits an `OfferFill` for every pre-existing offer the transaction modified or deleted.
/// `own_sequence` excludes the transaction's own offer object (handled separately by the
/// OfferCreate rules).
fn emit_offer_fills(
    tx: &TxEnvelope,
    deltas: &[LedgerObjectDelta],
    out: &mut ClassifierOutput,
    own_sequence: Option<u32>,
) {
    for delta in deltas {
        let LedgerObjectDelta::Offer(offer) = delta else { continue };
        if offer.owner == tx.account && Some(offer.sequence) == own_sequence {
            continue;
        }
        match fill_from_offer_delta(tx, offer) {
            Ok(Some(kind)) => out.event(tx, kind),
            Ok(None) => {},
            Err(e) => out.skipped.push(e),
        }
    }
}

/// Derives a fill event from one touched offer object, if the touch was a fill.
///
/// A deleted offer is a full fill: its consumed amounts are `before − after` when both snapshots
/// are known, else whatever the last snapshot recorded. A modified offer is a partial fill only
/// when its amounts strictly decreased.
fn fill_from_offer_delta(tx: &TxEnvelope, offer: &OfferDelta) -> Result<Option<EventKind>, ClassifyError> {
    let integrity = |e| ClassifyError::DataIntegrity {
        tx_hash: tx.hash.clone(),
        reason: format!("offer {}/{}: {e}", offer.owner, offer.sequence),
    };
    let consumed_gets = offer.taker_gets.consumed().map_err(integrity)?;
    let consumed_pays = offer.taker_pays.consumed().map_err(integrity)?;
    let counterparty = (offer.owner != tx.account).then(|| tx.account.clone());
    match offer.change {
        ChangeKind::Created => Ok(None),
        ChangeKind::Deleted => {
            let last = |field: &crate::meta_diff::FieldDelta<Amount>| field.after.clone().or_else(|| field.before.clone());
            Ok(Some(EventKind::OfferFill {
                owner: offer.owner.clone(),
                sequence: offer.sequence,
                fill: FillKind::Full,
                taken: consumed_gets.or_else(|| last(&offer.taker_gets)),
                paid: consumed_pays.or_else(|| last(&offer.taker_pays)),
                counterparty,
            }))
        },
        ChangeKind::Modified => {
            if consumed_gets.is_none() && consumed_pays.is_none() {
                return Ok(None);
            }
            Ok(Some(EventKind::OfferFill {
                owner: offer.owner.clone(),
                sequence: offer.sequence,
                fill: FillKind::Partial,
                taken: consumed_gets,
                paid: consumed_pays,
                counterparty,
            }))
        },
    }
}

/// What the payment's submitting account gave and received, read off its balance changes. The
/// first negative movement is the sold side, the first positive one the bought side.
fn taker_flows(tx: &TxEnvelope, deltas: &[LedgerObjectDelta]) -> (Option<Amount>, Option<Amount>) {
    let mut sold = None;
    let mut bought = None;
    for change in balance_changes(deltas) {
        if change.account != tx.account {
            continue;
        }
        if change.delta.is_negative() && sold.is_none() {
            sold = Some(change.delta.abs());
        } else if !change.delta.is_negative() && !change.delta.is_zero() && bought.is_none() {
            bought = Some(change.delta);
        }
    }
    (sold, bought)
}
