//! The reconciliation driver: orchestrates processing of one account's transaction batches.
//!
//! For each transaction the driver runs the differ and the classifier, routes transfer events
//! straight to emission, and feeds offer-lifecycle events through the order tracker — hydrating
//! order state from the backend on first touch and persisting every change. Each stream only
//! mutates orders owned by its own account; everything else it observes is informational and goes
//! to the audit stream, so two accounts' streams never contend on writes.

use std::fmt::Debug;

use futures_util::{Stream, StreamExt};
use log::*;
use thiserror::Error;

use crate::{
    classifier::{classify, ClassifyError},
    config::WatchedAccounts,
    ledger_types::{
        AccountId,
        AuditRecord,
        ClassifiedEvent,
        DepositWithdrawal,
        EventKind,
        TransferDirection,
        TxEnvelope,
    },
    meta_diff::diff_tx,
    order_tracker::{OrderTracker, TrackerError},
    traits::{ReconciliationBackend, StoreError},
};

#[derive(Debug, Clone, Error)]
pub enum ReconciliationError {
    #[error("storage backend error: {0}")]
    Store(#[from] StoreError),
}

/// Per-batch accounting, returned to the caller for its own logging. Every input transaction is
/// counted exactly once as classified, uneventful, or skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Transactions processed in this batch.
    pub processed: usize,
    /// Transactions that yielded at least one event.
    pub classified: usize,
    /// Transactions that were recognized but produced no events for this stream.
    pub uneventful: usize,
    /// Transactions dropped whole: failed on ledger, or of an unmodeled type.
    pub skipped: usize,
    /// Events emitted across the batch.
    pub events: usize,
    /// Recoverable event-level problems: dropped fills, stale events, invariant violations.
    pub errors: usize,
}

/// `ReconciliationApi` is the primary entry point for reconstructing an account's settlement
/// history from its raw transaction stream.
pub struct ReconciliationApi<B> {
    backend: B,
}

impl<B> Debug for ReconciliationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi")
    }
}

impl<B> ReconciliationApi<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B> ReconciliationApi<B>
where B: ReconciliationBackend
{
    /// The ledger index the next fetch for this account should start from: one past the stored
    /// watermark, or the configured floor for an account never reconciled before.
    pub async fn next_start_ledger(&self, account: &AccountId, floor: u32) -> Result<u32, ReconciliationError> {
        let start = match self.backend.last_processed_ledger(account).await? {
            Some(watermark) => watermark.saturating_add(1),
            None => floor,
        };
        Ok(start)
    }

    /// Processes one ledger-ordered batch of transactions for `account`.
    ///
    /// The batch must be ordered by ledger index, then by position within the ledger — the order
    /// tracker's invariants depend on it. On success the account's watermark is advanced to the
    /// batch's highest ledger index, so an aborted run resumes cleanly at the next batch.
    pub async fn process_batch(
        &self,
        account: &AccountId,
        watched: &WatchedAccounts,
        batch: &[TxEnvelope],
    ) -> Result<BatchSummary, ReconciliationError> {
        let mut tracker = OrderTracker::new();
        let mut summary = BatchSummary::default();
        let mut high_water = None;
        for tx in batch {
            self.process_tx(account, watched, tx, &mut tracker, &mut summary).await?;
            summary.processed += 1;
            high_water = high_water.max(Some(tx.ledger_index));
        }
        if let Some(ledger_index) = high_water {
            self.backend.set_last_processed_ledger(account, ledger_index).await?;
            debug!("🔄️ Watermark for {account} advanced to ledger {ledger_index}");
        }
        info!(
            "🔄️ Batch complete for {account}: {} transactions, {} events, {} skipped, {} errors",
            summary.processed, summary.events, summary.skipped, summary.errors
        );
        Ok(summary)
    }

    /// Drives reconciliation from an async stream of batches, one in-flight batch at a time.
    /// Batches must arrive in ledger order; within the stream the account's processing is strictly
    /// sequential.
    pub async fn run<S>(
        &self,
        account: &AccountId,
        watched: &WatchedAccounts,
        mut batches: S,
    ) -> Result<Vec<BatchSummary>, ReconciliationError>
    where
        S: Stream<Item = Vec<TxEnvelope>> + Unpin,
    {
        let mut summaries = Vec::new();
        while let Some(batch) = batches.next().await {
            summaries.push(self.process_batch(account, watched, &batch).await?);
        }
        Ok(summaries)
    }

    async fn process_tx(
        &self,
        account: &AccountId,
        watched: &WatchedAccounts,
        tx: &TxEnvelope,
        tracker: &mut OrderTracker,
        summary: &mut BatchSummary,
    ) -> Result<(), ReconciliationError> {
        if !tx.succeeded() {
            let result = tx.meta.result.clone().unwrap_or_default();
            debug!("🔄️ Skipping failed transaction {} (ledger {}): {result}", tx.hash, tx.ledger_index);
            self.audit(tx, "transaction-failed", result).await?;
            summary.skipped += 1;
            return Ok(());
        }
        let deltas = diff_tx(tx);
        let output = match classify(tx, &deltas, watched) {
            Ok(output) => output,
            Err(e @ ClassifyError::UnclassifiableTransaction { .. }) => {
                warn!("🔄️ {} (ledger {}): {e}", tx.hash, tx.ledger_index);
                self.audit(tx, "unclassifiable", e.to_string()).await?;
                summary.skipped += 1;
                return Ok(());
            },
            Err(e) => {
                warn!("🔄️ {} (ledger {}): {e}", tx.hash, tx.ledger_index);
                self.audit(tx, "classification-error", e.to_string()).await?;
                summary.skipped += 1;
                return Ok(());
            },
        };
        for dropped in &output.skipped {
            warn!("🔄️ Dropped part of {} (ledger {}): {dropped}", tx.hash, tx.ledger_index);
            self.audit(tx, "partial-classification", dropped.to_string()).await?;
            summary.errors += 1;
        }
        if output.events.is_empty() {
            debug!("🔄️ Transaction {} (ledger {}) produced no events for this stream", tx.hash, tx.ledger_index);
            summary.uneventful += 1;
            return Ok(());
        }
        summary.classified += 1;
        for event in &output.events {
            self.route_event(account, event, tracker, summary).await?;
        }
        Ok(())
    }

    async fn route_event(
        &self,
        account: &AccountId,
        event: &ClassifiedEvent,
        tracker: &mut OrderTracker,
        summary: &mut BatchSummary,
    ) -> Result<(), ReconciliationError> {
        summary.events += 1;
        match &event.kind {
            EventKind::Deposit { watched, counterparty, amount } => {
                self.emit_transfer(account, event, TransferDirection::Deposit, watched, counterparty, amount).await
            },
            EventKind::Withdrawal { watched, counterparty, amount } => {
                self.emit_transfer(account, event, TransferDirection::Withdrawal, watched, counterparty, amount).await
            },
            // Market trades have no resting order to attach to; they are recorded verbatim on the
            // audit stream.
            EventKind::MarketTrade { .. } => self.audit_event(event, "market-trade").await,
            EventKind::OfferOpen { owner, .. }
            | EventKind::OfferFill { owner, .. }
            | EventKind::OfferCancel { owner, .. } => {
                if owner != account {
                    // Another account's order. Its own stream holds write authority; from here
                    // this is an informational observation.
                    return self.audit_event(event, "counterparty-offer-event").await;
                }
                self.apply_order_event(event, tracker, summary).await
            },
        }
    }

    async fn emit_transfer(
        &self,
        account: &AccountId,
        event: &ClassifiedEvent,
        direction: TransferDirection,
        watched: &AccountId,
        counterparty: &AccountId,
        amount: &xrc_common::Amount,
    ) -> Result<(), ReconciliationError> {
        if watched != account {
            // The counterpart record belongs to the other watched account's stream.
            return Ok(());
        }
        let record = DepositWithdrawal {
            tx_hash: event.tx_hash.clone(),
            ledger_index: event.ledger_index,
            timestamp: event.timestamp,
            direction,
            account: watched.clone(),
            counterparty: counterparty.clone(),
            amount: amount.clone(),
        };
        self.backend.emit_transfer(&record).await?;
        debug!("🔄️ {direction} of {amount} recorded for {account} ({})", event.tx_hash);
        Ok(())
    }

    async fn apply_order_event(
        &self,
        event: &ClassifiedEvent,
        tracker: &mut OrderTracker,
        summary: &mut BatchSummary,
    ) -> Result<(), ReconciliationError> {
        if let Some(key) = event.kind.order_key() {
            if !tracker.contains(&key) {
                if let Some(order) = self.backend.fetch_order(&key).await? {
                    tracker.insert(order);
                }
            }
        }
        match tracker.apply(event) {
            Ok(Some(update)) => {
                self.backend.upsert_order(&update.order).await?;
                if let Some(trade) = &update.new_trade {
                    self.backend.append_trade(&update.order.key(), trade).await?;
                }
                self.backend.emit_order(&update.order).await?;
            },
            Ok(None) => {},
            Err(e @ TrackerError::StaleEvent { .. }) => {
                warn!("🔄️ {e}");
                self.audit_event(event, "stale-event").await?;
                summary.errors += 1;
            },
            Err(e @ TrackerError::OrderInvariantViolation { .. }) => {
                error!("🔄️ {e}");
                self.audit_event(event, "order-invariant-violation").await?;
                summary.errors += 1;
                // Persist the frozen snapshot so the quarantine survives this run.
                if let Some(key) = event.kind.order_key() {
                    if let Some(order) = tracker.get(&key) {
                        self.backend.upsert_order(order).await?;
                        self.backend.emit_order(order).await?;
                    }
                }
            },
        }
        Ok(())
    }

    async fn audit(
        &self,
        tx: &TxEnvelope,
        reason: &str,
        detail: impl Into<String>,
    ) -> Result<(), ReconciliationError> {
        let record = AuditRecord::new(tx.hash.clone(), tx.ledger_index, reason, detail);
        self.backend.emit_audit(&record).await?;
        Ok(())
    }

    async fn audit_event(&self, event: &ClassifiedEvent, reason: &str) -> Result<(), ReconciliationError> {
        let detail = serde_json::to_string(event).unwrap_or_else(|e| format!("unserializable event: {e}"));
        let record = AuditRecord::new(event.tx_hash.clone(), event.ledger_index, reason, detail);
        self.backend.emit_audit(&record).await?;
        Ok(())
    }
}
