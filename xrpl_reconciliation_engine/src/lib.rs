//! XRPL Reconciliation Engine
//!
//! This library reconstructs a normalized trading and settlement history for a configured set of
//! ledger accounts from the raw XRPL transaction stream: deposits, withdrawals, market trades, and
//! the full lifecycle of resting limit orders (open → filled / partially filled / canceled).
//!
//! The library is divided into four main stages, wired together by the [`ReconciliationApi`]:
//! 1. The metadata differ ([`mod@meta_diff`]). Turns a transaction's affected-node list into
//!    normalized per-object deltas with typed before/after values.
//! 2. The transaction classifier ([`mod@classifier`]). Maps a (transaction type, flags, deltas)
//!    tuple onto zero or more semantic events: deposit, withdrawal, market trade, offer open,
//!    offer fill, offer cancel.
//! 3. The order lifecycle tracker ([`mod@order_tracker`]). A keyed state machine, one entry per
//!    (owner, sequence), that consumes classified events in ledger order.
//! 4. The reconciliation driver ([`mod@reconciler`]). Orchestrates one account's batch and emits
//!    the resulting records through the storage collaborator traits in [`mod@traits`].
//!
//! Storage is pluggable. Any backend implementing the collaborator traits can be used; the crate
//! ships an in-memory store and, behind the default `sqlite` feature, a SQLite store.

pub mod classifier;
pub mod config;
pub mod db;
pub mod helpers;
pub mod ledger_types;
pub mod meta_diff;
pub mod order_tracker;
pub mod reconciler;
pub mod traits;

pub use classifier::{classify, ClassifierOutput, ClassifyError};
pub use config::{ConfigHandle, ReconcilerConfig, WatchedAccounts};
pub use db::MemoryStore;
#[cfg(feature = "sqlite")]
pub use db::SqliteStore;
pub use meta_diff::diff_tx;
pub use order_tracker::{OrderTracker, TrackerError};
pub use reconciler::{BatchSummary, ReconciliationApi, ReconciliationError};
pub use traits::{OrderStore, ReconciliationBackend, RecordSink, StoreError, WatermarkStore};
