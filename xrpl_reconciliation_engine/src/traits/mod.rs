//! The engine's storage collaborator traits.
//!
//! The reconciliation driver is generic over a backend implementing these traits. Specific
//! backends (e.g. the bundled in-memory or SQLite stores, or an external document store) implement
//! them to persist watermarks, order state, and the emitted record streams.

mod order_store;
mod record_sink;
mod watermark_store;

use thiserror::Error;

pub use order_store::OrderStore;
pub use record_sink::RecordSink;
pub use watermark_store::WatermarkStore;

/// This trait defines the complete set of behaviour the reconciliation driver requires from a
/// storage backend:
/// * Watermark persistence, so an aborted run resumes from the last fully processed ledger.
/// * Durable order state, addressed by the (owner, sequence) primary key.
/// * The three emitted record streams (transfers, order snapshots, audit entries).
pub trait ReconciliationBackend: Clone + WatermarkStore + OrderStore + RecordSink {}

impl<T: Clone + WatermarkStore + OrderStore + RecordSink> ReconciliationBackend for T {}

/// Backend-agnostic storage error. Concrete backends convert their native errors into this at the
/// trait boundary.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),
    #[error("record serialization failed: {0}")]
    Serialization(String),
}
