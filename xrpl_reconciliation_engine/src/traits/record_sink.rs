use crate::{
    ledger_types::{AuditRecord, DepositWithdrawal, Order},
    traits::StoreError,
};

/// The three record streams the engine emits for downstream persistence.
///
/// Records are emitted verbatim; the sink stores them without interpretation. Deposit/withdrawal
/// records and trades are immutable, order snapshots supersede earlier snapshots of the same
/// order, and audit entries capture everything that could not be fully reconciled.
#[allow(async_fn_in_trait)]
pub trait RecordSink {
    async fn emit_transfer(&self, transfer: &DepositWithdrawal) -> Result<(), StoreError>;

    /// An order snapshot, emitted every time an order's status or remaining amounts change.
    async fn emit_order(&self, order: &Order) -> Result<(), StoreError>;

    async fn emit_audit(&self, record: &AuditRecord) -> Result<(), StoreError>;
}
