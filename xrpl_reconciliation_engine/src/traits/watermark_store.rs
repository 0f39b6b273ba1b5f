use crate::{ledger_types::AccountId, traits::StoreError};

/// Persists, per account, the index of the last ledger whose transactions were fully reconciled.
///
/// The driver writes the watermark after completing a batch and before starting the next one, so
/// a run aborted between transactions resumes without reprocessing a completed ledger range.
#[allow(async_fn_in_trait)]
pub trait WatermarkStore {
    /// The last fully processed ledger for the account, or `None` if the account has never been
    /// reconciled.
    async fn last_processed_ledger(&self, account: &AccountId) -> Result<Option<u32>, StoreError>;

    async fn set_last_processed_ledger(&self, account: &AccountId, ledger_index: u32) -> Result<(), StoreError>;
}
