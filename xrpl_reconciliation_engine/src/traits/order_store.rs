use crate::{
    ledger_types::{Order, OrderKey, Trade},
    traits::StoreError,
};

/// Durable order lifecycle state, addressed by the (owner, sequence) primary key.
///
/// Whether trades are embedded in the order document or normalized into their own table is the
/// backend's choice; `fetch_order` must return the order with its full trade history either way.
#[allow(async_fn_in_trait)]
pub trait OrderStore {
    async fn fetch_order(&self, key: &OrderKey) -> Result<Option<Order>, StoreError>;

    /// Inserts or replaces the order snapshot for its (owner, sequence) key.
    async fn upsert_order(&self, order: &Order) -> Result<(), StoreError>;

    /// Appends one trade to the order's history. Trades are immutable and append-only.
    async fn append_trade(&self, key: &OrderKey, trade: &Trade) -> Result<(), StoreError>;
}
