//! An in-memory backend. Embeds trades in their orders, and keeps every emitted record for
//! inspection — which makes it the natural harness for tests and dry runs.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;

use crate::{
    ledger_types::{AccountId, AuditRecord, DepositWithdrawal, Order, OrderKey, Trade},
    traits::{OrderStore, RecordSink, StoreError, WatermarkStore},
};

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    watermarks: HashMap<AccountId, u32>,
    orders: HashMap<OrderKey, Order>,
    transfers: Vec<DepositWithdrawal>,
    order_snapshots: Vec<Order>,
    audit_log: Vec<AuditRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn transfers(&self) -> Vec<DepositWithdrawal> {
        self.inner.lock().await.transfers.clone()
    }

    pub async fn order_snapshots(&self) -> Vec<Order> {
        self.inner.lock().await.order_snapshots.clone()
    }

    pub async fn audit_log(&self) -> Vec<AuditRecord> {
        self.inner.lock().await.audit_log.clone()
    }

    pub async fn order(&self, key: &OrderKey) -> Option<Order> {
        self.inner.lock().await.orders.get(key).cloned()
    }

    pub async fn order_count(&self) -> usize {
        self.inner.lock().await.orders.len()
    }
}

impl WatermarkStore for MemoryStore {
    async fn last_processed_ledger(&self, account: &AccountId) -> Result<Option<u32>, StoreError> {
        Ok(self.inner.lock().await.watermarks.get(account).copied())
    }

    async fn set_last_processed_ledger(&self, account: &AccountId, ledger_index: u32) -> Result<(), StoreError> {
        self.inner.lock().await.watermarks.insert(account.clone(), ledger_index);
        Ok(())
    }
}

impl OrderStore for MemoryStore {
    async fn fetch_order(&self, key: &OrderKey) -> Result<Option<Order>, StoreError> {
        Ok(self.inner.lock().await.orders.get(key).cloned())
    }

    async fn upsert_order(&self, order: &Order) -> Result<(), StoreError> {
        self.inner.lock().await.orders.insert(order.key(), order.clone());
        Ok(())
    }

    async fn append_trade(&self, key: &OrderKey, trade: &Trade) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(order) = inner.orders.get_mut(key) {
            // Trades embed in the order here, and upserts arrive with the trade already attached.
            if !order.trades.contains(trade) {
                order.trades.push(trade.clone());
            }
        }
        Ok(())
    }
}

impl RecordSink for MemoryStore {
    async fn emit_transfer(&self, transfer: &DepositWithdrawal) -> Result<(), StoreError> {
        self.inner.lock().await.transfers.push(transfer.clone());
        Ok(())
    }

    async fn emit_order(&self, order: &Order) -> Result<(), StoreError> {
        self.inner.lock().await.order_snapshots.push(order.clone());
        Ok(())
    }

    async fn emit_audit(&self, record: &AuditRecord) -> Result<(), StoreError> {
        self.inner.lock().await.audit_log.push(record.clone());
        Ok(())
    }
}
