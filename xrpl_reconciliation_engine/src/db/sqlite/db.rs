use std::fmt::Debug;

use log::*;
use sqlx::SqlitePool;

use crate::{
    db::sqlite::{new_pool, orders, records, watermarks, SqliteStoreError},
    ledger_types::{AccountId, AuditRecord, DepositWithdrawal, Order, OrderKey, Trade},
    traits::{OrderStore, RecordSink, StoreError, WatermarkStore},
};

#[derive(Clone)]
pub struct SqliteStore {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteStore ({:?})", self.pool)
    }
}

impl SqliteStore {
    /// Creates a new store against the given database URL, creating the database file if needed,
    /// and brings the schema up to date.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteStoreError> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        sqlx::migrate!("./src/db/sqlite/migrations").run(&pool).await?;
        info!("🗃️ Database schema is up to date");
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl WatermarkStore for SqliteStore {
    async fn last_processed_ledger(&self, account: &AccountId) -> Result<Option<u32>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteStoreError::from)?;
        Ok(watermarks::last_processed_ledger(account, &mut conn).await?)
    }

    async fn set_last_processed_ledger(&self, account: &AccountId, ledger_index: u32) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteStoreError::from)?;
        Ok(watermarks::set_last_processed_ledger(account, ledger_index, &mut conn).await?)
    }
}

impl OrderStore for SqliteStore {
    async fn fetch_order(&self, key: &OrderKey) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteStoreError::from)?;
        Ok(orders::fetch_order(key, &mut conn).await?)
    }

    async fn upsert_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteStoreError::from)?;
        Ok(orders::upsert_order(order, &mut conn).await?)
    }

    async fn append_trade(&self, key: &OrderKey, trade: &Trade) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteStoreError::from)?;
        Ok(orders::append_trade(key, trade, &mut conn).await?)
    }
}

impl RecordSink for SqliteStore {
    async fn emit_transfer(&self, transfer: &DepositWithdrawal) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteStoreError::from)?;
        Ok(records::insert_transfer(transfer, &mut conn).await?)
    }

    async fn emit_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteStoreError::from)?;
        Ok(records::insert_order_snapshot(order, &mut conn).await?)
    }

    async fn emit_audit(&self, record: &AuditRecord) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteStoreError::from)?;
        Ok(records::insert_audit_record(record, &mut conn).await?)
    }
}
