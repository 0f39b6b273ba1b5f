//! SQLite-backed storage for the reconciliation engine.
//!
//! Orders are keyed UNIQUE(owner, sequence); trades are normalized into their own table and
//! reassembled on fetch. Amounts persist in their ledger wire form (JSON text), so the store never
//! loses issued-currency precision.

mod db;
mod errors;
mod orders;
mod records;
mod watermarks;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

pub use db::SqliteStore;
pub use errors::SqliteStoreError;

pub(crate) async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqliteStoreError> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
