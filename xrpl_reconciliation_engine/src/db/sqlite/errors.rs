use thiserror::Error;

use crate::traits::StoreError;

#[derive(Debug, Error)]
pub enum SqliteStoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("stored value could not be converted: {0}")]
    Conversion(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(e: SqliteStoreError) -> Self {
        match e {
            SqliteStoreError::Serialization(e) => StoreError::Serialization(e.to_string()),
            other => StoreError::Database(other.to_string()),
        }
    }
}
