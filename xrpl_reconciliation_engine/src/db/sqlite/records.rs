use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteStoreError,
    ledger_types::{AuditRecord, DepositWithdrawal, Order},
};

pub async fn insert_transfer(
    transfer: &DepositWithdrawal,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteStoreError> {
    let amount = serde_json::to_string(&transfer.amount)?;
    sqlx::query(
        r#"
            INSERT INTO transfers (tx_hash, ledger_index, timestamp, direction, account, counterparty, amount)
            VALUES ($1, $2, $3, $4, $5, $6, $7);
        "#,
    )
    .bind(transfer.tx_hash.as_str())
    .bind(transfer.ledger_index as i64)
    .bind(transfer.timestamp)
    .bind(transfer.direction.to_string())
    .bind(transfer.account.as_str())
    .bind(transfer.counterparty.as_str())
    .bind(amount)
    .execute(&mut *conn)
    .await?;
    trace!("🗃️ {} {} recorded for {}", transfer.direction, transfer.tx_hash, transfer.account);
    Ok(())
}

/// Order snapshots are append-only history: one row per emitted snapshot, with the full order
/// serialized alongside the columns used for querying.
pub async fn insert_order_snapshot(order: &Order, conn: &mut SqliteConnection) -> Result<(), SqliteStoreError> {
    let snapshot = serde_json::to_string(order)?;
    sqlx::query(
        r#"
            INSERT INTO order_snapshots (owner, sequence, status, snapshot, recorded_ledger)
            VALUES ($1, $2, $3, $4, $5);
        "#,
    )
    .bind(order.owner.as_str())
    .bind(order.sequence as i64)
    .bind(order.status.to_string())
    .bind(snapshot)
    .bind(order.last_updated_ledger as i64)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn insert_audit_record(record: &AuditRecord, conn: &mut SqliteConnection) -> Result<(), SqliteStoreError> {
    sqlx::query(
        r#"
            INSERT INTO audit_log (tx_hash, ledger_index, reason, detail)
            VALUES ($1, $2, $3, $4);
        "#,
    )
    .bind(record.tx_hash.as_str())
    .bind(record.ledger_index as i64)
    .bind(record.reason.as_str())
    .bind(record.detail.as_str())
    .execute(&mut *conn)
    .await?;
    Ok(())
}
