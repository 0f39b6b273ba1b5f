use chrono::{DateTime, Utc};
use log::trace;
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};
use xrc_common::Amount;

use crate::{
    db::sqlite::SqliteStoreError,
    ledger_types::{AuditNote, CancellationMarker, Order, OrderKey, OrderStatus, Trade},
};

fn amount_to_json(amount: &Option<Amount>) -> Result<Option<String>, SqliteStoreError> {
    amount.as_ref().map(|a| serde_json::to_string(a)).transpose().map_err(Into::into)
}

fn amount_from_json(raw: Option<String>) -> Result<Option<Amount>, SqliteStoreError> {
    raw.map(|s| serde_json::from_str(&s)).transpose().map_err(Into::into)
}

pub async fn upsert_order(order: &Order, conn: &mut SqliteConnection) -> Result<(), SqliteStoreError> {
    let notes = serde_json::to_string(&order.notes)?;
    sqlx::query(
        r#"
            INSERT INTO orders (
                owner, sequence,
                created_tx_hash, created_ledger_index, created_at,
                original_taker_gets, original_taker_pays,
                remaining_taker_gets, remaining_taker_pays,
                status, cancel_tx_hash, cancel_ledger_index,
                frozen, last_updated_ledger, notes
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (owner, sequence) DO UPDATE SET
                created_tx_hash = excluded.created_tx_hash,
                created_ledger_index = excluded.created_ledger_index,
                created_at = excluded.created_at,
                original_taker_gets = excluded.original_taker_gets,
                original_taker_pays = excluded.original_taker_pays,
                remaining_taker_gets = excluded.remaining_taker_gets,
                remaining_taker_pays = excluded.remaining_taker_pays,
                status = excluded.status,
                cancel_tx_hash = excluded.cancel_tx_hash,
                cancel_ledger_index = excluded.cancel_ledger_index,
                frozen = excluded.frozen,
                last_updated_ledger = excluded.last_updated_ledger,
                notes = excluded.notes;
        "#,
    )
    .bind(order.owner.as_str())
    .bind(order.sequence as i64)
    .bind(order.created_tx_hash.as_ref().map(|h| h.as_str().to_string()))
    .bind(order.created_ledger_index.map(|l| l as i64))
    .bind(order.created_at)
    .bind(amount_to_json(&order.original_taker_gets)?)
    .bind(amount_to_json(&order.original_taker_pays)?)
    .bind(amount_to_json(&order.remaining_taker_gets)?)
    .bind(amount_to_json(&order.remaining_taker_pays)?)
    .bind(order.status.to_string())
    .bind(order.canceled_by.as_ref().map(|c| c.tx_hash.as_str().to_string()))
    .bind(order.canceled_by.as_ref().map(|c| c.ledger_index as i64))
    .bind(order.frozen)
    .bind(order.last_updated_ledger as i64)
    .bind(notes)
    .execute(&mut *conn)
    .await?;
    trace!("🗃️ Order {} upserted", order.key());
    Ok(())
}

/// Fetches the order for the given key, reassembling its trade history from the trades table. If
/// no entry exists, `None` is returned.
pub async fn fetch_order(key: &OrderKey, conn: &mut SqliteConnection) -> Result<Option<Order>, SqliteStoreError> {
    let row = sqlx::query(
        r#"
            SELECT owner, sequence, created_tx_hash, created_ledger_index, created_at,
                   original_taker_gets, original_taker_pays,
                   remaining_taker_gets, remaining_taker_pays,
                   status, cancel_tx_hash, cancel_ledger_index,
                   frozen, last_updated_ledger, notes
            FROM orders
            WHERE owner = $1 AND sequence = $2;
        "#,
    )
    .bind(key.owner.as_str())
    .bind(key.sequence as i64)
    .fetch_optional(&mut *conn)
    .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let mut order = order_from_row(&row)?;
    order.trades = fetch_trades(key, conn).await?;
    Ok(Some(order))
}

fn order_from_row(row: &SqliteRow) -> Result<Order, SqliteStoreError> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<OrderStatus>()
        .map_err(|e| SqliteStoreError::Conversion(e.to_string()))?;
    let notes: String = row.try_get("notes")?;
    let notes: Vec<AuditNote> = serde_json::from_str(&notes)?;
    let cancel_tx_hash: Option<String> = row.try_get("cancel_tx_hash")?;
    let cancel_ledger_index: Option<i64> = row.try_get("cancel_ledger_index")?;
    let canceled_by = match (cancel_tx_hash, cancel_ledger_index) {
        (Some(tx_hash), Some(ledger_index)) => {
            Some(CancellationMarker { tx_hash: tx_hash.into(), ledger_index: ledger_index as u32 })
        },
        _ => None,
    };
    Ok(Order {
        owner: row.try_get::<String, _>("owner")?.into(),
        sequence: row.try_get::<i64, _>("sequence")? as u32,
        created_tx_hash: row.try_get::<Option<String>, _>("created_tx_hash")?.map(Into::into),
        created_ledger_index: row.try_get::<Option<i64>, _>("created_ledger_index")?.map(|l| l as u32),
        created_at: row.try_get::<Option<DateTime<Utc>>, _>("created_at")?,
        original_taker_gets: amount_from_json(row.try_get("original_taker_gets")?)?,
        original_taker_pays: amount_from_json(row.try_get("original_taker_pays")?)?,
        remaining_taker_gets: amount_from_json(row.try_get("remaining_taker_gets")?)?,
        remaining_taker_pays: amount_from_json(row.try_get("remaining_taker_pays")?)?,
        status,
        canceled_by,
        frozen: row.try_get("frozen")?,
        last_updated_ledger: row.try_get::<i64, _>("last_updated_ledger")? as u32,
        trades: Vec::new(),
        notes,
    })
}

pub async fn append_trade(
    key: &OrderKey,
    trade: &Trade,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteStoreError> {
    sqlx::query(
        r#"
            INSERT INTO trades (owner, sequence, tx_hash, ledger_index, timestamp, taken, paid, counterparty)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8);
        "#,
    )
    .bind(key.owner.as_str())
    .bind(key.sequence as i64)
    .bind(trade.tx_hash.as_str())
    .bind(trade.ledger_index as i64)
    .bind(trade.timestamp)
    .bind(amount_to_json(&trade.taken)?)
    .bind(amount_to_json(&trade.paid)?)
    .bind(trade.counterparty.as_ref().map(|c| c.as_str().to_string()))
    .execute(&mut *conn)
    .await?;
    trace!("🗃️ Trade {} appended to order {key}", trade.tx_hash);
    Ok(())
}

/// Returns the order's trades in insertion order.
pub async fn fetch_trades(key: &OrderKey, conn: &mut SqliteConnection) -> Result<Vec<Trade>, SqliteStoreError> {
    let rows = sqlx::query(
        r#"
            SELECT tx_hash, ledger_index, timestamp, taken, paid, counterparty
            FROM trades
            WHERE owner = $1 AND sequence = $2
            ORDER BY id ASC;
        "#,
    )
    .bind(key.owner.as_str())
    .bind(key.sequence as i64)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter()
        .map(|row| {
            Ok(Trade {
                tx_hash: row.try_get::<String, _>("tx_hash")?.into(),
                ledger_index: row.try_get::<i64, _>("ledger_index")? as u32,
                timestamp: row.try_get::<Option<DateTime<Utc>>, _>("timestamp")?,
                taken: amount_from_json(row.try_get("taken")?)?,
                paid: amount_from_json(row.try_get("paid")?)?,
                counterparty: row.try_get::<Option<String>, _>("counterparty")?.map(Into::into),
            })
        })
        .collect()
}
