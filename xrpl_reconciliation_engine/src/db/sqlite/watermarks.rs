use sqlx::{Row, SqliteConnection};

use crate::{db::sqlite::SqliteStoreError, ledger_types::AccountId};

pub async fn last_processed_ledger(
    account: &AccountId,
    conn: &mut SqliteConnection,
) -> Result<Option<u32>, SqliteStoreError> {
    let row = sqlx::query("SELECT ledger_index FROM watermarks WHERE account = $1;")
        .bind(account.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(|r| r.try_get::<i64, _>("ledger_index").map(|l| l as u32)).transpose()?)
}

pub async fn set_last_processed_ledger(
    account: &AccountId,
    ledger_index: u32,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteStoreError> {
    sqlx::query(
        r#"
            INSERT INTO watermarks (account, ledger_index) VALUES ($1, $2)
            ON CONFLICT (account) DO UPDATE SET ledger_index = excluded.ledger_index;
        "#,
    )
    .bind(account.as_str())
    .bind(ledger_index as i64)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
