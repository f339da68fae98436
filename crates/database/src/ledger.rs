//! Append-only credit ledger operations.

use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::LedgerRow;

/// Append one ledger entry recording the signed delta actually applied.
pub async fn insert_entry(
    pool: &SqlitePool,
    user_id: &str,
    delta_cents: i64,
    reason: &str,
    ref_id: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO credit_ledger (user_id, delta_cents, reason, ref_id)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(delta_cents)
    .bind(reason)
    .bind(ref_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// List ledger entries for a user, oldest first.
pub async fn entries_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<LedgerRow>> {
    let entries = sqlx::query_as::<_, LedgerRow>(
        r#"
        SELECT id, user_id, delta_cents, reason, ref_id, created_at
        FROM credit_ledger
        WHERE user_id = ?
        ORDER BY id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(entries)
}

/// Running sum of a user's ledger, which must equal the cached balance.
pub async fn balance_from_ledger(pool: &SqlitePool, user_id: &str) -> Result<i64> {
    let sum = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COALESCE(SUM(delta_cents), 0) FROM credit_ledger WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(sum)
}
