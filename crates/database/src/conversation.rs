//! Mirrored conversation message operations.

use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::MessageRow;

/// Insert one mirrored message.
pub async fn insert_message(
    pool: &SqlitePool,
    phone_e164: &str,
    role: &str,
    content: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO conversation_messages (phone_e164, role, content)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(phone_e164)
    .bind(role)
    .bind(content)
    .execute(pool)
    .await?;

    Ok(())
}

/// List the most recent mirrored messages for a user, oldest first.
pub async fn messages_for_user(
    pool: &SqlitePool,
    phone_e164: &str,
    limit: i64,
) -> Result<Vec<MessageRow>> {
    let mut messages = sqlx::query_as::<_, MessageRow>(
        r#"
        SELECT id, phone_e164, role, content, created_at
        FROM conversation_messages
        WHERE phone_e164 = ?
        ORDER BY id DESC
        LIMIT ?
        "#,
    )
    .bind(phone_e164)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    messages.reverse();
    Ok(messages)
}

/// Delete all mirrored messages for a user.
pub async fn delete_messages_for_user(pool: &SqlitePool, phone_e164: &str) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM conversation_messages WHERE phone_e164 = ?
        "#,
    )
    .bind(phone_e164)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
