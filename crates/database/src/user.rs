//! User CRUD operations.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::UserRow;

/// Create a new user.
pub async fn create_user(pool: &SqlitePool, user: &UserRow) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO users (id, phone_e164, credits_cents, message_count, lang, is_blocked)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.id)
    .bind(&user.phone_e164)
    .bind(user.credits_cents)
    .bind(user.message_count)
    .bind(&user.lang)
    .bind(user.is_blocked)
    .execute(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return DatabaseError::AlreadyExists {
                    entity: "User",
                    id: user.phone_e164.clone(),
                };
            }
        }
        DatabaseError::Sqlx(e)
    })?;

    Ok(())
}

/// Get a user by id.
pub async fn get_user(pool: &SqlitePool, id: &str) -> Result<Option<UserRow>> {
    let user = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT id, phone_e164, credits_cents, message_count, lang, is_blocked, created_at
        FROM users
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Get a user by phone key.
pub async fn get_user_by_phone(pool: &SqlitePool, phone_e164: &str) -> Result<Option<UserRow>> {
    let user = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT id, phone_e164, credits_cents, message_count, lang, is_blocked, created_at
        FROM users
        WHERE phone_e164 = ?
        "#,
    )
    .bind(phone_e164)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Set a user's cached balance.
pub async fn set_credits(pool: &SqlitePool, id: &str, credits_cents: i64) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE users SET credits_cents = ? WHERE id = ?
        "#,
    )
    .bind(credits_cents)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "User",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Set a user's consumed message count.
pub async fn set_message_count(pool: &SqlitePool, id: &str, message_count: i64) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE users SET message_count = ? WHERE id = ?
        "#,
    )
    .bind(message_count)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "User",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Delete a user by id. Ledger rows cascade via the foreign key.
pub async fn delete_user(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        DELETE FROM users WHERE id = ?
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "User",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Count total users.
pub async fn count_users(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM users
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(count)
}
