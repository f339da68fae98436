//! Database row models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A user row, identified by a generated id and a unique phone key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UserRow {
    /// Generated identifier.
    pub id: String,
    /// E.164 phone-like identity key (e.g., "+34600000001").
    pub phone_e164: String,
    /// Remaining balance in display-currency minor units.
    pub credits_cents: i64,
    /// Messages consumed under quota metering.
    pub message_count: i64,
    /// Locale tag.
    pub lang: String,
    /// Whether the user is blocked from the service.
    pub is_blocked: bool,
    /// Creation timestamp.
    pub created_at: String,
}

/// An immutable credit-ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LedgerRow {
    /// Auto-incrementing id.
    pub id: i64,
    /// Owning user id.
    pub user_id: String,
    /// Signed delta actually applied, in minor units.
    pub delta_cents: i64,
    /// Reason tag (e.g., "init_grant", "chat_spend", "topup").
    pub reason: String,
    /// Optional reference (message/turn id).
    pub ref_id: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
}

/// A mirrored conversation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct MessageRow {
    /// Auto-incrementing id.
    pub id: i64,
    /// Owning user's phone key.
    pub phone_e164: String,
    /// "user" or "assistant".
    pub role: String,
    /// Message content.
    pub content: String,
    /// Creation timestamp.
    pub created_at: String,
}
