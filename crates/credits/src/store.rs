//! Credit store abstraction and its two implementations.

use std::collections::HashMap;

use async_trait::async_trait;
use database::{ledger as db_ledger, user as db_user, Database, UserRow};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::StoreError;

/// A user account as seen by the metering layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    /// Generated identifier.
    pub id: String,
    /// Phone-like identity key.
    pub phone_e164: String,
    /// Remaining balance in minor units.
    pub credits_cents: i64,
    /// Messages consumed under quota metering.
    pub message_count: i64,
    /// Locale tag.
    pub lang: String,
    /// Whether the user is blocked.
    pub is_blocked: bool,
}

/// An append-only ledger entry: the signed delta actually applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Owning user id.
    pub user_id: String,
    /// Signed delta in minor units.
    pub delta_cents: i64,
    /// Reason tag.
    pub reason: String,
    /// Optional reference (turn id).
    pub ref_id: Option<String>,
}

/// Storage contract for users and their ledger.
///
/// Injected into [`crate::CreditLedger`] so the in-memory fallback and the
/// durable SQLite store are interchangeable and independently testable.
#[async_trait]
pub trait CreditStore: Send + Sync {
    /// Look up a user by phone key.
    async fn user_by_phone(&self, phone_e164: &str) -> Result<Option<UserAccount>, StoreError>;

    /// Look up a user by id.
    async fn user_by_id(&self, user_id: &str) -> Result<Option<UserAccount>, StoreError>;

    /// Insert a new user.
    async fn insert_user(&self, account: &UserAccount) -> Result<(), StoreError>;

    /// Update a user's cached balance.
    async fn set_credits(&self, user_id: &str, credits_cents: i64) -> Result<(), StoreError>;

    /// Update a user's consumed message count.
    async fn set_message_count(&self, user_id: &str, message_count: i64)
        -> Result<(), StoreError>;

    /// Append one ledger entry.
    async fn append_entry(&self, entry: &LedgerEntry) -> Result<(), StoreError>;

    /// List ledger entries for a user, oldest first.
    async fn entries_for_user(&self, user_id: &str) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Delete a user and cascade their ledger entries.
    async fn delete_user(&self, user_id: &str) -> Result<(), StoreError>;
}

/// In-memory store used when no durable collaborator is configured.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, UserAccount>>,
    entries: RwLock<Vec<LedgerEntry>>,
}

impl MemoryStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CreditStore for MemoryStore {
    async fn user_by_phone(&self, phone_e164: &str) -> Result<Option<UserAccount>, StoreError> {
        let users = self.users.read().await;
        Ok(users.get(phone_e164).cloned())
    }

    async fn user_by_id(&self, user_id: &str) -> Result<Option<UserAccount>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.id == user_id).cloned())
    }

    async fn insert_user(&self, account: &UserAccount) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        if users.contains_key(&account.phone_e164) {
            return Err(StoreError::AlreadyExists(account.phone_e164.clone()));
        }
        users.insert(account.phone_e164.clone(), account.clone());
        Ok(())
    }

    async fn set_credits(&self, user_id: &str, credits_cents: i64) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        match users.values_mut().find(|u| u.id == user_id) {
            Some(user) => {
                user.credits_cents = credits_cents;
                Ok(())
            }
            None => Err(StoreError::Backend(format!("user not found: {user_id}"))),
        }
    }

    async fn set_message_count(
        &self,
        user_id: &str,
        message_count: i64,
    ) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        match users.values_mut().find(|u| u.id == user_id) {
            Some(user) => {
                user.message_count = message_count;
                Ok(())
            }
            None => Err(StoreError::Backend(format!("user not found: {user_id}"))),
        }
    }

    async fn append_entry(&self, entry: &LedgerEntry) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.push(entry.clone());
        Ok(())
    }

    async fn entries_for_user(&self, user_id: &str) -> Result<Vec<LedgerEntry>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        users.retain(|_, u| u.id != user_id);
        let mut entries = self.entries.write().await;
        entries.retain(|e| e.user_id != user_id);
        Ok(())
    }
}

/// Durable store backed by the SQLite database crate.
#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    /// Wrap a connected database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn account_from_row(row: UserRow) -> UserAccount {
    UserAccount {
        id: row.id,
        phone_e164: row.phone_e164,
        credits_cents: row.credits_cents,
        message_count: row.message_count,
        lang: row.lang,
        is_blocked: row.is_blocked,
    }
}

#[async_trait]
impl CreditStore for SqliteStore {
    async fn user_by_phone(&self, phone_e164: &str) -> Result<Option<UserAccount>, StoreError> {
        let row = db_user::get_user_by_phone(self.db.pool(), phone_e164).await?;
        Ok(row.map(account_from_row))
    }

    async fn user_by_id(&self, user_id: &str) -> Result<Option<UserAccount>, StoreError> {
        let row = db_user::get_user(self.db.pool(), user_id).await?;
        Ok(row.map(account_from_row))
    }

    async fn insert_user(&self, account: &UserAccount) -> Result<(), StoreError> {
        let row = UserRow {
            id: account.id.clone(),
            phone_e164: account.phone_e164.clone(),
            credits_cents: account.credits_cents,
            message_count: account.message_count,
            lang: account.lang.clone(),
            is_blocked: account.is_blocked,
            created_at: String::new(),
        };
        db_user::create_user(self.db.pool(), &row).await?;
        Ok(())
    }

    async fn set_credits(&self, user_id: &str, credits_cents: i64) -> Result<(), StoreError> {
        db_user::set_credits(self.db.pool(), user_id, credits_cents).await?;
        Ok(())
    }

    async fn set_message_count(
        &self,
        user_id: &str,
        message_count: i64,
    ) -> Result<(), StoreError> {
        db_user::set_message_count(self.db.pool(), user_id, message_count).await?;
        Ok(())
    }

    async fn append_entry(&self, entry: &LedgerEntry) -> Result<(), StoreError> {
        db_ledger::insert_entry(
            self.db.pool(),
            &entry.user_id,
            entry.delta_cents,
            &entry.reason,
            entry.ref_id.as_deref(),
        )
        .await?;
        Ok(())
    }

    async fn entries_for_user(&self, user_id: &str) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = db_ledger::entries_for_user(self.db.pool(), user_id).await?;
        Ok(rows
            .into_iter()
            .map(|row| LedgerEntry {
                user_id: row.user_id,
                delta_cents: row.delta_cents,
                reason: row.reason,
                ref_id: row.ref_id,
            })
            .collect())
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), StoreError> {
        db_user::delete_user(self.db.pool(), user_id).await?;
        Ok(())
    }
}
