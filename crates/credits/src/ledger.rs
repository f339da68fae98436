//! The credit ledger: metering operations over an injected store.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::store::{CreditStore, LedgerEntry, UserAccount};

/// Reason tag for the one-time initial grant.
pub const REASON_INIT_GRANT: &str = "init_grant";
/// Reason tag for a debit against an answered turn.
pub const REASON_CHAT_SPEND: &str = "chat_spend";
/// Reason tag for a balance top-up.
pub const REASON_TOPUP: &str = "topup";

/// Which quota strategy meters a session.
///
/// Strategies are never mixed for the same user within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeteringMode {
    /// Integer minor-unit balance with clamped debits.
    Balance,
    /// Capped count of answered messages.
    Quota,
}

/// Ledger configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Selected metering strategy.
    pub mode: MeteringMode,
    /// Minor units granted to a user on first contact.
    pub initial_credits_cents: i64,
    /// Message cap for quota mode.
    pub quota_cap: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            mode: MeteringMode::Balance,
            initial_credits_cents: 300,
            quota_cap: 100,
        }
    }
}

impl LedgerConfig {
    /// Create configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `BOT_USE_CREDIT_SYSTEM` - "true"/"1" for balance mode, otherwise quota (default: balance)
    /// - `BOT_INIT_CREDITS_CENTS` - initial grant in minor units (default: 300)
    /// - `BOT_MESSAGE_LIMIT` - quota cap (default: 100)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let mode = match std::env::var("BOT_USE_CREDIT_SYSTEM") {
            Ok(v) if v == "false" || v == "0" => MeteringMode::Quota,
            _ => MeteringMode::Balance,
        };

        let initial_credits_cents = std::env::var("BOT_INIT_CREDITS_CENTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.initial_credits_cents);

        let quota_cap = std::env::var("BOT_MESSAGE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.quota_cap);

        Self {
            mode,
            initial_credits_cents,
            quota_cap,
        }
    }
}

/// Per-user metering over an injected [`CreditStore`].
///
/// Every lookup/update failure against the store returns a safe default (no
/// balance, zero credits) instead of propagating, so callers degrade to
/// "insufficient funds" rather than crashing.
pub struct CreditLedger {
    store: Arc<dyn CreditStore>,
    config: LedgerConfig,
    first_interaction: RwLock<HashSet<String>>,
}

impl CreditLedger {
    /// Create a ledger over the given store.
    pub fn new(store: Arc<dyn CreditStore>, config: LedgerConfig) -> Self {
        Self {
            store,
            config,
            first_interaction: RwLock::new(HashSet::new()),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Get or create the user for a phone key.
    ///
    /// Idempotent: repeated calls return the same record. The first call
    /// grants the initial balance and records exactly one `init_grant` ledger
    /// entry. Returns `None` if the store is unreachable.
    pub async fn ensure_user(&self, phone_e164: &str) -> Option<UserAccount> {
        match self.store.user_by_phone(phone_e164).await {
            Ok(Some(existing)) => return Some(existing),
            Ok(None) => {}
            Err(e) => {
                warn!(phone_e164, "user lookup failed: {}", e);
                return None;
            }
        }

        let account = UserAccount {
            id: Uuid::new_v4().to_string(),
            phone_e164: phone_e164.to_string(),
            credits_cents: self.config.initial_credits_cents,
            message_count: 0,
            lang: "es".to_string(),
            is_blocked: false,
        };

        if let Err(e) = self.store.insert_user(&account).await {
            // Lost a race with a concurrent turn for the same key; re-read.
            warn!(phone_e164, "user insert failed: {}", e);
            return self.store.user_by_phone(phone_e164).await.ok().flatten();
        }

        let grant = LedgerEntry {
            user_id: account.id.clone(),
            delta_cents: self.config.initial_credits_cents,
            reason: REASON_INIT_GRANT.to_string(),
            ref_id: None,
        };
        if let Err(e) = self.store.append_entry(&grant).await {
            warn!(phone_e164, "init grant entry failed: {}", e);
        }

        info!(
            phone_e164,
            credits = self.config.initial_credits_cents,
            "new user created with initial grant"
        );

        let mut first = self.first_interaction.write().await;
        first.insert(phone_e164.to_string());

        Some(account)
    }

    /// Whether this is the user's first contact since creation.
    pub async fn is_first_interaction(&self, phone_e164: &str) -> bool {
        let first = self.first_interaction.read().await;
        first.contains(phone_e164)
    }

    /// Clear the first-interaction flag after the welcome has been sent.
    pub async fn clear_first_interaction(&self, phone_e164: &str) {
        let mut first = self.first_interaction.write().await;
        first.remove(phone_e164);
    }

    /// Whether the user has any balance left.
    pub async fn has_balance(&self, user_id: &str) -> bool {
        self.credits(user_id).await > 0
    }

    /// Whether the user can afford a given cost.
    pub async fn can_afford(&self, user_id: &str, cost_cents: i64) -> bool {
        self.credits(user_id).await >= cost_cents
    }

    /// Current balance in minor units; zero on any store failure.
    pub async fn credits(&self, user_id: &str) -> i64 {
        match self.store.user_by_id(user_id).await {
            Ok(Some(user)) => user.credits_cents,
            Ok(None) => 0,
            Err(e) => {
                warn!(user_id, "balance lookup failed: {}", e);
                0
            }
        }
    }

    /// Debit a cost against the balance, clamping at zero.
    ///
    /// The ledger entry records the signed delta actually applied
    /// (`new_balance - old_balance`), not the requested amount, so the ledger
    /// sum always equals the stored balance. Returns the new balance.
    pub async fn debit(&self, user_id: &str, cost_cents: i64, ref_id: Option<&str>) -> i64 {
        let user = match self.store.user_by_id(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!(user_id, "user not found for debit");
                return 0;
            }
            Err(e) => {
                warn!(user_id, "debit lookup failed: {}", e);
                return 0;
            }
        };

        let old_balance = user.credits_cents;
        let new_balance = (old_balance - cost_cents).max(0);

        if let Err(e) = self.store.set_credits(user_id, new_balance).await {
            warn!(user_id, "debit update failed: {}", e);
            return 0;
        }

        let entry = LedgerEntry {
            user_id: user_id.to_string(),
            delta_cents: new_balance - old_balance,
            reason: REASON_CHAT_SPEND.to_string(),
            ref_id: ref_id.map(|r| r.to_string()),
        };
        if let Err(e) = self.store.append_entry(&entry).await {
            warn!(user_id, "debit ledger entry failed: {}", e);
        }

        info!(user_id, cost_cents, old_balance, new_balance, "credits debited");
        new_balance
    }

    /// Credit an amount to the balance and record it. Returns the new balance.
    pub async fn credit(&self, user_id: &str, amount_cents: i64, reason: &str) -> i64 {
        let user = match self.store.user_by_id(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!(user_id, "user not found for credit");
                return 0;
            }
            Err(e) => {
                warn!(user_id, "credit lookup failed: {}", e);
                return 0;
            }
        };

        let new_balance = user.credits_cents + amount_cents;
        if let Err(e) = self.store.set_credits(user_id, new_balance).await {
            warn!(user_id, "credit update failed: {}", e);
            return user.credits_cents;
        }

        let entry = LedgerEntry {
            user_id: user_id.to_string(),
            delta_cents: amount_cents,
            reason: reason.to_string(),
            ref_id: None,
        };
        if let Err(e) = self.store.append_entry(&entry).await {
            warn!(user_id, "credit ledger entry failed: {}", e);
        }

        new_balance
    }

    /// Whether the user is under the quota cap.
    pub async fn has_messages_remaining(&self, user_id: &str) -> bool {
        match self.store.user_by_id(user_id).await {
            Ok(Some(user)) => user.message_count < self.config.quota_cap,
            Ok(None) => false,
            Err(e) => {
                warn!(user_id, "quota lookup failed: {}", e);
                false
            }
        }
    }

    /// Increment the consumed-message count. Returns the new count.
    pub async fn increment_message_count(&self, user_id: &str) -> i64 {
        let user = match self.store.user_by_id(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!(user_id, "user not found for quota increment");
                return 0;
            }
            Err(e) => {
                warn!(user_id, "quota increment lookup failed: {}", e);
                return 0;
            }
        };

        let new_count = user.message_count + 1;
        if let Err(e) = self.store.set_message_count(user_id, new_count).await {
            warn!(user_id, "quota increment update failed: {}", e);
            return user.message_count;
        }

        new_count
    }

    /// Delete the user and cascade their ledger entries.
    ///
    /// Returns `true` on success, `false` otherwise; never raises, so the
    /// erasure flow can always answer the user.
    pub async fn delete_user_data(&self, user_id: &str) -> bool {
        let phone = self
            .store
            .user_by_id(user_id)
            .await
            .ok()
            .flatten()
            .map(|u| u.phone_e164);

        match self.store.delete_user(user_id).await {
            Ok(()) => {
                if let Some(phone) = phone {
                    self.clear_first_interaction(&phone).await;
                }
                info!(user_id, "user data deleted");
                true
            }
            Err(e) => {
                warn!(user_id, "user data deletion failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    fn ledger() -> CreditLedger {
        CreditLedger::new(Arc::new(MemoryStore::new()), LedgerConfig::default())
    }

    #[tokio::test]
    async fn test_ensure_user_is_idempotent() {
        let ledger = ledger();

        let first = ledger.ensure_user("+34600000001").await.unwrap();
        let second = ledger.ensure_user("+34600000001").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.credits_cents, 300);

        // Exactly one init_grant in total.
        let entries = ledger.store.entries_for_user(&first.id).await.unwrap();
        let grants: Vec<_> = entries
            .iter()
            .filter(|e| e.reason == REASON_INIT_GRANT)
            .collect();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].delta_cents, 300);
    }

    #[tokio::test]
    async fn test_debit_decrements_and_records_delta() {
        let ledger = ledger();
        let user = ledger.ensure_user("+34600000001").await.unwrap();

        let new_balance = ledger.debit(&user.id, 45, Some("turn-1")).await;
        assert_eq!(new_balance, 255);

        let entries = ledger.store.entries_for_user(&user.id).await.unwrap();
        let spend = entries
            .iter()
            .find(|e| e.reason == REASON_CHAT_SPEND)
            .unwrap();
        assert_eq!(spend.delta_cents, -45);
        assert_eq!(spend.ref_id.as_deref(), Some("turn-1"));

        // Ledger sum equals the stored balance.
        let sum: i64 = entries.iter().map(|e| e.delta_cents).sum();
        assert_eq!(sum, ledger.credits(&user.id).await);
    }

    #[tokio::test]
    async fn test_debit_clamps_at_zero() {
        let ledger = ledger();
        let user = ledger.ensure_user("+34600000001").await.unwrap();

        let new_balance = ledger.debit(&user.id, 1_000, None).await;
        assert_eq!(new_balance, 0);

        // The recorded delta is the applied decrement, not the requested one.
        let entries = ledger.store.entries_for_user(&user.id).await.unwrap();
        let spend = entries
            .iter()
            .find(|e| e.reason == REASON_CHAT_SPEND)
            .unwrap();
        assert_eq!(spend.delta_cents, -300);

        let sum: i64 = entries.iter().map(|e| e.delta_cents).sum();
        assert_eq!(sum, 0);
    }

    #[tokio::test]
    async fn test_can_afford_and_has_balance() {
        let ledger = ledger();
        let user = ledger.ensure_user("+34600000001").await.unwrap();

        assert!(ledger.has_balance(&user.id).await);
        assert!(ledger.can_afford(&user.id, 300).await);
        assert!(!ledger.can_afford(&user.id, 301).await);

        ledger.debit(&user.id, 300, None).await;
        assert!(!ledger.has_balance(&user.id).await);
    }

    #[tokio::test]
    async fn test_credit_raises_balance() {
        let ledger = ledger();
        let user = ledger.ensure_user("+34600000001").await.unwrap();

        let new_balance = ledger.credit(&user.id, 500, REASON_TOPUP).await;
        assert_eq!(new_balance, 800);

        let entries = ledger.store.entries_for_user(&user.id).await.unwrap();
        let sum: i64 = entries.iter().map(|e| e.delta_cents).sum();
        assert_eq!(sum, 800);
    }

    #[tokio::test]
    async fn test_quota_mode_blocks_at_cap() {
        let config = LedgerConfig {
            mode: MeteringMode::Quota,
            quota_cap: 2,
            ..LedgerConfig::default()
        };
        let ledger = CreditLedger::new(Arc::new(MemoryStore::new()), config);
        let user = ledger.ensure_user("+34600000001").await.unwrap();

        assert!(ledger.has_messages_remaining(&user.id).await);
        assert_eq!(ledger.increment_message_count(&user.id).await, 1);
        assert_eq!(ledger.increment_message_count(&user.id).await, 2);
        assert!(!ledger.has_messages_remaining(&user.id).await);
    }

    #[tokio::test]
    async fn test_first_interaction_flag() {
        let ledger = ledger();
        ledger.ensure_user("+34600000001").await.unwrap();

        assert!(ledger.is_first_interaction("+34600000001").await);
        ledger.clear_first_interaction("+34600000001").await;
        assert!(!ledger.is_first_interaction("+34600000001").await);
    }

    #[tokio::test]
    async fn test_delete_user_data_cascades() {
        let ledger = ledger();
        let user = ledger.ensure_user("+34600000001").await.unwrap();
        ledger.debit(&user.id, 10, None).await;

        assert!(ledger.delete_user_data(&user.id).await);
        assert!(ledger.store.user_by_id(&user.id).await.unwrap().is_none());
        assert!(ledger
            .store
            .entries_for_user(&user.id)
            .await
            .unwrap()
            .is_empty());
    }

    /// A store where every operation fails, for the degradation contract.
    struct BrokenStore;

    #[async_trait]
    impl CreditStore for BrokenStore {
        async fn user_by_phone(&self, _: &str) -> Result<Option<UserAccount>, StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }
        async fn user_by_id(&self, _: &str) -> Result<Option<UserAccount>, StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }
        async fn insert_user(&self, _: &UserAccount) -> Result<(), StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }
        async fn set_credits(&self, _: &str, _: i64) -> Result<(), StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }
        async fn set_message_count(&self, _: &str, _: i64) -> Result<(), StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }
        async fn append_entry(&self, _: &LedgerEntry) -> Result<(), StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }
        async fn entries_for_user(&self, _: &str) -> Result<Vec<LedgerEntry>, StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }
        async fn delete_user(&self, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_broken_store_degrades_to_safe_defaults() {
        let ledger = CreditLedger::new(Arc::new(BrokenStore), LedgerConfig::default());

        assert!(ledger.ensure_user("+34600000001").await.is_none());
        assert_eq!(ledger.credits("user-1").await, 0);
        assert!(!ledger.has_balance("user-1").await);
        assert!(!ledger.has_messages_remaining("user-1").await);
        assert_eq!(ledger.debit("user-1", 45, None).await, 0);
        assert!(!ledger.delete_user_data("user-1").await);
    }
}
