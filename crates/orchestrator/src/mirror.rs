//! Durable mirror adapter over the SQLite store.

use assistant_core::ChatRole;
use async_trait::async_trait;
use conversation::{ConversationMirror, MirrorError};
use database::{conversation as db_conversation, Database};

/// Mirrors conversation writes into the `conversation_messages` table.
///
/// Used fire-and-forget by the conversation memory; the mirror is advisory
/// and is never read back into the hot path.
pub struct DurableMirror {
    db: Database,
}

impl DurableMirror {
    /// Wrap a connected database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ConversationMirror for DurableMirror {
    async fn record_message(
        &self,
        user_key: &str,
        role: ChatRole,
        content: &str,
    ) -> Result<(), MirrorError> {
        db_conversation::insert_message(self.db.pool(), user_key, role.as_str(), content)
            .await
            .map_err(|e| MirrorError::Store(e.to_string()))
    }

    async fn purge(&self, user_key: &str) -> Result<(), MirrorError> {
        db_conversation::delete_messages_for_user(self.db.pool(), user_key)
            .await
            .map(|_| ())
            .map_err(|e| MirrorError::Store(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_and_purge() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        let mirror = DurableMirror::new(db.clone());

        mirror
            .record_message("+34600000001", ChatRole::User, "hola")
            .await
            .unwrap();
        mirror
            .record_message("+34600000001", ChatRole::Assistant, "¡Hola!")
            .await
            .unwrap();

        let rows = db_conversation::messages_for_user(db.pool(), "+34600000001", 10)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].role, "user");

        mirror.purge("+34600000001").await.unwrap();
        let rows = db_conversation::messages_for_user(db.pool(), "+34600000001", 10)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }
}
