//! In-process conversation storage.

use std::sync::Arc;
use std::time::{Duration, Instant};

use assistant_core::ChatRole;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::mirror::ConversationMirror;

/// Default inactivity timeout before a conversation expires.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Default sliding-window bound on messages kept per user.
pub const DEFAULT_MAX_MESSAGES: usize = 20;

/// Maximum number of users tracked before LRU eviction.
const DEFAULT_MAX_USERS: usize = 10_000;

/// A single message held in memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// user or assistant.
    pub role: ChatRole,
    /// Message content.
    pub content: String,
    /// When the message was recorded.
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug)]
struct Conversation {
    messages: Vec<StoredMessage>,
    last_activity: Instant,
}

impl Conversation {
    fn new() -> Self {
        Self {
            messages: Vec::new(),
            last_activity: Instant::now(),
        }
    }
}

/// Per-user conversation memory with lazy TTL expiry.
///
/// Each user key is an independent unit of state; operations on one key
/// observe writes in program order, while different keys may interleave
/// freely. An access after the inactivity timeout starts a fresh, empty
/// conversation - there is no background sweep.
pub struct ConversationMemory {
    conversations: RwLock<IndexMap<String, Conversation>>,
    timeout: Duration,
    max_messages: usize,
    max_users: usize,
    mirror: Option<Arc<dyn ConversationMirror>>,
}

impl ConversationMemory {
    /// Create a memory with the given inactivity timeout and window size.
    pub fn new(timeout: Duration, max_messages: usize) -> Self {
        Self::with_limits(timeout, max_messages, DEFAULT_MAX_USERS)
    }

    /// Create a memory with an explicit user cap for LRU eviction.
    pub fn with_limits(timeout: Duration, max_messages: usize, max_users: usize) -> Self {
        Self {
            conversations: RwLock::new(IndexMap::new()),
            timeout,
            max_messages,
            max_users,
            mirror: None,
        }
    }

    /// Attach a durable mirror. Writes trigger a detached, best-effort
    /// persistence task; mirror failures are logged and swallowed.
    pub fn with_mirror(mut self, mirror: Arc<dyn ConversationMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// Record a user message, starting a fresh conversation if the previous
    /// one expired.
    pub async fn add_user_message(&self, user_key: &str, content: &str) {
        self.append(user_key, ChatRole::User, content).await;
    }

    /// Record an assistant message.
    pub async fn add_assistant_message(&self, user_key: &str, content: &str) {
        self.append(user_key, ChatRole::Assistant, content).await;
    }

    /// Get the current history for a user, oldest first.
    ///
    /// Returns an empty list if the conversation expired or never existed.
    /// Marks the user as recently used for LRU purposes.
    pub async fn history(&self, user_key: &str) -> Vec<StoredMessage> {
        let mut conversations = self.conversations.write().await;

        match conversations.shift_remove(user_key) {
            Some(conversation) if conversation.last_activity.elapsed() <= self.timeout => {
                let messages = conversation.messages.clone();
                conversations.insert(user_key.to_string(), conversation);
                messages
            }
            Some(_) => {
                debug!(user_key, "conversation expired, starting fresh");
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    /// Drop the conversation for a user.
    pub async fn clear(&self, user_key: &str) {
        let mut conversations = self.conversations.write().await;
        conversations.shift_remove(user_key);
    }

    /// Number of users currently tracked.
    pub async fn user_count(&self) -> usize {
        let conversations = self.conversations.read().await;
        conversations.len()
    }

    async fn append(&self, user_key: &str, role: ChatRole, content: &str) {
        let mut conversations = self.conversations.write().await;

        // Remove and re-insert to mark as recently used; an expired entry is
        // replaced by a fresh conversation.
        let mut conversation = match conversations.shift_remove(user_key) {
            Some(existing) if existing.last_activity.elapsed() <= self.timeout => existing,
            Some(_) => {
                debug!(user_key, "conversation expired on write, starting fresh");
                Conversation::new()
            }
            None => Conversation::new(),
        };

        conversation.messages.push(StoredMessage {
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        });

        // Sliding window: evict oldest first.
        if conversation.messages.len() > self.max_messages {
            let excess = conversation.messages.len() - self.max_messages;
            conversation.messages.drain(0..excess);
        }

        conversation.last_activity = Instant::now();
        conversations.insert(user_key.to_string(), conversation);

        while conversations.len() > self.max_users {
            conversations.shift_remove_index(0);
        }

        drop(conversations);

        if let Some(mirror) = &self.mirror {
            let mirror = Arc::clone(mirror);
            let user_key = user_key.to_string();
            let content = content.to_string();
            tokio::spawn(async move {
                if let Err(e) = mirror.record_message(&user_key, role, &content).await {
                    warn!(user_key, "conversation mirror write failed: {}", e);
                }
            });
        }
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, DEFAULT_MAX_MESSAGES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::MirrorError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_add_and_read_history() {
        let memory = ConversationMemory::default();

        memory.add_user_message("+34600000001", "hola").await;
        memory
            .add_assistant_message("+34600000001", "¡Hola! ¿En qué puedo ayudarte?")
            .await;

        let history = memory.history("+34600000001").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, ChatRole::User);
        assert_eq!(history[0].content, "hola");
        assert_eq!(history[1].role, ChatRole::Assistant);
    }

    #[tokio::test]
    async fn test_window_never_exceeded() {
        let memory = ConversationMemory::new(DEFAULT_TIMEOUT, 4);

        for i in 0..10 {
            memory
                .add_user_message("+34600000001", &format!("pregunta {i}"))
                .await;
        }

        let history = memory.history("+34600000001").await;
        assert_eq!(history.len(), 4);
        // Oldest-first eviction keeps the most recent writes.
        assert_eq!(history[0].content, "pregunta 6");
        assert_eq!(history[3].content, "pregunta 9");
    }

    #[tokio::test]
    async fn test_expired_conversation_reads_empty() {
        let memory = ConversationMemory::new(Duration::from_millis(30), 20);

        memory.add_user_message("+34600000001", "hola").await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(memory.history("+34600000001").await.is_empty());
    }

    #[tokio::test]
    async fn test_write_after_expiry_starts_fresh() {
        let memory = ConversationMemory::new(Duration::from_millis(30), 20);

        memory.add_user_message("+34600000001", "vieja").await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        memory.add_user_message("+34600000001", "nueva").await;

        let history = memory.history("+34600000001").await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "nueva");
    }

    #[tokio::test]
    async fn test_users_are_independent() {
        let memory = ConversationMemory::default();

        memory.add_user_message("+34600000001", "uno").await;
        memory.add_user_message("+34600000002", "dos").await;
        memory.clear("+34600000001").await;

        assert!(memory.history("+34600000001").await.is_empty());
        assert_eq!(memory.history("+34600000002").await.len(), 1);
    }

    #[tokio::test]
    async fn test_lru_eviction_of_users() {
        let memory = ConversationMemory::with_limits(DEFAULT_TIMEOUT, 20, 2);

        memory.add_user_message("+1", "a").await;
        memory.add_user_message("+2", "b").await;
        memory.add_user_message("+3", "c").await;

        assert_eq!(memory.user_count().await, 2);
        assert!(memory.history("+1").await.is_empty());
        assert!(!memory.history("+3").await.is_empty());
    }

    struct FailingMirror {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ConversationMirror for FailingMirror {
        async fn record_message(
            &self,
            _user_key: &str,
            _role: ChatRole,
            _content: &str,
        ) -> Result<(), MirrorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(MirrorError::Store("disk full".to_string()))
        }

        async fn purge(&self, _user_key: &str) -> Result<(), MirrorError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_mirror_failure_never_reaches_caller() {
        let mirror = Arc::new(FailingMirror {
            calls: AtomicUsize::new(0),
        });
        let memory = ConversationMemory::default().with_mirror(mirror.clone());

        memory.add_user_message("+34600000001", "hola").await;

        // The synchronous path is unaffected by the failing mirror.
        assert_eq!(memory.history("+34600000001").await.len(), 1);

        // Give the detached task a moment to run.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(mirror.calls.load(Ordering::SeqCst), 1);
    }
}
