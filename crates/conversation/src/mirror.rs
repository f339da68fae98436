//! Durable mirror contract for conversation writes.

use assistant_core::ChatRole;
use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a mirror implementation.
///
/// Mirror failures are logged and swallowed by the memory; they never reach
/// the synchronous path.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The underlying store rejected the write.
    #[error("mirror store error: {0}")]
    Store(String),
}

/// Best-effort durable mirror for conversation messages.
///
/// Implementations persist individual messages as they are written to the
/// in-process memory. The contract is at-most-once: a write that fails is not
/// retried, and data loss on crash is acceptable.
#[async_trait]
pub trait ConversationMirror: Send + Sync {
    /// Persist one message for a user.
    async fn record_message(
        &self,
        user_key: &str,
        role: ChatRole,
        content: &str,
    ) -> Result<(), MirrorError>;

    /// Remove all mirrored messages for a user.
    async fn purge(&self, user_key: &str) -> Result<(), MirrorError>;
}
