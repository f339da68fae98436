//! Short-lived conversation memory.
//!
//! Keeps a per-user rolling window of recent messages in process, expiring a
//! conversation lazily once it has been inactive past a fixed timeout. Writes
//! can optionally be mirrored to a durable store on a best-effort,
//! fire-and-forget basis; the mirror is advisory only and is never read back
//! into the hot path.

mod memory;
mod mirror;

pub use memory::{ConversationMemory, StoredMessage, DEFAULT_MAX_MESSAGES, DEFAULT_TIMEOUT};
pub use mirror::{ConversationMirror, MirrorError};
