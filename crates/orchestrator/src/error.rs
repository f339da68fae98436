//! Error types for orchestrator operations.

use thiserror::Error;

/// Errors that can occur during orchestration.
///
/// `answer_question` converts every internal failure into a user-facing
/// fallback answer; only deliberately skipped turns, composition failures,
/// and queue shutdown surface as errors.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Message was intentionally skipped (e.g., blocked user).
    #[error("message skipped: {0}")]
    Skipped(String),

    /// A collaborator could not be composed from configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The question queue worker has shut down.
    #[error("question queue closed")]
    QueueClosed,
}
