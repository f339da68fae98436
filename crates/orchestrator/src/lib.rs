//! Question-answering orchestrator.
//!
//! Composes the model gateway, search augmentation, credit ledger, and
//! conversation memory into one request/response cycle behind
//! [`Orchestrator::answer_question`]. Per-channel turns are serialized through
//! [`QuestionQueue`], a strict-FIFO single-concurrency worker.

mod error;
mod messages;
mod mirror;
mod orchestrator;
mod queue;

pub use error::OrchestratorError;
pub use messages::{is_baja_command, is_greeting, payment_links_from_env, Messages};
pub use mirror::DurableMirror;
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use queue::{QuestionHandler, QuestionQueue};
