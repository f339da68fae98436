//! Shared types for the Reco assistant.
//!
//! This crate provides the vocabulary used across the workspace:
//!
//! - [`ChatRole`] / [`ChatMessage`] - ordered message lists sent to the model
//! - [`TokenUsage`] - the normalized usage triple both API shapes reduce to
//! - [`ToolInvocation`] / [`KnownTool`] - tool calls surfaced by the model
//! - [`AnswerOutcome`] - the caller-facing result of one answered turn

mod answer;
mod message;
mod tools;
mod usage;

pub use answer::AnswerOutcome;
pub use message::{ChatMessage, ChatRole};
pub use tools::{KnownTool, SearchArgs, ToolInvocation, SEARCH_TOOL_NAME};
pub use usage::TokenUsage;
