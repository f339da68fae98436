//! Model gateway.
//!
//! Builds completion requests from a canonical value, negotiates between the
//! primary ("responses") and legacy ("chat completions") API shapes, extracts
//! tool invocations, normalizes usage into one triple, and orchestrates the
//! follow-up round-trip when a tool call must be satisfied by the search
//! layer. Any transport or parse failure is converted into a deterministic
//! fallback answer with zero usage; the gateway never propagates a raw
//! transport error to its caller.

mod api_types;
mod client;
mod config;
mod error;
mod gateway;
mod heuristic;
mod moderation;

pub use api_types::{
    build_legacy_body, build_primary_body, parse_legacy, parse_primary, CompletionRequest,
    ExtractedToolCall, NormalizedResponse, RequestMessage, ToolDefinition,
};
pub use client::{CompletionClient, CompletionTransport, HttpReply, HttpTransport};
pub use config::GatewayConfig;
pub use error::GatewayError;
pub use gateway::{GatewayAnswer, ModelGateway, TECHNICAL_FALLBACK};
pub use heuristic::needs_current_info;
pub use moderation::ModerationClient;
