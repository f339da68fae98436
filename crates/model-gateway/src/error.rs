//! Gateway error types.

use thiserror::Error;

/// Errors that can occur while talking to the completion service.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing or invalid credentials/configuration.
    #[error("gateway configuration error: {0}")]
    Configuration(String),

    /// Network/HTTP failure reaching the service.
    #[error("gateway network error: {0}")]
    Network(String),

    /// The service answered with a non-success status (after any fallback).
    #[error("completion API error ({status}): {detail}")]
    Api { status: u16, detail: String },

    /// Expected fields missing from a service response.
    #[error("malformed completion response: {0}")]
    MalformedResponse(String),
}
