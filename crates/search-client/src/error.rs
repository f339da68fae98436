//! Search error types.

use thiserror::Error;

/// Errors from the search provider client.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Provider credentials missing or client construction failed.
    #[error("search configuration error: {0}")]
    Configuration(String),

    /// Network/HTTP failure against the provider.
    #[error("search network error: {0}")]
    Network(String),

    /// Provider answered with a non-success status.
    #[error("search provider error ({status}): {detail}")]
    Provider { status: u16, detail: String },

    /// Expected fields missing from the provider response.
    #[error("malformed search response: {0}")]
    MalformedResponse(String),
}
