//! Content moderation against the completion service's moderation endpoint.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use crate::client::CompletionTransport;
use crate::error::GatewayError;

/// Moderation model identifier.
const MODERATION_MODEL: &str = "omni-moderation-latest";

/// Screens question text before it reaches the model.
///
/// Fails OPEN: if the moderation call errors or returns nothing, content is
/// allowed so availability is never gated on the moderation endpoint.
pub struct ModerationClient {
    transport: Arc<dyn CompletionTransport>,
    api_url: String,
}

impl ModerationClient {
    /// Create a moderation client over the given transport.
    pub fn new(transport: Arc<dyn CompletionTransport>, api_url: impl Into<String>) -> Self {
        Self {
            transport,
            api_url: api_url.into(),
        }
    }

    /// Whether the text passes moderation.
    pub async fn is_appropriate(&self, text: &str) -> bool {
        match self.flagged(text).await {
            Ok(flagged) => !flagged,
            Err(e) => {
                warn!("moderation check failed, allowing content: {}", e);
                true
            }
        }
    }

    async fn flagged(&self, text: &str) -> Result<bool, GatewayError> {
        let url = format!("{}/moderations", self.api_url);
        let body = json!({
            "model": MODERATION_MODEL,
            "input": text,
        });

        let reply = self.transport.post_json(&url, &body).await?;

        if !(200..300).contains(&reply.status) {
            return Err(GatewayError::Api {
                status: reply.status,
                detail: reply.body,
            });
        }

        let data: Value = serde_json::from_str(&reply.body)
            .map_err(|e| GatewayError::MalformedResponse(format!("invalid JSON: {e}")))?;

        data.get("results")
            .and_then(Value::as_array)
            .and_then(|results| results.first())
            .and_then(|result| result.get("flagged"))
            .and_then(Value::as_bool)
            .ok_or_else(|| {
                GatewayError::MalformedResponse("no moderation result received".to_string())
            })
    }
}
