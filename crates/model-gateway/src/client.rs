//! Completion client with single-shot endpoint negotiation.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};

use crate::api_types::{
    build_legacy_body, build_primary_body, parse_legacy, parse_primary, CompletionRequest,
    NormalizedResponse,
};
use crate::config::GatewayConfig;
use crate::error::GatewayError;

/// Default HTTP timeout for completion requests.
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Status codes that indicate the primary shape was rejected as such
/// (negotiation failure) rather than a transient problem.
const NEGOTIATION_STATUSES: [u16; 3] = [400, 403, 404];

/// A raw HTTP reply, decoupled from the HTTP client for testability.
#[derive(Debug, Clone)]
pub struct HttpReply {
    /// Status code.
    pub status: u16,
    /// Raw body text.
    pub body: String,
}

/// Transport seam between the negotiation logic and the wire.
///
/// Production uses [`HttpTransport`]; tests inject canned replies.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    /// POST a JSON body and return the raw reply.
    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpReply, GatewayError>;
}

/// Bearer-authenticated reqwest transport.
pub struct HttpTransport {
    client: Client,
    api_key: String,
}

impl HttpTransport {
    /// Create a transport with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                GatewayError::Configuration(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl CompletionTransport for HttpTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpReply, GatewayError> {
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::Network(format!("Failed to send request: {e}")))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Network(format!("Failed to read response: {e}")))?;

        Ok(HttpReply { status, body })
    }
}

/// Client that negotiates between the primary and legacy API shapes.
///
/// The primary shape is attempted first; on a negotiation-class status the
/// same semantic request is retried once against the legacy shape. A failure
/// on the legacy shape is terminal.
pub struct CompletionClient {
    transport: std::sync::Arc<dyn CompletionTransport>,
    config: GatewayConfig,
}

impl std::fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CompletionClient {
    /// Create a client over the given transport.
    pub fn new(transport: std::sync::Arc<dyn CompletionTransport>, config: GatewayConfig) -> Self {
        Self { transport, config }
    }

    /// Create a client with the production HTTP transport.
    ///
    /// Fails fast when the API key is missing.
    pub fn from_config(config: GatewayConfig) -> Result<Self, GatewayError> {
        if config.api_key.is_empty() {
            return Err(GatewayError::Configuration(
                "completion API key not set".to_string(),
            ));
        }
        let transport = HttpTransport::new(config.api_key.clone())?;
        Ok(Self::new(std::sync::Arc::new(transport), config))
    }

    /// Get the configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Issue one completion, negotiating the wire shape.
    pub async fn create(
        &self,
        request: &CompletionRequest,
    ) -> Result<NormalizedResponse, GatewayError> {
        let primary_url = format!("{}/responses", self.config.api_url);
        let legacy_url = format!("{}/chat/completions", self.config.api_url);

        let primary_body = build_primary_body(request);
        debug!(model = %request.model, "sending primary completion request");

        let reply = self.transport.post_json(&primary_url, &primary_body).await?;

        if NEGOTIATION_STATUSES.contains(&reply.status) {
            info!(
                status = reply.status,
                "primary shape rejected, falling back to legacy shape"
            );
            return self.create_legacy(&legacy_url, request).await;
        }

        if !(200..300).contains(&reply.status) {
            return Err(GatewayError::Api {
                status: reply.status,
                detail: reply.body,
            });
        }

        parse_primary(&reply.body)
    }

    /// One-shot legacy call; any failure here is terminal.
    async fn create_legacy(
        &self,
        url: &str,
        request: &CompletionRequest,
    ) -> Result<NormalizedResponse, GatewayError> {
        let body = build_legacy_body(request);
        let reply = self.transport.post_json(url, &body).await?;

        if !(200..300).contains(&reply.status) {
            return Err(GatewayError::Api {
                status: reply.status,
                detail: reply.body,
            });
        }

        parse_legacy(&reply.body)
    }
}
