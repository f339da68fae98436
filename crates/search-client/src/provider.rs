//! HTTP client for the external search provider.

use chrono::{Datelike, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::SearchError;

/// Default HTTP timeout for provider requests.
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Official sites searched when the caller gives no focus list.
const DEFAULT_FOCUS_SITES: &[&str] = &[
    "extranjeria.mitramiss.gob.es",
    "sede.administracion.gob.es",
    "boe.es",
    "sepe.es",
    "interior.gob.es",
    "inclusion.gob.es",
];

/// System instruction biasing the provider toward authoritative sources.
const SEARCH_SYSTEM_PROMPT: &str = "Eres un experto en inmigración española. Busca información \
actualizada y oficial sobre extranjería en España.\n\n\
Instrucciones:\n\
- Prioriza fuentes oficiales del gobierno español\n\
- Incluye fechas cuando sea relevante\n\
- Responde en español claro y práctico\n\
- Si encuentras cambios recientes en la legislación, menciónalo\n\
- Incluye enlaces a fuentes oficiales cuando sea posible";

/// Configuration for the search provider.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Provider API key; search is disabled when empty.
    pub api_key: String,
    /// Provider base URL.
    pub api_url: String,
    /// Provider model.
    pub model: String,
    /// Output-token ceiling per search.
    pub max_tokens: u32,
    /// Master enable flag.
    pub enabled: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: "https://api.perplexity.ai".to_string(),
            model: "llama-3.1-sonar-small-128k-online".to_string(),
            max_tokens: 500,
            enabled: true,
        }
    }
}

impl SearchConfig {
    /// Create configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `PERPLEXITY_API_KEY` - provider key; search is disabled without it
    /// - `PERPLEXITY_API_URL` - base URL (default: https://api.perplexity.ai)
    /// - `PERPLEXITY_MODEL` - model (default: llama-3.1-sonar-small-128k-online)
    /// - `SEARCH_MAX_TOKENS` - token ceiling (default: 500)
    /// - `SEARCH_ENABLED` - "false" disables search outright
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let api_key = std::env::var("PERPLEXITY_API_KEY").unwrap_or_default();
        if api_key.is_empty() {
            warn!("Perplexity API key not configured, search functionality disabled");
        }

        let api_url = std::env::var("PERPLEXITY_API_URL").unwrap_or(defaults.api_url);
        let model = std::env::var("PERPLEXITY_MODEL").unwrap_or(defaults.model);

        let max_tokens = std::env::var("SEARCH_MAX_TOKENS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_tokens);

        let enabled = std::env::var("SEARCH_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        Self {
            api_key,
            api_url,
            model,
            max_tokens,
            enabled,
        }
    }

    /// Create a new config builder.
    pub fn builder() -> SearchConfigBuilder {
        SearchConfigBuilder::default()
    }
}

/// Builder for [`SearchConfig`].
#[derive(Debug, Default)]
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    /// Set the API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    /// Set the base URL.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    /// Set the provider model.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Set the output-token ceiling.
    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.config.max_tokens = tokens;
        self
    }

    /// Enable or disable search.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> SearchConfig {
        self.config
    }
}

#[derive(Debug, Serialize)]
struct ProviderMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ProviderRequest {
    model: String,
    messages: Vec<ProviderMessage>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    search_domain_filter: Vec<String>,
    return_images: bool,
    return_related_questions: bool,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    usage: Option<ProviderUsage>,
    choices: Vec<ProviderChoice>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
struct ProviderUsage {
    #[allow(dead_code)]
    prompt_tokens: u32,
    #[allow(dead_code)]
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ProviderChoice {
    message: ProviderChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ProviderChoiceMessage {
    content: Option<String>,
}

/// A successful provider answer.
#[derive(Debug, Clone)]
pub struct ProviderAnswer {
    /// Answer content, possibly containing source links.
    pub content: String,
    /// Total tokens consumed by the call.
    pub total_tokens: u32,
}

/// Client for the external search provider.
pub struct SearchProvider {
    client: Client,
    config: SearchConfig,
}

impl SearchProvider {
    /// Create a provider client with the given configuration.
    pub fn new(config: SearchConfig) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                SearchError::Configuration(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self { client, config })
    }

    /// Create a provider client from environment variables.
    pub fn from_env() -> Result<Self, SearchError> {
        Self::new(SearchConfig::from_env())
    }

    /// Get the configuration.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Whether live search can run at all.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.api_key.is_empty()
    }

    /// Query the provider for current information.
    ///
    /// Uses low sampling temperature and the configured output-token ceiling;
    /// defaults to the official-site allow-list when no focus list is given.
    pub async fn current_info(
        &self,
        query: &str,
        focus_sites: Option<&[String]>,
    ) -> Result<ProviderAnswer, SearchError> {
        if self.config.api_key.is_empty() {
            return Err(SearchError::Configuration(
                "provider API key not set".to_string(),
            ));
        }

        let url = format!("{}/chat/completions", self.config.api_url);
        let enhanced_query = enhance_query(query, focus_sites);

        let domain_filter = match focus_sites {
            Some(sites) if !sites.is_empty() => sites.to_vec(),
            _ => DEFAULT_FOCUS_SITES.iter().map(|s| s.to_string()).collect(),
        };

        let request = ProviderRequest {
            model: self.config.model.clone(),
            messages: vec![
                ProviderMessage {
                    role: "system",
                    content: SEARCH_SYSTEM_PROMPT.to_string(),
                },
                ProviderMessage {
                    role: "user",
                    content: enhanced_query.clone(),
                },
            ],
            max_tokens: self.config.max_tokens,
            // Low temperature for factual accuracy.
            temperature: 0.1,
            top_p: 0.9,
            search_domain_filter: domain_filter,
            return_images: false,
            return_related_questions: false,
            stream: false,
        };

        debug!(query = %enhanced_query, model = %self.config.model, "sending search request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| SearchError::Network(format!("Failed to send request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SearchError::Provider {
                status: status.as_u16(),
                detail,
            });
        }

        let body: ProviderResponse = response
            .json()
            .await
            .map_err(|e| SearchError::MalformedResponse(format!("Failed to parse response: {e}")))?;

        let content = body
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| {
                SearchError::MalformedResponse("no content in provider response".to_string())
            })?;

        let total_tokens = body.usage.unwrap_or_default().total_tokens;

        info!(tokens = total_tokens, "search completed");

        Ok(ProviderAnswer {
            content,
            total_tokens,
        })
    }
}

/// Add domestic context and the current year to a raw query.
fn enhance_query(query: &str, focus_sites: Option<&[String]>) -> String {
    let mut enhanced = format!("Información actualizada sobre inmigración en España: {query}");

    if let Some(sites) = focus_sites {
        if !sites.is_empty() {
            enhanced.push_str(&format!(" (buscar en: {})", sites.join(", ")));
        }
    }

    enhanced.push_str(&format!(" - información vigente en {}", Utc::now().year()));
    enhanced
}
