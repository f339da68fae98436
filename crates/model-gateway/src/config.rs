//! Configuration for the model gateway.

use crate::error::GatewayError;

/// Default system instruction handed to the completion service.
///
/// Treated as an opaque parameter by the gateway; deployments override it via
/// `OPENAI_SYSTEM_PROMPT`.
const DEFAULT_SYSTEM_PROMPT: &str = "Eres \"Reco Extranjería\", un asistente especializado en \
información sobre inmigración y extranjería en España. Proporciona información orientativa \
únicamente, NO asesoría legal. Responde en español claro y práctico, máximo 4-8 líneas. Usa la \
función search_current_immigration_info cuando necesites información muy reciente (cambios \
2024-2025, nuevos requisitos, plazos actuales). Recuerda siempre que esta información es \
orientativa y no constituye asesoría legal profesional.";

/// Configuration for the completion gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Completion service base URL.
    pub api_url: String,
    /// API key for authentication.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// System instruction merged into every request.
    pub system_prompt: String,
    /// Maximum output tokens per call.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4.1".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tokens: 500,
            temperature: 0.7,
        }
    }
}

impl GatewayConfig {
    /// Create configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `OPENAI_API_KEY` - API key for authentication
    ///
    /// Optional environment variables:
    /// - `OPENAI_API_URL` - base URL (default: https://api.openai.com/v1)
    /// - `OPENAI_MODEL` - model id (default: gpt-4.1)
    /// - `OPENAI_SYSTEM_PROMPT` - system instruction override
    /// - `OPENAI_MAX_TOKENS` - output ceiling (default: 500)
    /// - `OPENAI_TEMPERATURE` - sampling temperature (default: 0.7)
    pub fn from_env() -> Result<Self, GatewayError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| GatewayError::Configuration("OPENAI_API_KEY not set".to_string()))?;

        let defaults = Self::default();

        let api_url = std::env::var("OPENAI_API_URL").unwrap_or(defaults.api_url);
        let model = std::env::var("OPENAI_MODEL").unwrap_or(defaults.model);
        let system_prompt = std::env::var("OPENAI_SYSTEM_PROMPT").unwrap_or(defaults.system_prompt);

        let max_tokens = std::env::var("OPENAI_MAX_TOKENS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_tokens);

        let temperature = std::env::var("OPENAI_TEMPERATURE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.temperature);

        Ok(Self {
            api_url,
            api_key,
            model,
            system_prompt,
            max_tokens,
            temperature,
        })
    }

    /// Create a new config builder.
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder::default()
    }
}

/// Builder for [`GatewayConfig`].
#[derive(Debug, Default)]
pub struct GatewayConfigBuilder {
    config: GatewayConfig,
}

impl GatewayConfigBuilder {
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

    /// Set the model id.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Set the system instruction.
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    /// Set the output-token ceiling.
    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.config.max_tokens = tokens;
        self
    }

    /// Set the sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> GatewayConfig {
        self.config
    }
}
