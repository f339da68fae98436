//! The main orchestrator: one question in, one metered answer out.

use std::sync::Arc;
use std::time::Duration;

use assistant_core::{AnswerOutcome, ChatMessage, ChatRole};
use conversation::{ConversationMemory, ConversationMirror};
use credits::{CreditLedger, LedgerConfig, MemoryStore, MeteringMode, SqliteStore};
use database::Database;
use model_gateway::{
    CompletionClient, GatewayConfig, HttpTransport, ModelGateway, ModerationClient,
};
use pricing::{price_usage, to_display_cents, PricingConfig};
use search_client::{SearchConfig, SearchHandler, SearchProvider};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::OrchestratorError;
use crate::messages::{self, Messages};
use crate::mirror::DurableMirror;

/// Orchestrator-level configuration.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    /// Top-up links rendered in the no-balance message.
    pub payment_links: Vec<String>,
}

/// Composes gateway, search, ledger, and memory into one answer cycle.
///
/// `answer_question` never returns an unhandled failure to its caller: the
/// worst case is the fixed apology text with zero cost debited. The only
/// error cases are deliberately skipped turns (blocked users).
pub struct Orchestrator {
    gateway: ModelGateway,
    ledger: CreditLedger,
    memory: ConversationMemory,
    pricing: PricingConfig,
    moderation: Option<ModerationClient>,
    mirror: Option<Arc<dyn ConversationMirror>>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Create an orchestrator from its components.
    pub fn new(gateway: ModelGateway, ledger: CreditLedger, memory: ConversationMemory) -> Self {
        Self {
            gateway,
            ledger,
            memory,
            pricing: PricingConfig::default(),
            moderation: None,
            mirror: None,
            config: OrchestratorConfig::default(),
        }
    }

    /// Set the pricing configuration.
    pub fn with_pricing(mut self, pricing: PricingConfig) -> Self {
        self.pricing = pricing;
        self
    }

    /// Enable the moderation gate.
    pub fn with_moderation(mut self, moderation: ModerationClient) -> Self {
        self.moderation = Some(moderation);
        self
    }

    /// Register the durable mirror so data erasure can purge mirrored rows.
    pub fn with_mirror(mut self, mirror: Arc<dyn ConversationMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// Set orchestrator-level configuration.
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Create an orchestrator from environment variables.
    ///
    /// Composes all collaborators: completion gateway (`OPENAI_*`), search
    /// (`PERPLEXITY_*`, `SEARCH_*`), metering (`BOT_*`), pricing
    /// (`COST_MULTIPLIER`, `USD_EUR_RATE`), conversation memory
    /// (`CONVERSATION_TIMEOUT_SECS`, `CONVERSATION_MAX_MESSAGES`), and the
    /// optional durable store (`DATABASE_URL`). Absence of the durable store
    /// degrades metering to the in-memory mock mode.
    pub async fn from_env() -> Result<Self, OrchestratorError> {
        let gateway_config = GatewayConfig::from_env()
            .map_err(|e| OrchestratorError::Configuration(e.to_string()))?;

        let transport = Arc::new(
            HttpTransport::new(gateway_config.api_key.clone())
                .map_err(|e| OrchestratorError::Configuration(e.to_string()))?,
        );

        let search_provider = SearchProvider::new(SearchConfig::from_env())
            .map_err(|e| OrchestratorError::Configuration(e.to_string()))?;
        let cache_ttl = std::env::var("SEARCH_CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(search_client::DEFAULT_CACHE_TTL);
        let search = Arc::new(SearchHandler::with_ttl(search_provider, cache_ttl));

        let moderation =
            ModerationClient::new(transport.clone(), gateway_config.api_url.clone());
        let client = CompletionClient::new(transport, gateway_config);
        let gateway = ModelGateway::new(client, search);

        let timeout = std::env::var("CONVERSATION_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(conversation::DEFAULT_TIMEOUT);
        let window = std::env::var("CONVERSATION_MAX_MESSAGES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(conversation::DEFAULT_MAX_MESSAGES);

        let ledger_config = LedgerConfig::from_env();

        let (ledger, memory, mirror) = match std::env::var("DATABASE_URL") {
            Ok(url) => {
                let db = Database::connect(&url)
                    .await
                    .map_err(|e| OrchestratorError::Configuration(e.to_string()))?;
                db.migrate()
                    .await
                    .map_err(|e| OrchestratorError::Configuration(e.to_string()))?;

                let mirror: Arc<dyn ConversationMirror> =
                    Arc::new(DurableMirror::new(db.clone()));
                let ledger =
                    CreditLedger::new(Arc::new(SqliteStore::new(db)), ledger_config);
                let memory =
                    ConversationMemory::new(timeout, window).with_mirror(mirror.clone());
                (ledger, memory, Some(mirror))
            }
            Err(_) => {
                warn!("DATABASE_URL not set, using in-memory stores");
                let ledger = CreditLedger::new(Arc::new(MemoryStore::new()), ledger_config);
                (ledger, ConversationMemory::new(timeout, window), None)
            }
        };

        let mut orchestrator = Self::new(gateway, ledger, memory)
            .with_pricing(PricingConfig::from_env())
            .with_moderation(moderation)
            .with_config(OrchestratorConfig {
                payment_links: messages::payment_links_from_env(),
            });
        orchestrator.mirror = mirror;

        Ok(orchestrator)
    }

    /// Get the credit ledger.
    pub fn ledger(&self) -> &CreditLedger {
        &self.ledger
    }

    /// Get the conversation memory.
    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Get the gateway.
    pub fn gateway(&self) -> &ModelGateway {
        &self.gateway
    }

    /// Answer one question for one user.
    pub async fn answer_question(
        &self,
        user_key: &str,
        text: &str,
    ) -> Result<AnswerOutcome, OrchestratorError> {
        let Some(user) = self.ledger.ensure_user(user_key).await else {
            warn!(user_key, "failed to ensure user");
            return Ok(AnswerOutcome::text_only(Messages::error()));
        };

        if user.is_blocked {
            return Err(OrchestratorError::Skipped(format!(
                "blocked user: {user_key}"
            )));
        }

        let is_new_user = self.ledger.is_first_interaction(user_key).await;

        // Data-erasure command cascades user, ledger, and conversation state.
        if messages::is_baja_command(text) {
            return Ok(self.erase_user_data(&user.id, user_key).await);
        }

        // Bare greetings answer with the welcome template, no model call.
        if messages::is_greeting(text) {
            if is_new_user {
                self.ledger.clear_first_interaction(user_key).await;
            }
            return Ok(AnswerOutcome::text_only(Messages::welcome(is_new_user)));
        }

        if let Some(moderation) = &self.moderation {
            if !moderation.is_appropriate(text).await {
                info!(user_key, "message rejected by moderation");
                return Ok(AnswerOutcome::text_only(Messages::moderation_warning()));
            }
        }

        // Metering gate: terminal states answer with their fixed template.
        match self.ledger.config().mode {
            MeteringMode::Balance => {
                if !self.ledger.has_balance(&user.id).await {
                    return Ok(AnswerOutcome::text_only(Messages::no_credits(
                        &self.config.payment_links,
                    )));
                }
            }
            MeteringMode::Quota => {
                if !self.ledger.has_messages_remaining(&user.id).await {
                    return Ok(AnswerOutcome::text_only(Messages::message_limit_reached()));
                }
            }
        }

        self.memory.add_user_message(user_key, text).await;

        // History for the model excludes the message just recorded.
        let stored = self.memory.history(user_key).await;
        let history: Vec<ChatMessage> = stored
            .iter()
            .take(stored.len().saturating_sub(1))
            .map(|m| ChatMessage {
                role: m.role,
                content: m.content.clone(),
            })
            .collect();

        let answer = self.gateway.answer(text, &history).await;

        let breakdown = price_usage(&self.gateway.config().model, &answer.usage, &self.pricing);
        let model_cents = to_display_cents(breakdown.cost_usd, self.pricing.usd_eur_rate);
        let total_cents = model_cents + answer.search_cost_cents;

        match self.ledger.config().mode {
            MeteringMode::Balance => {
                if total_cents > 0 {
                    let turn_ref = Uuid::new_v4().to_string();
                    let new_balance = self
                        .ledger
                        .debit(&user.id, total_cents, Some(&turn_ref))
                        .await;
                    info!(
                        user_key,
                        total_cents, new_balance, search_used = answer.search_used,
                        "turn debited"
                    );
                }
            }
            MeteringMode::Quota => {
                let count = self.ledger.increment_message_count(&user.id).await;
                info!(user_key, count, "quota incremented");
            }
        }

        self.memory
            .add_assistant_message(user_key, &answer.text)
            .await;

        // First real question from a new user gets the welcome prepended.
        let text = if is_new_user {
            self.ledger.clear_first_interaction(user_key).await;
            format!("{}\n\n{}", Messages::welcome(true), answer.text)
        } else {
            answer.text
        };

        Ok(AnswerOutcome {
            text,
            cost_cents: total_cents,
            search_used: answer.search_used,
            sources: answer.sources,
        })
    }

    async fn erase_user_data(&self, user_id: &str, user_key: &str) -> AnswerOutcome {
        let deleted = self.ledger.delete_user_data(user_id).await;
        self.memory.clear(user_key).await;

        if let Some(mirror) = &self.mirror {
            if let Err(e) = mirror.purge(user_key).await {
                warn!(user_key, "mirror purge failed: {}", e);
            }
        }

        if deleted {
            AnswerOutcome::text_only(Messages::data_deleted())
        } else {
            AnswerOutcome::text_only(Messages::error())
        }
    }
}
