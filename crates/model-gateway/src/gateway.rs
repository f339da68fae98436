//! Per-request orchestration: completion, tool extraction, search follow-up.

use std::sync::Arc;

use assistant_core::{ChatMessage, ChatRole, KnownTool, SearchArgs, TokenUsage};
use search_client::SearchHandler;
use tracing::{debug, info, warn};

use crate::api_types::{CompletionRequest, NormalizedResponse, RequestMessage, ToolDefinition};
use crate::client::CompletionClient;
use crate::config::GatewayConfig;
use crate::heuristic::needs_current_info;

/// Deterministic fallback answer for any transport or parse failure.
pub const TECHNICAL_FALLBACK: &str = "Lo siento, tengo dificultades técnicas en este momento. \
Por favor, intenta de nuevo en unos minutos o contacta con un profesional para consultas \
urgentes.";

/// The gateway's answer for one turn, before metering.
#[derive(Debug, Clone)]
pub struct GatewayAnswer {
    /// Final response text.
    pub text: String,
    /// Aggregate usage across the first call and any follow-up.
    pub usage: TokenUsage,
    /// Whether search augmentation ran.
    pub search_used: bool,
    /// Cost of the search call in minor units (zero if cached or unused).
    pub search_cost_cents: i64,
    /// Source URLs from the search provider.
    pub sources: Vec<String>,
}

impl GatewayAnswer {
    fn fallback() -> Self {
        Self {
            text: TECHNICAL_FALLBACK.to_string(),
            usage: TokenUsage::default(),
            search_used: false,
            search_cost_cents: 0,
            sources: Vec::new(),
        }
    }
}

/// Gateway to the completion service with search augmentation.
///
/// A request moves through: draft, first completion, optional tool execution
/// or heuristic-forced search, optional follow-up completion, done. Any
/// failure past the first completion degrades to the best text available;
/// a failure of the first completion degrades to [`TECHNICAL_FALLBACK`].
pub struct ModelGateway {
    client: CompletionClient,
    search: Arc<SearchHandler>,
    config: GatewayConfig,
}

impl ModelGateway {
    /// Create a gateway over a completion client and a search handler.
    pub fn new(client: CompletionClient, search: Arc<SearchHandler>) -> Self {
        let config = client.config().clone();
        Self {
            client,
            search,
            config,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Get the search handler.
    pub fn search(&self) -> &Arc<SearchHandler> {
        &self.search
    }

    /// Answer one question with bounded conversation history.
    ///
    /// Never fails: the worst case is the fixed apology text with zero usage.
    pub async fn answer(&self, question: &str, history: &[ChatMessage]) -> GatewayAnswer {
        let messages = self.base_messages(question, history);

        let request = CompletionRequest {
            model: self.config.model.clone(),
            messages,
            tools: vec![ToolDefinition::current_info_search()],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let first = match self.client.create(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("completion failed: {}", e);
                return GatewayAnswer::fallback();
            }
        };

        if let Some(call) = first.tool_call.clone() {
            match KnownTool::from_name(&call.invocation.name) {
                Some(KnownTool::CurrentInfoSearch) => {
                    return self.answer_with_tool_search(question, history, first, call).await;
                }
                None => {
                    // Unrecognized tool: ignore it and use the text response.
                    warn!(tool = %call.invocation.name, "unknown tool requested, ignoring");
                }
            }
        } else if needs_current_info(question) {
            info!("heuristic forced search for current information");
            return self.answer_with_forced_search(question, history, first).await;
        }

        GatewayAnswer {
            text: first
                .text
                .unwrap_or_else(|| TECHNICAL_FALLBACK.to_string()),
            usage: first.usage,
            search_used: false,
            search_cost_cents: 0,
            sources: Vec::new(),
        }
    }

    /// Model-directed path: execute the search tool and feed the result back
    /// as a tool-role message in one follow-up call.
    async fn answer_with_tool_search(
        &self,
        question: &str,
        history: &[ChatMessage],
        first: NormalizedResponse,
        call: crate::api_types::ExtractedToolCall,
    ) -> GatewayAnswer {
        let args = match SearchArgs::from_invocation(&call.invocation) {
            Ok(args) => args,
            Err(e) => {
                warn!("malformed search arguments: {}", e);
                return GatewayAnswer {
                    text: first
                        .text
                        .unwrap_or_else(|| TECHNICAL_FALLBACK.to_string()),
                    usage: first.usage,
                    search_used: false,
                    search_cost_cents: 0,
                    sources: Vec::new(),
                };
            }
        };

        debug!(query = %args.query, reason = ?args.search_reason, "model requested search");

        let outcome = self
            .search
            .search(&args.query, args.focus_sites.as_deref())
            .await;

        let mut messages = self.base_messages(question, history);
        messages.push(RequestMessage::assistant_tool_echo(call.raw.clone()));
        messages.push(RequestMessage::tool_result(&call.id, &outcome.content));

        let follow_up_request = CompletionRequest {
            model: self.config.model.clone(),
            messages,
            tools: Vec::new(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        match self.client.create(&follow_up_request).await {
            Ok(follow_up) => GatewayAnswer {
                text: follow_up
                    .text
                    .or(first.text)
                    .unwrap_or_else(|| TECHNICAL_FALLBACK.to_string()),
                usage: first.usage.combined(&follow_up.usage),
                search_used: outcome.success,
                search_cost_cents: outcome.cost_cents,
                sources: outcome.sources,
            },
            Err(e) => {
                warn!("tool follow-up failed: {}", e);
                GatewayAnswer {
                    text: first
                        .text
                        .unwrap_or_else(|| TECHNICAL_FALLBACK.to_string()),
                    usage: first.usage,
                    search_used: outcome.success,
                    search_cost_cents: outcome.cost_cents,
                    sources: outcome.sources,
                }
            }
        }
    }

    /// Heuristic path: the model did not ask for the tool, so the search runs
    /// directly and its result is injected as system context for one
    /// follow-up call. The tool is not offered a second time.
    async fn answer_with_forced_search(
        &self,
        question: &str,
        history: &[ChatMessage],
        first: NormalizedResponse,
    ) -> GatewayAnswer {
        let outcome = self.search.search(question, None).await;

        if !outcome.success {
            // Forced search failed: keep the model's direct answer.
            return GatewayAnswer {
                text: first
                    .text
                    .unwrap_or_else(|| TECHNICAL_FALLBACK.to_string()),
                usage: first.usage,
                search_used: false,
                search_cost_cents: 0,
                sources: Vec::new(),
            };
        }

        let mut messages = self.base_messages(question, history);
        messages.push(RequestMessage::plain(
            ChatRole::System,
            format!(
                "Información actualizada obtenida de fuentes oficiales:\n{}",
                outcome.content
            ),
        ));

        let follow_up_request = CompletionRequest {
            model: self.config.model.clone(),
            messages,
            tools: Vec::new(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        match self.client.create(&follow_up_request).await {
            Ok(follow_up) => GatewayAnswer {
                text: follow_up
                    .text
                    .or(first.text)
                    .unwrap_or_else(|| TECHNICAL_FALLBACK.to_string()),
                usage: first.usage.combined(&follow_up.usage),
                search_used: true,
                search_cost_cents: outcome.cost_cents,
                sources: outcome.sources,
            },
            Err(e) => {
                warn!("forced-search follow-up failed: {}", e);
                GatewayAnswer {
                    text: first
                        .text
                        .unwrap_or_else(|| TECHNICAL_FALLBACK.to_string()),
                    usage: first.usage,
                    search_used: true,
                    search_cost_cents: outcome.cost_cents,
                    sources: outcome.sources,
                }
            }
        }
    }

    /// Merge the system instruction, bounded history, and current question
    /// into one ordered message list.
    fn base_messages(&self, question: &str, history: &[ChatMessage]) -> Vec<RequestMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);

        messages.push(RequestMessage::plain(
            ChatRole::System,
            self.config.system_prompt.clone(),
        ));

        for message in history {
            messages.push(RequestMessage::plain(message.role, message.content.clone()));
        }

        messages.push(RequestMessage::plain(ChatRole::User, question));
        messages
    }
}
