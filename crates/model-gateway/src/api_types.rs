//! Canonical request value and the two wire shapes.
//!
//! The canonical [`CompletionRequest`] is translated by two pure builders:
//! [`build_primary_body`] for the structured "responses" shape and
//! [`build_legacy_body`] for the legacy chat shape. The matching parsers
//! normalize either response into one [`NormalizedResponse`] so the rest of
//! the gateway never sees which shape answered.

use assistant_core::{ChatRole, TokenUsage, ToolInvocation, SEARCH_TOOL_NAME};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::GatewayError;

/// A message in the canonical request list.
#[derive(Debug, Clone, Serialize)]
pub struct RequestMessage {
    /// Message role.
    pub role: ChatRole,
    /// Content; `None` for an assistant message that only carries tool calls.
    pub content: Option<String>,
    /// Tool calls echoed back on the assistant message of a follow-up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Value>,
    /// Id of the tool call a tool-role message answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl RequestMessage {
    /// A plain message with content.
    pub fn plain(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// The assistant message echoing a tool call in a follow-up request.
    pub fn assistant_tool_echo(tool_calls: Value) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: None,
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    /// A tool-role message carrying a tool result.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// A function-tool declaration offered to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// What the tool does, for the model.
    pub description: String,
    /// JSON-schema parameter declaration.
    pub parameters: Value,
}

impl ToolDefinition {
    /// The current-information search tool.
    pub fn current_info_search() -> Self {
        Self {
            name: SEARCH_TOOL_NAME.to_string(),
            description: "Busca información actualizada sobre inmigración española cuando \
                exista cualquier posibilidad de cambios recientes, variaciones por provincia o \
                detalles sensibles a la fecha: cambios en leyes, nuevos requisitos/tasas, \
                tiempos de procesamiento, y cuando el usuario mencione años (2023+), \
                \"cambios\", \"nuevo\" o \"actualizado\"."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "La consulta específica que necesita información actualizada."
                    },
                    "focus_sites": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Sitios específicos donde buscar (opcional)."
                    },
                    "search_reason": {
                        "type": "string",
                        "description": "Breve explicación de por qué se necesita buscar."
                    }
                },
                "required": ["query"]
            }),
        }
    }
}

/// The canonical, shape-independent completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Model id.
    pub model: String,
    /// Ordered message list: system instruction, bounded history, question.
    pub messages: Vec<RequestMessage>,
    /// Tools offered to the model (empty on follow-up calls).
    pub tools: Vec<ToolDefinition>,
    /// Maximum output tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

/// A tool call extracted from a response, with its wire id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedToolCall {
    /// Wire-level call id, echoed back in the follow-up.
    pub id: String,
    /// The invocation itself.
    pub invocation: ToolInvocation,
    /// Raw wire form for the assistant echo message.
    pub raw: Value,
}

/// Either wire shape, reduced to what the gateway needs.
#[derive(Debug, Clone, Default)]
pub struct NormalizedResponse {
    /// Response text, if any.
    pub text: Option<String>,
    /// The first tool call, if any (single-tool-per-turn contract).
    pub tool_call: Option<ExtractedToolCall>,
    /// Usage normalized to the `{input, cached, output}` triple.
    pub usage: TokenUsage,
}

/// Build the primary ("responses") request body.
///
/// The primary shape takes a single `input` string: all system messages are
/// joined first, tool results (follow-up path) are appended as a labelled
/// block, and the last user message closes the prompt. Tool declarations are
/// flattened into the shape's top-level tool format.
pub fn build_primary_body(request: &CompletionRequest) -> Value {
    let mut body = json!({
        "model": request.model,
        "temperature": request.temperature,
    });

    let mut input = String::new();

    for message in &request.messages {
        if message.role == ChatRole::System {
            if let Some(content) = &message.content {
                if !input.is_empty() {
                    input.push_str("\n\n");
                }
                input.push_str(content);
            }
        }
    }

    for message in &request.messages {
        if message.role == ChatRole::Tool {
            if let Some(content) = &message.content {
                if !input.is_empty() {
                    input.push_str("\n\n");
                }
                input.push_str("Resultado de búsqueda:\n");
                input.push_str(content);
            }
        }
    }

    let last_user = request
        .messages
        .iter()
        .rev()
        .find(|m| m.role == ChatRole::User)
        .and_then(|m| m.content.as_deref())
        .unwrap_or("Hola");

    if input.is_empty() {
        input.push_str(last_user);
    } else {
        input.push_str(&format!("\n\nUser: {last_user}"));
    }

    body["input"] = Value::String(input);

    if !request.tools.is_empty() {
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters,
                })
            })
            .collect();
        body["tools"] = Value::Array(tools);
    }

    body
}

/// Build the legacy ("chat completions") request body.
pub fn build_legacy_body(request: &CompletionRequest) -> Value {
    let messages: Vec<Value> = request
        .messages
        .iter()
        .map(|message| {
            let mut entry = json!({
                "role": message.role.as_str(),
                "content": message.content,
            });
            if let Some(tool_calls) = &message.tool_calls {
                entry["tool_calls"] = tool_calls.clone();
            }
            if let Some(tool_call_id) = &message.tool_call_id {
                entry["tool_call_id"] = Value::String(tool_call_id.clone());
            }
            entry
        })
        .collect();

    let mut body = json!({
        "model": request.model,
        "messages": messages,
        "max_tokens": request.max_tokens,
        "temperature": request.temperature,
    });

    if !request.tools.is_empty() {
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    }
                })
            })
            .collect();
        body["tools"] = Value::Array(tools);
        body["tool_choice"] = Value::String("auto".to_string());
    }

    body
}

fn tool_call_from_wire(raw: &Value) -> Option<ExtractedToolCall> {
    let function = raw.get("function")?;
    let name = function.get("name")?.as_str()?.to_string();
    let arguments = function.get("arguments")?.as_str().unwrap_or("{}");

    let invocation = ToolInvocation::from_call(name, arguments).ok()?;
    let id = raw
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or("tool_call_1")
        .to_string();

    Some(ExtractedToolCall {
        id,
        invocation,
        raw: raw.clone(),
    })
}

/// Parse a primary-shape response body.
///
/// The primary shape returns an `output` array mixing message items (whose
/// content is an array of text blocks) and `function_call` items. Only the
/// first tool call is extracted.
pub fn parse_primary(body: &str) -> Result<NormalizedResponse, GatewayError> {
    let data: Value = serde_json::from_str(body)
        .map_err(|e| GatewayError::MalformedResponse(format!("invalid JSON: {e}")))?;

    let mut text: Option<String> = None;
    let mut tool_call: Option<ExtractedToolCall> = None;

    match data.get("output") {
        Some(Value::Array(items)) => {
            for item in items {
                let item_type = item.get("type").and_then(Value::as_str).unwrap_or("");

                if item_type == "message" {
                    match item.get("content") {
                        Some(Value::Array(blocks)) => {
                            let block_text = blocks
                                .iter()
                                .filter(|block| {
                                    matches!(
                                        block.get("type").and_then(Value::as_str),
                                        Some("text") | Some("output_text")
                                    )
                                })
                                .find_map(|block| block.get("text").and_then(Value::as_str));
                            if text.is_none() {
                                text = block_text.map(|t| t.to_string());
                            }
                        }
                        Some(Value::String(content)) => {
                            if text.is_none() {
                                text = Some(content.clone());
                            }
                        }
                        _ => {}
                    }
                }

                if item_type == "function_call" && tool_call.is_none() {
                    // The flattened item carries name/arguments at the top level.
                    let name = item
                        .get("name")
                        .and_then(Value::as_str)
                        .or_else(|| {
                            item.get("function")
                                .and_then(|f| f.get("name"))
                                .and_then(Value::as_str)
                        });
                    let arguments = item
                        .get("arguments")
                        .and_then(Value::as_str)
                        .or_else(|| {
                            item.get("function")
                                .and_then(|f| f.get("arguments"))
                                .and_then(Value::as_str)
                        })
                        .unwrap_or("{}");

                    if let Some(name) = name {
                        if let Ok(invocation) = ToolInvocation::from_call(name, arguments) {
                            let id = item
                                .get("id")
                                .and_then(Value::as_str)
                                .unwrap_or("function_call_1")
                                .to_string();
                            tool_call = Some(ExtractedToolCall {
                                id: id.clone(),
                                invocation,
                                raw: json!([{
                                    "id": id,
                                    "type": "function",
                                    "function": {"name": name, "arguments": arguments},
                                }]),
                            });
                        }
                    }
                }
            }
        }
        Some(Value::String(output)) => {
            text = Some(output.clone());
        }
        _ => {}
    }

    let usage = data
        .get("usage")
        .map(|usage| TokenUsage {
            input_tokens: usage
                .get("input_tokens")
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32,
            cached_tokens: usage
                .get("cached_tokens")
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32,
            output_tokens: usage
                .get("output_tokens")
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32,
        })
        .unwrap_or_default();

    Ok(NormalizedResponse {
        text,
        tool_call,
        usage,
    })
}

/// Parse a legacy-shape response body.
///
/// The legacy shape reports no cached-token figure; that field normalizes to
/// zero.
pub fn parse_legacy(body: &str) -> Result<NormalizedResponse, GatewayError> {
    let data: Value = serde_json::from_str(body)
        .map_err(|e| GatewayError::MalformedResponse(format!("invalid JSON: {e}")))?;

    let message = data
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| {
            GatewayError::MalformedResponse("no message in legacy response".to_string())
        })?;

    let text = message
        .get("content")
        .and_then(Value::as_str)
        .map(|s| s.to_string());

    let tool_call = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .and_then(|calls| calls.first())
        .and_then(tool_call_from_wire)
        .map(|mut call| {
            // Preserve the full wire array for the assistant echo message.
            if let Some(calls) = message.get("tool_calls") {
                call.raw = calls.clone();
            }
            call
        });

    let usage = data
        .get("usage")
        .map(|usage| TokenUsage {
            input_tokens: usage
                .get("prompt_tokens")
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32,
            cached_tokens: 0,
            output_tokens: usage
                .get("completion_tokens")
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32,
        })
        .unwrap_or_default();

    Ok(NormalizedResponse {
        text,
        tool_call,
        usage,
    })
}
