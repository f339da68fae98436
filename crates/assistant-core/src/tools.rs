//! Tool invocations surfaced by the model.
//!
//! The model names a function by string; routing happens over a closed set of
//! known tools, with unknown names falling through to a no-op branch.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name of the current-information search tool offered to the model.
pub const SEARCH_TOOL_NAME: &str = "search_current_immigration_info";

/// A tool call extracted from a model response.
///
/// Transient value consumed within one orchestration cycle; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Tool name as declared by the model.
    pub name: String,
    /// Raw argument payload.
    pub arguments: Value,
}

impl ToolInvocation {
    /// Parse the argument payload from a JSON string.
    pub fn from_call(name: impl Into<String>, arguments_json: &str) -> Result<Self, serde_json::Error> {
        let arguments: Value = serde_json::from_str(arguments_json)?;
        Ok(Self {
            name: name.into(),
            arguments,
        })
    }
}

/// The closed set of tools this system knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownTool {
    /// Search augmentation via the external search provider.
    CurrentInfoSearch,
}

impl KnownTool {
    /// Map a declared tool name onto the closed variant.
    ///
    /// Unrecognized names return `None` and the caller falls back to the
    /// model's text response.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            SEARCH_TOOL_NAME => Some(KnownTool::CurrentInfoSearch),
            _ => None,
        }
    }
}

/// Arguments of a [`KnownTool::CurrentInfoSearch`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SearchArgs {
    /// The query needing current information.
    pub query: String,
    /// Optional specific sites to search.
    #[serde(default)]
    pub focus_sites: Option<Vec<String>>,
    /// Short model-provided justification for the search.
    #[serde(default)]
    pub search_reason: Option<String>,
}

impl SearchArgs {
    /// Decode search arguments from an invocation payload.
    pub fn from_invocation(invocation: &ToolInvocation) -> Result<Self, serde_json::Error> {
        serde_json::from_value(invocation.arguments.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_tool_from_name() {
        assert_eq!(
            KnownTool::from_name(SEARCH_TOOL_NAME),
            Some(KnownTool::CurrentInfoSearch)
        );
        assert_eq!(KnownTool::from_name("save_profile"), None);
    }

    #[test]
    fn test_invocation_from_call() {
        let invocation = ToolInvocation::from_call(
            SEARCH_TOOL_NAME,
            r#"{"query": "requisitos arraigo 2024", "search_reason": "referencia a año"}"#,
        )
        .unwrap();

        let args = SearchArgs::from_invocation(&invocation).unwrap();
        assert_eq!(args.query, "requisitos arraigo 2024");
        assert!(args.focus_sites.is_none());
        assert_eq!(args.search_reason.as_deref(), Some("referencia a año"));
    }

    #[test]
    fn test_invocation_rejects_malformed_payload() {
        assert!(ToolInvocation::from_call(SEARCH_TOOL_NAME, "not json").is_err());
    }

    #[test]
    fn test_search_args_require_query() {
        let invocation =
            ToolInvocation::from_call(SEARCH_TOOL_NAME, r#"{"focus_sites": ["boe.es"]}"#).unwrap();
        assert!(SearchArgs::from_invocation(&invocation).is_err());
    }
}
