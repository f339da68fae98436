//! The caller-facing result of one answered turn.

use serde::{Deserialize, Serialize};

/// Outcome of `answer_question` for one user turn.
///
/// The transport adapter renders `text` and `sources` to the end user;
/// `cost_cents` is the amount already metered against the user's balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOutcome {
    /// Final response text.
    pub text: String,
    /// Total cost debited for this turn, in display-currency minor units.
    pub cost_cents: i64,
    /// Whether search augmentation ran during this turn.
    pub search_used: bool,
    /// Source URLs surfaced by the search provider, capped upstream.
    pub sources: Vec<String>,
}

impl AnswerOutcome {
    /// A zero-cost outcome carrying only text (greetings, fallbacks, notices).
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            cost_cents: 0,
            search_used: false,
            sources: Vec::new(),
        }
    }
}
