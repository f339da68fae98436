//! Normalized token usage.
//!
//! Both completion API shapes are reduced to this triple before any pricing
//! happens. The legacy chat shape reports no cached-token figure, so its
//! normalizer sets `cached_tokens` to zero.

use serde::{Deserialize, Serialize};

/// Token usage for one or more completion calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Total input tokens, including any cached prefix.
    pub input_tokens: u32,
    /// Input tokens served from the provider's prompt cache.
    pub cached_tokens: u32,
    /// Generated output tokens.
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Create a usage triple.
    pub fn new(input_tokens: u32, cached_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            cached_tokens,
            output_tokens,
        }
    }

    /// Input tokens billed at the full rate.
    ///
    /// Cached tokens are billed separately at their discounted rate.
    pub fn billable_input_tokens(&self) -> u32 {
        self.input_tokens.saturating_sub(self.cached_tokens)
    }

    /// Sum two usage figures field by field.
    ///
    /// Used to aggregate the first call and the tool follow-up call into one
    /// figure for the whole turn.
    pub fn combined(&self, other: &TokenUsage) -> TokenUsage {
        TokenUsage {
            input_tokens: self.input_tokens + other.input_tokens,
            cached_tokens: self.cached_tokens + other.cached_tokens,
            output_tokens: self.output_tokens + other.output_tokens,
        }
    }

    /// Whether no tokens were consumed at all.
    pub fn is_zero(&self) -> bool {
        self.input_tokens == 0 && self.cached_tokens == 0 && self.output_tokens == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_billable_input_subtracts_cached() {
        let usage = TokenUsage::new(1200, 1024, 300);
        assert_eq!(usage.billable_input_tokens(), 176);
    }

    #[test]
    fn test_billable_input_never_underflows() {
        let usage = TokenUsage::new(100, 500, 0);
        assert_eq!(usage.billable_input_tokens(), 0);
    }

    #[test]
    fn test_combined_adds_each_field() {
        let first = TokenUsage::new(800, 200, 150);
        let follow_up = TokenUsage::new(400, 0, 100);
        let total = first.combined(&follow_up);

        assert_eq!(total.input_tokens, 1200);
        assert_eq!(total.cached_tokens, 200);
        assert_eq!(total.output_tokens, 250);
    }

    #[test]
    fn test_is_zero() {
        assert!(TokenUsage::default().is_zero());
        assert!(!TokenUsage::new(1, 0, 0).is_zero());
    }
}
