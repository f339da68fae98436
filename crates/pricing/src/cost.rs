//! Cost calculation: weighted token sum, margin, minor-unit rounding.

use assistant_core::TokenUsage;
use serde::{Deserialize, Serialize};

use crate::tables::prices_for;

/// Configuration for the cost model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingConfig {
    /// Multiplier applied to the raw provider cost before rounding.
    pub margin_multiplier: f64,
    /// USD to display-currency exchange rate.
    pub usd_eur_rate: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            margin_multiplier: 1.15,
            usd_eur_rate: 1.0,
        }
    }
}

impl PricingConfig {
    /// Create configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `COST_MULTIPLIER` - margin multiplier (default: 1.15)
    /// - `USD_EUR_RATE` - exchange rate (default: 1.0)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let margin_multiplier = std::env::var("COST_MULTIPLIER")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.margin_multiplier);

        let usd_eur_rate = std::env::var("USD_EUR_RATE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.usd_eur_rate);

        Self {
            margin_multiplier,
            usd_eur_rate,
        }
    }
}

/// Derived cost of one usage figure. Never persisted; only the final debited
/// amount reaches the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    /// Total input tokens (including cached).
    pub input_tokens: u32,
    /// Cached input tokens billed at the discounted rate.
    pub cached_tokens: u32,
    /// Output tokens.
    pub output_tokens: u32,
    /// Margined cost in USD.
    pub cost_usd: f64,
    /// Margined cost rounded to USD cents.
    pub cost_usd_cents: i64,
}

/// Price a usage figure against a model's table.
///
/// Billable input is `input_tokens - cached_tokens` (clamped at zero); cached
/// tokens are billed at the discounted rate; the margin multiplier is applied
/// before rounding to integer cents.
pub fn price_usage(model: &str, usage: &TokenUsage, config: &PricingConfig) -> CostBreakdown {
    let prices = prices_for(model);

    let billable_input = usage.billable_input_tokens();
    let raw_usd = f64::from(billable_input) * prices.input_per_token
        + f64::from(usage.cached_tokens) * prices.cached_input_per_token
        + f64::from(usage.output_tokens) * prices.output_per_token;

    let cost_usd = raw_usd * config.margin_multiplier;

    CostBreakdown {
        input_tokens: usage.input_tokens,
        cached_tokens: usage.cached_tokens,
        output_tokens: usage.output_tokens,
        cost_usd,
        cost_usd_cents: (cost_usd * 100.0).round() as i64,
    }
}

/// Convert a USD amount into display-currency minor units.
///
/// Kept separate from [`price_usage`] so margin and conversion are
/// independently testable.
pub fn to_display_cents(cost_usd: f64, usd_eur_rate: f64) -> i64 {
    (cost_usd * usd_eur_rate * 100.0).round() as i64
}
