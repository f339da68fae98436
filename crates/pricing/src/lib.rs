//! Token-based cost model.
//!
//! Everything in this crate is a pure function of its inputs: a per-model
//! price table, a margin multiplier, and an exchange rate. No I/O, no clocks.
//!
//! Rounding rule: minor-unit conversion uses `f64::round()`
//! (round-half-away-from-zero). It is applied once when the margined USD cost
//! becomes USD cents ([`price_usage`]) and once when USD is converted to the
//! display currency ([`to_display_cents`]); the two steps are deliberately
//! separate so each is testable on its own.

mod cost;
mod tables;

pub use cost::{price_usage, to_display_cents, CostBreakdown, PricingConfig};
pub use tables::{prices_for, ModelPrices, DEFAULT_MODEL};
