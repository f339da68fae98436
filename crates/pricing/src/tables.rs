//! Per-model price tables, in USD per token.

/// Prices for one model, in USD per single token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPrices {
    /// Price per non-cached input token.
    pub input_per_token: f64,
    /// Price per cached input token.
    pub cached_input_per_token: f64,
    /// Price per output token.
    pub output_per_token: f64,
}

/// Model whose prices apply when the requested model is unlisted.
pub const DEFAULT_MODEL: &str = "gpt-4.1";

const GPT_4_1: ModelPrices = ModelPrices {
    input_per_token: 2.00 / 1_000_000.0,
    cached_input_per_token: 0.50 / 1_000_000.0,
    output_per_token: 8.00 / 1_000_000.0,
};

const GPT_4_1_MINI: ModelPrices = ModelPrices {
    input_per_token: 0.40 / 1_000_000.0,
    cached_input_per_token: 0.10 / 1_000_000.0,
    output_per_token: 1.60 / 1_000_000.0,
};

const GPT_4_1_NANO: ModelPrices = ModelPrices {
    input_per_token: 0.10 / 1_000_000.0,
    cached_input_per_token: 0.025 / 1_000_000.0,
    output_per_token: 0.40 / 1_000_000.0,
};

const GPT_4O: ModelPrices = ModelPrices {
    input_per_token: 2.50 / 1_000_000.0,
    cached_input_per_token: 1.25 / 1_000_000.0,
    output_per_token: 10.00 / 1_000_000.0,
};

const GPT_4O_MINI: ModelPrices = ModelPrices {
    input_per_token: 0.15 / 1_000_000.0,
    cached_input_per_token: 0.075 / 1_000_000.0,
    output_per_token: 0.60 / 1_000_000.0,
};

/// Look up prices for a model, falling back to [`DEFAULT_MODEL`].
pub fn prices_for(model: &str) -> ModelPrices {
    match model {
        "gpt-4.1" => GPT_4_1,
        "gpt-4.1-mini" => GPT_4_1_MINI,
        "gpt-4.1-nano" => GPT_4_1_NANO,
        "gpt-4o" => GPT_4O,
        "gpt-4o-mini" => GPT_4O_MINI,
        _ => GPT_4_1,
    }
}
