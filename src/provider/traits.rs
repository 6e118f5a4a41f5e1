// LLM provider trait — the swap-ready abstraction.
//
// This trait defines the interface for comment analysis. The engine is
// indifferent to which backend answers: a local Ollama instance, Google
// Gemini, or DeepSeek. Retry policy lives in the orchestrator, not here —
// a failed call is a single failed attempt.

use anyhow::Result;
use async_trait::async_trait;

use crate::config::Pricing;

/// Token counts and estimated cost for a single analysis call.
///
/// Backends that report exact usage fill this from the API response;
/// the others estimate with `estimate_tokens`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Estimated cost in currency units, rounded to 6 decimal places.
    pub estimated_cost: f64,
}

impl TokenUsage {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Estimate a token count when the backend doesn't report one.
/// Approximation: 1 token ≈ 4 characters of English text.
pub fn estimate_tokens(text: &str) -> u64 {
    ((text.len() / 4) as u64).max(1)
}

/// Cost of a call under the given pricing table, rounded to 6 decimals.
pub fn calculate_cost(pricing: Pricing, input_tokens: u64, output_tokens: u64) -> f64 {
    let input_cost = (input_tokens as f64 / 1000.0) * pricing.per_k_input;
    let output_cost = (output_tokens as f64 / 1000.0) * pricing.per_k_output;
    ((input_cost + output_cost) * 1e6).round() / 1e6
}

/// Trait for LLM backends. Implementations must be async because every
/// provider is reached over HTTP.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short backend name for logs and status output.
    fn name(&self) -> &'static str;

    /// Analyze a comment under the given system prompt. Returns the raw
    /// response text and the token accounting for the call.
    async fn analyze(&self, system_prompt: &str, comment_text: &str)
        -> Result<(String, TokenUsage)>;

    /// One minimal, low-cost probe call. Used at startup and after a
    /// runtime provider switch.
    async fn check_health(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_tokens_rounds_down_with_floor_of_one() {
        assert_eq!(estimate_tokens(""), 1);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens(&"x".repeat(4000)), 1000);
    }

    #[test]
    fn cost_uses_per_k_rates() {
        let pricing = Pricing {
            per_k_input: 0.00014,
            per_k_output: 0.00028,
        };
        let cost = calculate_cost(pricing, 1000, 1000);
        assert!((cost - 0.00042).abs() < 1e-9);
    }

    #[test]
    fn cost_rounds_to_six_decimals() {
        let pricing = Pricing {
            per_k_input: 0.00014,
            per_k_output: 0.0,
        };
        // 123 tokens at 0.00014/1K = 0.00001722, which rounds to 0.000017
        let cost = calculate_cost(pricing, 123, 0);
        assert!((cost - 0.000017).abs() < 1e-12);
    }

    #[test]
    fn free_pricing_is_zero_cost() {
        let cost = calculate_cost(Pricing::FREE, 100_000, 100_000);
        assert_eq!(cost, 0.0);
    }
}
