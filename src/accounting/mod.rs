// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Specforge Contributors

//! Token estimation, exact counting and cost model
//!
//! The estimate is cheap and always available; exact counts come from the
//! provider where supported and are debounced against rapid edits.

pub mod counter;

use serde::{Deserialize, Serialize};

use crate::llm::catalog::ModelConfig;

pub use counter::ExactCounter;

/// Platform surcharge applied by aggregator providers (5.5%)
const AGGREGATOR_SURCHARGE: f64 = 1.055;

/// Cheap token estimate: one token per four bytes, rounded up.
pub fn estimate_tokens(text: &str) -> u32 {
    text.len().div_ceil(4) as u32
}

/// Price a call against a model's rates.
///
/// Without tiered pricing, or at or below the threshold, both sides bill at
/// the base per-million rates. Once input crosses the threshold, input cost
/// splits at the threshold and all output for the call bills at the
/// elevated output rate. Aggregator calls get the platform surcharge on the
/// summed cost.
pub fn cost(model: &ModelConfig, input_tokens: u64, output_tokens: u64, is_aggregator: bool) -> f64 {
    let (input_cost, output_cost) = match model.tiered_pricing {
        Some(tiered) if input_tokens > tiered.threshold => {
            let below = tiered.threshold as f64 * model.input_cost_per_million / 1e6;
            let above = (input_tokens - tiered.threshold) as f64 * tiered.input_cost_above / 1e6;
            let output = output_tokens as f64 * tiered.output_cost_above / 1e6;
            (below + above, output)
        }
        _ => (
            input_tokens as f64 * model.input_cost_per_million / 1e6,
            output_tokens as f64 * model.output_cost_per_million / 1e6,
        ),
    };

    let total = input_cost + output_cost;
    if is_aggregator {
        total * AGGREGATOR_SURCHARGE
    } else {
        total
    }
}

/// Cumulative usage counters for a project session
///
/// Counters only grow; `reset` is the single way down.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input tokens across the session
    #[serde(default)]
    pub input: u64,

    /// Output tokens across the session
    #[serde(default)]
    pub output: u64,

    /// Grounded generation calls made
    #[serde(default)]
    pub grounding_requests: u64,

    /// Accumulated estimated cost in USD
    #[serde(default)]
    pub estimated_cost: f64,
}

impl TokenUsage {
    /// Record one completed call
    pub fn record(&mut self, input_tokens: u64, output_tokens: u64, call_cost: f64) {
        self.input = self.input.saturating_add(input_tokens);
        self.output = self.output.saturating_add(output_tokens);
        if call_cost > 0.0 {
            self.estimated_cost += call_cost;
        }
    }

    /// Record one grounded call
    pub fn record_grounding(&mut self) {
        self.grounding_requests = self.grounding_requests.saturating_add(1);
    }

    /// Explicit reset back to zero
    pub fn reset(&mut self) {
        *self = TokenUsage::default();
    }

    pub fn total_tokens(&self) -> u64 {
        self.input.saturating_add(self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::catalog::{ModelTier, TieredPricing};
    use crate::llm::provider::ProviderId;

    fn model(tiered: Option<TieredPricing>) -> ModelConfig {
        ModelConfig {
            id: "test-model".to_string(),
            provider: ProviderId::Gemini,
            display_name: "Test".to_string(),
            tier: ModelTier::Mid,
            input_cost_per_million: 2.0,
            output_cost_per_million: 10.0,
            input_context_limit: 1_000_000,
            output_context_limit: 65_536,
            tiered_pricing: tiered,
            reasoning_efforts: None,
        }
    }

    #[test]
    fn test_estimate_empty() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn test_estimate_exact_multiple() {
        let text = "a".repeat(400);
        assert_eq!(estimate_tokens(&text), 100);
    }

    #[test]
    fn test_estimate_rounds_up() {
        assert_eq!(estimate_tokens("a"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_cost_linear() {
        let m = model(None);
        // 1M input at $2 + 0.5M output at $10
        let c = cost(&m, 1_000_000, 500_000, false);
        assert!((c - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_cost_zero_tokens() {
        let m = model(None);
        assert_eq!(cost(&m, 0, 0, false), 0.0);
    }

    #[test]
    fn test_cost_tiered_below_threshold_uses_base_rates() {
        let m = model(Some(TieredPricing {
            threshold: 200_000,
            input_cost_above: 4.0,
            output_cost_above: 18.0,
        }));
        let c = cost(&m, 200_000, 1_000, false);
        // At the threshold exactly: base rates apply
        let expected = 200_000.0 * 2.0 / 1e6 + 1_000.0 * 10.0 / 1e6;
        assert!((c - expected).abs() < 1e-9);
    }

    #[test]
    fn test_cost_tiered_above_threshold() {
        let m = model(Some(TieredPricing {
            threshold: 200_000,
            input_cost_above: 4.0,
            output_cost_above: 18.0,
        }));
        // 250k input: 200k at $2 + 50k at $4; all 1k output at $18
        let c = cost(&m, 250_000, 1_000, false);
        assert!((c - 0.618).abs() < 1e-9);
    }

    #[test]
    fn test_cost_aggregator_surcharge() {
        let m = model(None);
        let base = cost(&m, 1_000_000, 0, false);
        let marked_up = cost(&m, 1_000_000, 0, true);
        assert!((marked_up - base * 1.055).abs() < 1e-9);
    }

    #[test]
    fn test_usage_accumulates() {
        let mut usage = TokenUsage::default();
        usage.record(100, 50, 0.01);
        usage.record(200, 100, 0.02);

        assert_eq!(usage.input, 300);
        assert_eq!(usage.output, 150);
        assert_eq!(usage.total_tokens(), 450);
        assert!((usage.estimated_cost - 0.03).abs() < 1e-9);
    }

    #[test]
    fn test_usage_never_decreases_on_record() {
        let mut usage = TokenUsage::default();
        usage.record(100, 50, 0.01);
        // A negative cost is ignored rather than subtracted
        usage.record(0, 0, -5.0);
        assert!((usage.estimated_cost - 0.01).abs() < 1e-9);
        assert_eq!(usage.input, 100);
    }

    #[test]
    fn test_usage_grounding_counter() {
        let mut usage = TokenUsage::default();
        usage.record_grounding();
        usage.record_grounding();
        assert_eq!(usage.grounding_requests, 2);
    }

    #[test]
    fn test_usage_reset() {
        let mut usage = TokenUsage::default();
        usage.record(100, 50, 0.5);
        usage.record_grounding();
        usage.reset();
        assert_eq!(usage, TokenUsage::default());
    }

    #[test]
    fn test_usage_saturates_at_max() {
        let mut usage = TokenUsage {
            input: u64::MAX - 1,
            ..Default::default()
        };
        usage.record(100, 0, 0.0);
        assert_eq!(usage.input, u64::MAX);
    }

    #[test]
    fn test_usage_serde_tolerates_missing_fields() {
        let usage: TokenUsage = serde_json::from_str("{}").unwrap();
        assert_eq!(usage, TokenUsage::default());

        let partial: TokenUsage = serde_json::from_str(r#"{"input": 42}"#).unwrap();
        assert_eq!(partial.input, 42);
        assert_eq!(partial.output, 0);
    }
}
