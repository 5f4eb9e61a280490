// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Specforge Contributors

//! Static model catalog
//!
//! Registers every model the engine knows about, with tier, context limits
//! and pricing. Entries are immutable; adapters serve slices of this table.

use serde::{Deserialize, Serialize};

use crate::llm::provider::ProviderId;

/// Rough capability/cost class of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Fast,
    Mid,
    Complex,
}

/// Billing rates that change above an input-token threshold within a single
/// request. Once input crosses the threshold, all output for that call is
/// billed at the elevated output rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TieredPricing {
    /// Input-token count at which the elevated rates start
    pub threshold: u64,
    /// $/M for input tokens above the threshold
    pub input_cost_above: f64,
    /// $/M for all output tokens once the threshold is crossed
    pub output_cost_above: f64,
}

/// Immutable description of one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identifier as the provider expects it
    pub id: String,

    /// Serving provider
    pub provider: ProviderId,

    /// Human-readable name
    pub display_name: String,

    /// Capability/cost tier
    pub tier: ModelTier,

    /// $/M input tokens
    pub input_cost_per_million: f64,

    /// $/M output tokens
    pub output_cost_per_million: f64,

    /// Maximum input context in tokens
    pub input_context_limit: u32,

    /// Maximum output in tokens
    pub output_context_limit: u32,

    /// Elevated rates above an input threshold, if the model has them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiered_pricing: Option<TieredPricing>,

    /// Ordered reasoning-effort levels, lowest first, if the model has them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_efforts: Option<Vec<String>>,
}

impl ModelConfig {
    pub fn supports_reasoning_effort(&self) -> bool {
        self.reasoning_efforts
            .as_ref()
            .is_some_and(|e| !e.is_empty())
    }
}

fn model(
    id: &str,
    provider: ProviderId,
    display_name: &str,
    tier: ModelTier,
    input_cost: f64,
    output_cost: f64,
    input_limit: u32,
    output_limit: u32,
) -> ModelConfig {
    ModelConfig {
        id: id.to_string(),
        provider,
        display_name: display_name.to_string(),
        tier,
        input_cost_per_million: input_cost,
        output_cost_per_million: output_cost,
        input_context_limit: input_limit,
        output_context_limit: output_limit,
        tiered_pricing: None,
        reasoning_efforts: None,
    }
}

/// Models served by a given provider
pub fn models_for(provider: ProviderId) -> Vec<ModelConfig> {
    match provider {
        ProviderId::Gemini => vec![
            {
                // Long-context pricing steps up past 200k input tokens.
                let mut m = model(
                    "gemini-2.5-pro",
                    ProviderId::Gemini,
                    "Gemini 2.5 Pro",
                    ModelTier::Complex,
                    1.25,
                    10.0,
                    1_048_576,
                    65_536,
                );
                m.tiered_pricing = Some(TieredPricing {
                    threshold: 200_000,
                    input_cost_above: 2.50,
                    output_cost_above: 15.0,
                });
                m
            },
            model(
                "gemini-2.5-flash",
                ProviderId::Gemini,
                "Gemini 2.5 Flash",
                ModelTier::Mid,
                0.30,
                2.50,
                1_048_576,
                65_536,
            ),
            model(
                "gemini-2.5-flash-lite",
                ProviderId::Gemini,
                "Gemini 2.5 Flash Lite",
                ModelTier::Fast,
                0.10,
                0.40,
                1_048_576,
                65_536,
            ),
        ],
        ProviderId::Anthropic => vec![
            model(
                "claude-sonnet-4-20250514",
                ProviderId::Anthropic,
                "Claude Sonnet 4",
                ModelTier::Complex,
                3.0,
                15.0,
                200_000,
                64_000,
            ),
            model(
                "claude-3-5-haiku-20241022",
                ProviderId::Anthropic,
                "Claude 3.5 Haiku",
                ModelTier::Fast,
                0.80,
                4.0,
                200_000,
                8_192,
            ),
        ],
        ProviderId::OpenAi => vec![
            {
                let mut m = model(
                    "o4-mini",
                    ProviderId::OpenAi,
                    "o4-mini",
                    ModelTier::Complex,
                    1.10,
                    4.40,
                    200_000,
                    100_000,
                );
                m.reasoning_efforts = Some(vec![
                    "low".to_string(),
                    "medium".to_string(),
                    "high".to_string(),
                ]);
                m
            },
            model(
                "gpt-4.1",
                ProviderId::OpenAi,
                "GPT-4.1",
                ModelTier::Mid,
                2.0,
                8.0,
                1_047_576,
                32_768,
            ),
            model(
                "gpt-4.1-mini",
                ProviderId::OpenAi,
                "GPT-4.1 mini",
                ModelTier::Fast,
                0.40,
                1.60,
                1_047_576,
                32_768,
            ),
        ],
        ProviderId::OpenRouter => vec![
            model(
                "anthropic/claude-sonnet-4",
                ProviderId::OpenRouter,
                "Claude Sonnet 4 (via OpenRouter)",
                ModelTier::Complex,
                3.0,
                15.0,
                200_000,
                64_000,
            ),
            model(
                "google/gemini-2.5-flash",
                ProviderId::OpenRouter,
                "Gemini 2.5 Flash (via OpenRouter)",
                ModelTier::Mid,
                0.30,
                2.50,
                1_048_576,
                65_536,
            ),
            model(
                "deepseek/deepseek-chat-v3",
                ProviderId::OpenRouter,
                "DeepSeek V3 (via OpenRouter)",
                ModelTier::Fast,
                0.27,
                1.10,
                163_840,
                32_768,
            ),
        ],
    }
}

/// Look up a model across every provider
pub fn lookup(model_id: &str) -> Option<ModelConfig> {
    ProviderId::all()
        .iter()
        .flat_map(|p| models_for(*p))
        .find(|m| m.id == model_id)
}

/// Default model for a provider (first catalog entry)
pub fn default_model(provider: ProviderId) -> String {
    models_for(provider)
        .into_iter()
        .next()
        .map(|m| m.id)
        .unwrap_or_default()
}
