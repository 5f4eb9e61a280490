// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Specforge Contributors

//! Model provider trait and related types
//!
//! Defines the abstraction layer over the different LLM backends. Each
//! adapter speaks its own wire protocol internally; everything that crosses
//! this boundary is uniform.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;

use crate::error::Result;
use crate::llm::catalog::ModelConfig;

/// A stream of text chunks in arrival order. Each item is delivered exactly
/// once; dropping the stream aborts the underlying transport.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Identifies one of the supported provider backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Gemini,
    Anthropic,
    OpenAi,
    OpenRouter,
}

impl ProviderId {
    /// Stable lowercase name, used in settings and CLI flags
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Gemini => "gemini",
            ProviderId::Anthropic => "anthropic",
            ProviderId::OpenAi => "openai",
            ProviderId::OpenRouter => "openrouter",
        }
    }

    /// Parse a provider name as used in settings and CLI flags
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "gemini" => Some(ProviderId::Gemini),
            "anthropic" => Some(ProviderId::Anthropic),
            "openai" => Some(ProviderId::OpenAi),
            "openrouter" => Some(ProviderId::OpenRouter),
            _ => None,
        }
    }

    /// Whether this provider re-routes to upstream models and applies a
    /// platform markup on top of upstream pricing.
    pub fn is_aggregator(&self) -> bool {
        matches!(self, ProviderId::OpenRouter)
    }

    /// All supported providers
    pub fn all() -> &'static [ProviderId] {
        &[
            ProviderId::Gemini,
            ProviderId::Anthropic,
            ProviderId::OpenAi,
            ProviderId::OpenRouter,
        ]
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An opaque provider secret. Held only in memory, redacted from Debug
/// output, and never serialized into the project document.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Expose the secret for request construction only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Advisory capability flags for a provider
///
/// A caller may request a capability the active model lacks; adapters then
/// silently omit the related request parameter instead of failing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProviderCapabilities {
    /// Can consult live search results while generating
    pub supports_grounding: bool,
    /// Accepts a thinking-budget parameter
    pub supports_thinking_budget: bool,
    /// Accepts an ordered reasoning-effort setting
    pub supports_reasoning_effort: bool,
    /// Offers a provider-backed exact token count
    pub supports_exact_count: bool,
}

/// One streaming generation request
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Model to use
    pub model: String,

    /// System instruction framing the task
    pub system_instruction: String,

    /// The user prompt
    pub prompt: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens in the response
    pub max_output_tokens: u32,

    /// Reserved reasoning computation, where supported
    pub thinking_budget: Option<u32>,

    /// Reasoning effort level, where supported
    pub reasoning_effort: Option<String>,

    /// Whether to consult live search grounding, where supported
    pub use_grounding: bool,

    /// Provider secret
    pub credential: Credential,
}

impl GenerationRequest {
    /// Create a new request with default sampling parameters
    pub fn new(
        model: impl Into<String>,
        system_instruction: impl Into<String>,
        prompt: impl Into<String>,
        credential: Credential,
    ) -> Self {
        Self {
            model: model.into(),
            system_instruction: system_instruction.into(),
            prompt: prompt.into(),
            temperature: 0.7,
            max_output_tokens: 8192,
            thinking_budget: None,
            reasoning_effort: None,
            use_grounding: false,
            credential,
        }
    }

    /// Set temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set max output tokens
    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Reserve a thinking budget
    pub fn with_thinking_budget(mut self, budget: u32) -> Self {
        self.thinking_budget = Some(budget);
        self
    }

    /// Set a reasoning effort level
    pub fn with_reasoning_effort(mut self, effort: impl Into<String>) -> Self {
        self.reasoning_effort = Some(effort.into());
        self
    }

    /// Enable search grounding
    pub fn with_grounding(mut self) -> Self {
        self.use_grounding = true;
        self
    }
}

/// Main trait for model providers
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Which backend this adapter speaks to
    fn id(&self) -> ProviderId;

    /// What the backend can do beyond plain streaming
    fn capabilities(&self) -> ProviderCapabilities;

    /// Models this provider serves
    fn models(&self) -> Vec<ModelConfig>;

    /// Check if a specific model is served
    fn supports_model(&self, model: &str) -> bool {
        self.models().iter().any(|m| m.id == model)
    }

    /// Look up a model's config by id
    fn model_config(&self, model: &str) -> Option<ModelConfig> {
        self.models().into_iter().find(|m| m.id == model)
    }

    /// Establish a streaming generation call.
    ///
    /// This is the request-establishment step the retry wrapper targets;
    /// once the stream is returned, failures belong to the stream itself.
    async fn open_stream(&self, request: &GenerationRequest) -> Result<ChunkStream>;

    /// Provider-backed exact token count.
    ///
    /// Adapters without a counting endpoint return the local estimate.
    async fn count_tokens(&self, text: &str, model: &str, credential: &Credential) -> Result<u32>;
}
