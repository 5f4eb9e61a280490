// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Specforge Contributors

//! Provider factory for creating model providers
//!
//! Centralizes provider construction so entry points share one resolution
//! path for base URLs, default models and credentials.

use std::sync::Arc;

use crate::config::Settings;
use crate::error::{Result, SpecforgeError};
use crate::llm::provider::{Credential, ModelProvider, ProviderId};
use crate::llm::providers::{
    AnthropicProvider, GeminiProvider, OpenAiProvider, OpenRouterProvider,
};

/// Factory for creating model providers
pub struct ProviderFactory;

impl ProviderFactory {
    /// Create a provider instance for the given backend.
    ///
    /// Base-URL overrides come from settings; credentials are resolved
    /// separately per request via [`ProviderFactory::credential`].
    pub fn create(provider: ProviderId, settings: &Settings) -> Arc<dyn ModelProvider> {
        let base_url = settings.provider_config(provider).base_url.clone();

        match provider {
            ProviderId::Gemini => match base_url {
                Some(url) => Arc::new(GeminiProvider::with_base_url(url)),
                None => Arc::new(GeminiProvider::new()),
            },
            ProviderId::Anthropic => match base_url {
                Some(url) => Arc::new(AnthropicProvider::with_base_url(url)),
                None => Arc::new(AnthropicProvider::new()),
            },
            ProviderId::OpenAi => match base_url {
                Some(url) => Arc::new(OpenAiProvider::with_base_url(url)),
                None => Arc::new(OpenAiProvider::new()),
            },
            ProviderId::OpenRouter => match base_url {
                Some(url) => Arc::new(OpenRouterProvider::with_base_url(url)),
                None => Arc::new(OpenRouterProvider::new()),
            },
        }
    }

    /// Resolve the credential for a provider or explain what is missing.
    pub fn credential(provider: ProviderId, settings: &Settings) -> Result<Credential> {
        settings.credential_for(provider).ok_or_else(|| {
            let env = &settings.provider_config(provider).api_key_env;
            SpecforgeError::Config(format!(
                "No {provider} API key found. Set {env} or add it to settings."
            ))
        })
    }

    /// Default model for a provider, from settings with a catalog fallback
    pub fn default_model(provider: ProviderId, settings: &Settings) -> String {
        let configured = &settings.provider_config(provider).default_model;
        if configured.is_empty() {
            crate::llm::catalog::default_model(provider)
        } else {
            configured.clone()
        }
    }

    /// Check if a provider has a usable credential
    pub fn is_configured(provider: ProviderId, settings: &Settings) -> bool {
        settings.credential_for(provider).is_some()
    }
}
