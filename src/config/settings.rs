// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Specforge Contributors

//! Settings management for Specforge
//!
//! Handles loading and saving settings from ~/.specforge/settings.json.
//! Every field carries a serde default so documents written by older
//! versions keep loading.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;
use crate::llm::provider::{Credential, ProviderId};

/// Main settings structure, stored in ~/.specforge/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Provider configurations
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Default generation parameters for new projects
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Retry and backoff settings for API calls
    #[serde(default)]
    pub resilience: ResilienceConfig,

    /// Persistence and accounting debounce windows
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

/// Configuration for the provider backends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "gemini_defaults")]
    pub gemini: ProviderConfig,

    #[serde(default = "anthropic_defaults")]
    pub anthropic: ProviderConfig,

    #[serde(default = "openai_defaults")]
    pub openai: ProviderConfig,

    #[serde(default = "openrouter_defaults")]
    pub openrouter: ProviderConfig,
}

/// Per-provider configuration block
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    /// API key (if stored directly, not recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for the API key
    #[serde(default)]
    pub api_key_env: String,

    /// Default model to use
    #[serde(default)]
    pub default_model: String,

    /// Base URL override (for custom endpoints and tests)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

fn gemini_defaults() -> ProviderConfig {
    ProviderConfig {
        api_key: None,
        api_key_env: "GEMINI_API_KEY".to_string(),
        default_model: "gemini-2.5-pro".to_string(),
        base_url: None,
    }
}

fn anthropic_defaults() -> ProviderConfig {
    ProviderConfig {
        api_key: None,
        api_key_env: "ANTHROPIC_API_KEY".to_string(),
        default_model: "claude-sonnet-4-20250514".to_string(),
        base_url: None,
    }
}

fn openai_defaults() -> ProviderConfig {
    ProviderConfig {
        api_key: None,
        api_key_env: "OPENAI_API_KEY".to_string(),
        default_model: "gpt-4.1".to_string(),
        base_url: None,
    }
}

fn openrouter_defaults() -> ProviderConfig {
    ProviderConfig {
        api_key: None,
        api_key_env: "OPENROUTER_API_KEY".to_string(),
        default_model: "anthropic/claude-sonnet-4".to_string(),
        base_url: None,
    }
}

/// Default generation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Provider used when a project does not name one
    #[serde(default = "default_provider")]
    pub provider: ProviderId,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum output tokens
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

/// Retry and backoff settings for API calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Maximum number of retry attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay in milliseconds for exponential backoff
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum delay in milliseconds (cap for backoff)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Jitter percentage (0.0 to 1.0) for randomizing delays
    #[serde(default)]
    pub jitter: f64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: 0.0,
        }
    }
}

/// Persistence and accounting debounce windows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Debounce window for durable project saves, in milliseconds
    #[serde(default = "default_save_debounce_ms")]
    pub save_debounce_ms: u64,

    /// Debounce window for exact token counting, in milliseconds
    #[serde(default = "default_count_debounce_ms")]
    pub count_debounce_ms: u64,

    /// Maximum retained undo snapshots
    #[serde(default = "default_undo_depth")]
    pub undo_depth: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            save_debounce_ms: default_save_debounce_ms(),
            count_debounce_ms: default_count_debounce_ms(),
            undo_depth: default_undo_depth(),
        }
    }
}

fn default_provider() -> ProviderId {
    ProviderId::Gemini
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_output_tokens() -> u32 {
    8192
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    8000
}

fn default_save_debounce_ms() -> u64 {
    1000
}

fn default_count_debounce_ms() -> u64 {
    2000
}

fn default_undo_depth() -> usize {
    50
}

impl Settings {
    /// Root directory for everything Specforge persists
    pub fn specforge_home() -> PathBuf {
        if let Ok(home) = std::env::var("SPECFORGE_HOME") {
            return PathBuf::from(home);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".specforge")
    }

    fn settings_path() -> PathBuf {
        Self::specforge_home().join("settings.json")
    }

    /// Load settings, falling back to defaults when the file is missing or
    /// from an older schema.
    pub fn load() -> Result<Self> {
        let path = Self::settings_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content).unwrap_or_default())
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<()> {
        let path = Self::settings_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Per-provider configuration block
    pub fn provider_config(&self, provider: ProviderId) -> &ProviderConfig {
        match provider {
            ProviderId::Gemini => &self.providers.gemini,
            ProviderId::Anthropic => &self.providers.anthropic,
            ProviderId::OpenAi => &self.providers.openai,
            ProviderId::OpenRouter => &self.providers.openrouter,
        }
    }

    /// Resolve the credential for a provider: the stored key wins, then the
    /// configured environment variable. The secret stays in memory only.
    pub fn credential_for(&self, provider: ProviderId) -> Option<Credential> {
        let config = self.provider_config(provider);
        if let Some(ref key) = config.api_key {
            if !key.is_empty() {
                return Some(Credential::new(key.clone()));
            }
        }
        if config.api_key_env.is_empty() {
            return None;
        }
        std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .map(Credential::new)
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            gemini: gemini_defaults(),
            anthropic: anthropic_defaults(),
            openai: openai_defaults(),
            openrouter: openrouter_defaults(),
        }
    }
}
