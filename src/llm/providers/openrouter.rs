// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Specforge Contributors

//! OpenRouter API provider implementation
//!
//! OpenAI-compatible wire protocol under a bearer token plus attribution
//! headers. OpenRouter aggregates many upstream models; the platform markup
//! it adds is applied by the cost model, not here.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::accounting::estimate_tokens;
use crate::error::{ApiError, Result, SpecforgeError};
use crate::llm::catalog::{self, ModelConfig};
use crate::llm::provider::{
    ChunkStream, Credential, GenerationRequest, ModelProvider, ProviderCapabilities, ProviderId,
};
use crate::llm::providers::common::{classify_status, parse_retry_after_seconds, sse_text_stream};
use crate::llm::providers::openai::extract_chat_completion_text;

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api";

/// OpenRouter provider - many upstream models via a single API
pub struct OpenRouterProvider {
    client: Client,
    base_url: String,
    site_url: Option<String>,
    site_name: String,
}

impl OpenRouterProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: OPENROUTER_API_URL.to_string(),
            site_url: None,
            site_name: "Specforge".to_string(),
        }
    }

    /// Create with a custom base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            site_url: None,
            site_name: "Specforge".to_string(),
        }
    }

    /// Set the site URL for OpenRouter rankings
    pub fn with_site_url(mut self, url: impl Into<String>) -> Self {
        self.site_url = Some(url.into());
        self
    }

    /// Build the request body
    fn build_request(&self, request: &GenerationRequest, stream: bool) -> OpenRouterRequest {
        OpenRouterRequest {
            model: request.model.clone(),
            messages: vec![
                OpenRouterMessage {
                    role: "system".to_string(),
                    content: request.system_instruction.clone(),
                },
                OpenRouterMessage {
                    role: "user".to_string(),
                    content: request.prompt.clone(),
                },
            ],
            max_tokens: Some(request.max_output_tokens),
            temperature: Some(request.temperature),
            stream: Some(stream),
        }
    }

    /// Parse an error response
    fn parse_error(&self, status: u16, body: &str, retry_after: Option<u64>) -> SpecforgeError {
        if let Ok(error_response) = serde_json::from_str::<OpenRouterError>(body) {
            let message = error_response.error.message;
            let code = error_response.error.code.as_deref().unwrap_or("");

            match code {
                "invalid_api_key" | "authentication_error" => {
                    SpecforgeError::Api(ApiError::AuthenticationFailed)
                }
                "rate_limit_exceeded" => {
                    SpecforgeError::Api(ApiError::RateLimited(retry_after.unwrap_or(10) as u32))
                }
                "model_not_found" | "invalid_request_error" => {
                    SpecforgeError::Api(ApiError::InvalidRequest(message))
                }
                _ => classify_status(status, &message, retry_after),
            }
        } else {
            classify_status(status, body, retry_after)
        }
    }
}

impl Default for OpenRouterProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelProvider for OpenRouterProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenRouter
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_grounding: false,
            supports_thinking_budget: false,
            supports_reasoning_effort: false,
            supports_exact_count: false,
        }
    }

    fn models(&self) -> Vec<ModelConfig> {
        catalog::models_for(ProviderId::OpenRouter)
    }

    async fn open_stream(&self, request: &GenerationRequest) -> Result<ChunkStream> {
        let body = self.build_request(request, true);
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut builder = self
            .client
            .post(&url)
            .bearer_auth(request.credential.expose())
            .header("content-type", "application/json")
            .header("X-Title", &self.site_name);

        if let Some(ref site_url) = self.site_url {
            builder = builder.header("HTTP-Referer", site_url);
        }

        let response = builder
            .json(&body)
            .send()
            .await
            .map_err(|e| SpecforgeError::Api(ApiError::Network(e.to_string())))?;

        let status = response.status().as_u16();

        if !response.status().is_success() {
            let retry_after = parse_retry_after_seconds(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status, &body, retry_after));
        }

        let stream = sse_text_stream(response.bytes_stream(), extract_chat_completion_text);
        Ok(Box::pin(stream))
    }

    async fn count_tokens(&self, text: &str, _model: &str, _credential: &Credential) -> Result<u32> {
        // Upstream models tokenize differently; the estimate is the only
        // answer the aggregator can stand behind.
        Ok(estimate_tokens(text))
    }
}

// OpenRouter API types

#[derive(Debug, Serialize)]
struct OpenRouterRequest {
    model: String,
    messages: Vec<OpenRouterMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize)]
struct OpenRouterMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenRouterError {
    error: OpenRouterErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenRouterErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: String,
}
