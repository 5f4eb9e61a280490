// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Specforge Contributors

//! Anthropic Claude API provider implementation
//!
//! Streams `/v1/messages` server-sent events, keeping only the
//! `content_block_delta` text payloads.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result, SpecforgeError};
use crate::llm::catalog::{self, ModelConfig};
use crate::llm::provider::{
    ChunkStream, Credential, GenerationRequest, ModelProvider, ProviderCapabilities, ProviderId,
};
use crate::llm::providers::common::{classify_status, parse_retry_after_seconds, sse_text_stream};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Claude provider
pub struct AnthropicProvider {
    client: Client,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    /// Create with a custom base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Build the request body
    fn build_request(&self, request: &GenerationRequest, stream: bool) -> AnthropicRequest {
        AnthropicRequest {
            model: request.model.clone(),
            system: request.system_instruction.clone(),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
            max_tokens: request.max_output_tokens,
            temperature: Some(request.temperature),
            stream: Some(stream),
        }
    }

    /// Parse an error response
    fn parse_error(&self, status: u16, body: &str, retry_after: Option<u64>) -> SpecforgeError {
        if let Ok(error_response) = serde_json::from_str::<AnthropicError>(body) {
            match error_response.error.error_type.as_str() {
                "authentication_error" | "permission_error" => {
                    SpecforgeError::Api(ApiError::AuthenticationFailed)
                }
                "rate_limit_error" => {
                    SpecforgeError::Api(ApiError::RateLimited(retry_after.unwrap_or(10) as u32))
                }
                "invalid_request_error" | "not_found_error" => {
                    SpecforgeError::Api(ApiError::InvalidRequest(error_response.error.message))
                }
                "overloaded_error" | "api_error" => SpecforgeError::Api(ApiError::ServerError {
                    status,
                    message: error_response.error.message,
                }),
                _ => classify_status(status, &error_response.error.message, retry_after),
            }
        } else {
            classify_status(status, body, retry_after)
        }
    }
}

impl Default for AnthropicProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Pull the text delta out of one streamed SSE data payload
fn extract_chunk_text(data: &str) -> Option<String> {
    let parsed: serde_json::Value = serde_json::from_str(data).ok()?;

    match parsed["type"].as_str()? {
        "content_block_delta" => {
            let delta = &parsed["delta"];
            if delta["type"].as_str()? == "text_delta" {
                delta["text"].as_str().map(|s| s.to_string())
            } else {
                None
            }
        }
        _ => None,
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Anthropic
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_grounding: false,
            supports_thinking_budget: false,
            supports_reasoning_effort: false,
            supports_exact_count: true,
        }
    }

    fn models(&self) -> Vec<ModelConfig> {
        catalog::models_for(ProviderId::Anthropic)
    }

    async fn open_stream(&self, request: &GenerationRequest) -> Result<ChunkStream> {
        let body = self.build_request(request, true);
        let url = format!("{}/v1/messages", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", request.credential.expose())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
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

        let stream = sse_text_stream(response.bytes_stream(), extract_chunk_text);
        Ok(Box::pin(stream))
    }

    async fn count_tokens(&self, text: &str, model: &str, credential: &Credential) -> Result<u32> {
        let url = format!("{}/v1/messages/count_tokens", self.base_url);
        let body = serde_json::json!({
            "model": model,
            "messages": [{ "role": "user", "content": text }]
        });

        let response = self
            .client
            .post(&url)
            .header("x-api-key", credential.expose())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
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

        let parsed: AnthropicCountResponse = response.json().await?;
        Ok(parsed.input_tokens)
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    system: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicCountResponse {
    input_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    #[serde(rename = "type", default)]
    error_type: String,
    #[serde(default)]
    message: String,
}
