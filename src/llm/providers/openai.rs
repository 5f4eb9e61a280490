// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Specforge Contributors

//! OpenAI API provider implementation
//!
//! Speaks `/v1/chat/completions` under a bearer token, with the system
//! instruction and the prompt split into separate messages. Streams SSE
//! `data:` lines terminated by `[DONE]`.

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

const OPENAI_API_URL: &str = "https://api.openai.com";

/// OpenAI provider
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: OPENAI_API_URL.to_string(),
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
    fn build_request(&self, request: &GenerationRequest, stream: bool) -> OpenAiRequest {
        // Reasoning effort only goes out for models that list effort levels.
        let reasoning_effort = request.reasoning_effort.as_ref().and_then(|effort| {
            let model = self.model_config(&request.model)?;
            if model.supports_reasoning_effort() {
                Some(effort.clone())
            } else {
                None
            }
        });

        OpenAiRequest {
            model: request.model.clone(),
            messages: vec![
                OpenAiMessage {
                    role: "system".to_string(),
                    content: request.system_instruction.clone(),
                },
                OpenAiMessage {
                    role: "user".to_string(),
                    content: request.prompt.clone(),
                },
            ],
            max_completion_tokens: Some(request.max_output_tokens),
            temperature: Some(request.temperature),
            reasoning_effort,
            stream: Some(stream),
        }
    }

    /// Parse an error response
    fn parse_error(&self, status: u16, body: &str, retry_after: Option<u64>) -> SpecforgeError {
        if let Ok(error_response) = serde_json::from_str::<OpenAiError>(body) {
            let detail = error_response.error;
            let code = detail.code.as_deref().unwrap_or("");

            match (detail.error_type.as_str(), code) {
                (_, "invalid_api_key") | ("authentication_error", _) => {
                    SpecforgeError::Api(ApiError::AuthenticationFailed)
                }
                (_, "rate_limit_exceeded") | ("rate_limit_error", _) => {
                    SpecforgeError::Api(ApiError::RateLimited(retry_after.unwrap_or(10) as u32))
                }
                ("invalid_request_error", _) => {
                    SpecforgeError::Api(ApiError::InvalidRequest(detail.message))
                }
                ("server_error", _) => SpecforgeError::Api(ApiError::ServerError {
                    status,
                    message: detail.message,
                }),
                _ => classify_status(status, &detail.message, retry_after),
            }
        } else {
            classify_status(status, body, retry_after)
        }
    }
}

impl Default for OpenAiProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Pull the content delta out of one streamed SSE data payload
pub(crate) fn extract_chat_completion_text(data: &str) -> Option<String> {
    if data == "[DONE]" {
        return None;
    }
    let parsed: serde_json::Value = serde_json::from_str(data).ok()?;
    parsed["choices"][0]["delta"]["content"]
        .as_str()
        .map(|s| s.to_string())
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenAi
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_grounding: false,
            supports_thinking_budget: false,
            supports_reasoning_effort: true,
            supports_exact_count: false,
        }
    }

    fn models(&self) -> Vec<ModelConfig> {
        catalog::models_for(ProviderId::OpenAi)
    }

    async fn open_stream(&self, request: &GenerationRequest) -> Result<ChunkStream> {
        let body = self.build_request(request, true);
        let url = format!("{}/v1/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(request.credential.expose())
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

        let stream = sse_text_stream(response.bytes_stream(), extract_chat_completion_text);
        Ok(Box::pin(stream))
    }

    async fn count_tokens(&self, text: &str, _model: &str, _credential: &Credential) -> Result<u32> {
        // No counting endpoint; the local estimate is the contract fallback.
        Ok(estimate_tokens(text))
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    #[serde(rename = "type", default)]
    error_type: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: String,
}
