// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Specforge Contributors

//! Google Gemini API provider implementation
//!
//! Streams via `streamGenerateContent?alt=sse`. This is the one backend with
//! a thinking-budget parameter and live search grounding; both are omitted
//! from the request when not asked for.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result, SpecforgeError};
use crate::llm::catalog::{self, ModelConfig};
use crate::llm::provider::{
    ChunkStream, Credential, GenerationRequest, ModelProvider, ProviderCapabilities, ProviderId,
};
use crate::llm::providers::common::{classify_status, parse_retry_after_seconds, sse_text_stream};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini provider
pub struct GeminiProvider {
    client: Client,
    base_url: String,
}

impl GeminiProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: GEMINI_API_URL.to_string(),
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
    fn build_request(&self, request: &GenerationRequest) -> GeminiRequest {
        let caps = self.capabilities();

        let thinking_config = match (caps.supports_thinking_budget, request.thinking_budget) {
            (true, Some(budget)) => Some(ThinkingConfig {
                thinking_budget: budget,
            }),
            _ => None,
        };

        let tools = if caps.supports_grounding && request.use_grounding {
            Some(vec![GeminiTool {
                google_search: serde_json::json!({}),
            }])
        } else {
            None
        };

        GeminiRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: request.system_instruction.clone(),
                    thought: None,
                }],
            },
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: request.prompt.clone(),
                    thought: None,
                }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
                thinking_config,
            },
            tools,
        }
    }

    /// Parse an error response body into the uniform taxonomy
    fn parse_error(&self, status: u16, body: &str, retry_after: Option<u64>) -> SpecforgeError {
        if let Ok(error_response) = serde_json::from_str::<GeminiError>(body) {
            let detail = error_response.error;
            match detail.status.as_str() {
                "UNAUTHENTICATED" | "PERMISSION_DENIED" => {
                    SpecforgeError::Api(ApiError::AuthenticationFailed)
                }
                "RESOURCE_EXHAUSTED" => {
                    SpecforgeError::Api(ApiError::RateLimited(retry_after.unwrap_or(10) as u32))
                }
                "INVALID_ARGUMENT" | "FAILED_PRECONDITION" | "NOT_FOUND" => {
                    SpecforgeError::Api(ApiError::InvalidRequest(detail.message))
                }
                "UNAVAILABLE" | "INTERNAL" | "DEADLINE_EXCEEDED" => {
                    SpecforgeError::Api(ApiError::ServerError {
                        status,
                        message: detail.message,
                    })
                }
                _ => classify_status(status, &detail.message, retry_after),
            }
        } else {
            classify_status(status, body, retry_after)
        }
    }
}

impl Default for GeminiProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Pull the text out of one streamed SSE data payload
fn extract_chunk_text(data: &str) -> Option<String> {
    let parsed: serde_json::Value = serde_json::from_str(data).ok()?;
    let parts = parsed["candidates"][0]["content"]["parts"].as_array()?;

    let text: String = parts
        .iter()
        .filter(|p| !p["thought"].as_bool().unwrap_or(false))
        .filter_map(|p| p["text"].as_str())
        .collect();

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[async_trait]
impl ModelProvider for GeminiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Gemini
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_grounding: true,
            supports_thinking_budget: true,
            supports_reasoning_effort: false,
            supports_exact_count: true,
        }
    }

    fn models(&self) -> Vec<ModelConfig> {
        catalog::models_for(ProviderId::Gemini)
    }

    async fn open_stream(&self, request: &GenerationRequest) -> Result<ChunkStream> {
        let body = self.build_request(request);
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, request.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", request.credential.expose())
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
        let url = format!("{}/models/{}:countTokens", self.base_url, model);
        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": text }] }]
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", credential.expose())
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

        let parsed: GeminiCountResponse = response.json().await?;
        Ok(parsed.total_tokens)
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
struct GeminiRequest {
    #[serde(rename = "systemInstruction")]
    system_instruction: GeminiContent,
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "thinkingConfig", skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
}

#[derive(Debug, Serialize)]
struct ThinkingConfig {
    #[serde(rename = "thinkingBudget")]
    thinking_budget: u32,
}

#[derive(Debug, Serialize)]
struct GeminiTool {
    google_search: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GeminiCountResponse {
    #[serde(rename = "totalTokens")]
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
}
