// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Specforge Contributors

//! Mock model provider for testing
//!
//! Provides a configurable mock implementation of the ModelProvider trait
//! that can be used in unit tests without making real API calls. Each call
//! to `open_stream` consumes the next scripted outcome.

use async_trait::async_trait;
use futures::stream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{ApiError, Result, SpecforgeError};
use crate::llm::catalog::{ModelConfig, ModelTier};
use crate::llm::provider::{
    ChunkStream, Credential, GenerationRequest, ModelProvider, ProviderCapabilities, ProviderId,
};

/// What one scripted call should do
#[derive(Clone, Debug)]
pub enum MockOutcome {
    /// Stream these chunks, then end successfully
    Chunks(Vec<String>),
    /// Fail request establishment with this classification
    Fail(MockFailure),
}

/// Scripted failure classifications
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MockFailure {
    Auth,
    RateLimited,
    ServerError,
    Network,
    InvalidRequest,
}

impl MockFailure {
    fn to_error(self) -> SpecforgeError {
        match self {
            MockFailure::Auth => SpecforgeError::Api(ApiError::AuthenticationFailed),
            MockFailure::RateLimited => SpecforgeError::Api(ApiError::RateLimited(1)),
            MockFailure::ServerError => SpecforgeError::Api(ApiError::ServerError {
                status: 500,
                message: "scripted server error".to_string(),
            }),
            MockFailure::Network => {
                SpecforgeError::Api(ApiError::Network("scripted network error".to_string()))
            }
            MockFailure::InvalidRequest => {
                SpecforgeError::Api(ApiError::InvalidRequest("scripted bad request".to_string()))
            }
        }
    }
}

/// A mock model provider for testing
#[derive(Clone)]
pub struct MockProvider {
    id: ProviderId,
    outcomes: Arc<Mutex<Vec<MockOutcome>>>,
    call_count: Arc<AtomicUsize>,
    recorded_requests: Arc<Mutex<Vec<GenerationRequest>>>,
    chunk_delay: Option<Duration>,
    exact_count: Option<u32>,
    count_fails: bool,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            id: ProviderId::Gemini,
            outcomes: Arc::new(Mutex::new(vec![MockOutcome::Chunks(vec![
                "mock ".to_string(),
                "response".to_string(),
            ])])),
            call_count: Arc::new(AtomicUsize::new(0)),
            recorded_requests: Arc::new(Mutex::new(vec![])),
            chunk_delay: None,
            exact_count: None,
            count_fails: false,
        }
    }

    /// Pose as a specific provider
    pub fn with_id(mut self, id: ProviderId) -> Self {
        self.id = id;
        self
    }

    /// Script a single successful stream
    pub fn with_chunks(self, chunks: Vec<&str>) -> Self {
        self.with_outcomes(vec![MockOutcome::Chunks(
            chunks.into_iter().map(|c| c.to_string()).collect(),
        )])
    }

    /// Script a sequence of outcomes, one per `open_stream` call; the last
    /// outcome repeats once the script runs out.
    pub fn with_outcomes(self, outcomes: Vec<MockOutcome>) -> Self {
        *self.outcomes.lock().unwrap() = outcomes;
        self
    }

    /// Insert a pause between streamed chunks
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Make `count_tokens` return a fixed exact value
    pub fn with_exact_count(mut self, count: u32) -> Self {
        self.exact_count = Some(count);
        self
    }

    /// Make `count_tokens` fail while still advertising exact counting
    pub fn with_count_error(mut self) -> Self {
        self.exact_count = Some(0);
        self.count_fails = true;
        self
    }

    /// Number of `open_stream` calls made
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// All recorded requests
    pub fn recorded_requests(&self) -> Vec<GenerationRequest> {
        self.recorded_requests.lock().unwrap().clone()
    }

    /// The last request made
    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.recorded_requests.lock().unwrap().last().cloned()
    }

    fn next_outcome(&self) -> MockOutcome {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst);
        let outcomes = self.outcomes.lock().unwrap();
        if outcomes.is_empty() {
            MockOutcome::Chunks(vec![])
        } else {
            outcomes[count.min(outcomes.len() - 1)].clone()
        }
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_grounding: true,
            supports_thinking_budget: true,
            supports_reasoning_effort: true,
            supports_exact_count: self.exact_count.is_some(),
        }
    }

    fn models(&self) -> Vec<ModelConfig> {
        vec![ModelConfig {
            id: "mock-model".to_string(),
            provider: self.id,
            display_name: "Mock Model".to_string(),
            tier: ModelTier::Mid,
            input_cost_per_million: 1.0,
            output_cost_per_million: 2.0,
            input_context_limit: 128_000,
            output_context_limit: 8_192,
            tiered_pricing: None,
            reasoning_efforts: None,
        }]
    }

    async fn open_stream(&self, request: &GenerationRequest) -> Result<ChunkStream> {
        self.recorded_requests.lock().unwrap().push(request.clone());

        match self.next_outcome() {
            MockOutcome::Fail(failure) => Err(failure.to_error()),
            MockOutcome::Chunks(chunks) => {
                if let Some(delay) = self.chunk_delay {
                    let stream = async_stream::stream! {
                        for chunk in chunks {
                            tokio::time::sleep(delay).await;
                            yield Ok::<String, SpecforgeError>(chunk);
                        }
                    };
                    Ok(Box::pin(stream))
                } else {
                    let items = chunks.into_iter().map(Ok::<String, SpecforgeError>);
                    Ok(Box::pin(stream::iter(items)))
                }
            }
        }
    }

    async fn count_tokens(&self, text: &str, _model: &str, _credential: &Credential) -> Result<u32> {
        if self.count_fails {
            return Err(SpecforgeError::Api(ApiError::Network(
                "scripted count failure".to_string(),
            )));
        }
        match self.exact_count {
            Some(count) => Ok(count),
            None => Ok(crate::accounting::estimate_tokens(text)),
        }
    }
}
