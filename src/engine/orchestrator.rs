// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Specforge Contributors

//! Generation orchestrator
//!
//! Coordinates one end-to-end generation: session admission, retry-wrapped
//! request establishment, the cooperative chunk pull loop, and status
//! reporting. The orchestrator never commits results; the caller decides
//! whether the returned text becomes a version, which keeps refinement
//! flows (generate, review, accept or discard) possible.

use std::sync::Mutex;

use futures::StreamExt;
use uuid::Uuid;

use crate::artifacts::Stage;
use crate::engine::session::{GenerationPhase, GenerationSession};
use crate::error::{ApiError, Result, SpecforgeError};
use crate::llm::provider::{GenerationRequest, ModelProvider, ProviderId};
use crate::llm::retry::{with_retry, RetryConfig};

/// Orchestrates generations with global mutual exclusion
pub struct GenerationOrchestrator {
    retry: RetryConfig,
    active: Mutex<Option<Uuid>>,
}

impl GenerationOrchestrator {
    pub fn new(retry: RetryConfig) -> Self {
        Self {
            retry,
            active: Mutex::new(None),
        }
    }

    /// Whether a session is currently active
    pub fn is_active(&self) -> bool {
        self.active.lock().unwrap().is_some()
    }

    /// Admit a new session. Rejected immediately when one is already
    /// active; there is no queueing and nothing is mutated on rejection.
    pub fn begin(
        &self,
        stage: Stage,
        provider: ProviderId,
        model: impl Into<String>,
    ) -> Result<GenerationSession> {
        let mut active = self.active.lock().unwrap();
        if active.is_some() {
            return Err(SpecforgeError::Session(
                "a generation is already in progress".to_string(),
            ));
        }

        let session = GenerationSession::new(stage, provider, model);
        *active = Some(session.id());
        Ok(session)
    }

    /// Release a session without running it (caller changed its mind).
    pub fn release(&self, session: &GenerationSession) {
        let mut active = self.active.lock().unwrap();
        if *active == Some(session.id()) {
            *active = None;
        }
    }

    /// Drive the session to completion, streaming chunks to `on_chunk` and
    /// phase changes to `on_status`. Returns the accumulated full text.
    ///
    /// The cancel token is checked before dispatch and at every chunk
    /// boundary; after it fires no chunk reaches `on_chunk`, buffered text
    /// is discarded, and the call resolves with the `Cancelled`
    /// classification. The session is released on every exit path.
    pub async fn run(
        &self,
        provider: &dyn ModelProvider,
        session: &GenerationSession,
        request: GenerationRequest,
        mut on_chunk: impl FnMut(&str),
        mut on_status: impl FnMut(GenerationPhase),
    ) -> Result<String> {
        {
            let active = self.active.lock().unwrap();
            if *active != Some(session.id()) {
                return Err(SpecforgeError::Session(
                    "session is not the active one".to_string(),
                ));
            }
        }

        let result = self
            .drive(provider, session, request, &mut on_chunk, &mut on_status)
            .await;

        self.release(session);

        match &result {
            Ok(_) => on_status(GenerationPhase::Committing),
            Err(SpecforgeError::Api(ApiError::Cancelled)) => {
                on_status(GenerationPhase::Cancelled)
            }
            Err(_) => on_status(GenerationPhase::Failed),
        }

        result
    }

    async fn drive(
        &self,
        provider: &dyn ModelProvider,
        session: &GenerationSession,
        request: GenerationRequest,
        on_chunk: &mut impl FnMut(&str),
        on_status: &mut impl FnMut(GenerationPhase),
    ) -> Result<String> {
        // Checked before dispatch
        if session.is_cancelled() {
            return Err(SpecforgeError::Api(ApiError::Cancelled));
        }

        on_status(GenerationPhase::Requesting);

        // Only request establishment is retried; a stream that has started
        // delivering chunks is never replayed.
        let mut stream = with_retry(
            || provider.open_stream(&request),
            Some(self.retry.clone()),
            "open_stream",
        )
        .await?;

        let mut full_text = String::new();
        let mut streaming = false;

        while let Some(item) = stream.next().await {
            // Re-checked at every chunk boundary; dropping the stream on
            // return aborts the transport.
            if session.is_cancelled() {
                tracing::debug!(stage = %session.stage, "cancelled mid-stream, discarding buffer");
                return Err(SpecforgeError::Api(ApiError::Cancelled));
            }

            let chunk = item?;

            if !streaming {
                streaming = true;
                on_status(GenerationPhase::Streaming);
            }

            on_chunk(&chunk);
            full_text.push_str(&chunk);
        }

        if session.is_cancelled() {
            return Err(SpecforgeError::Api(ApiError::Cancelled));
        }

        tracing::info!(
            stage = %session.stage,
            provider = %session.provider,
            chars = full_text.len(),
            "generation complete"
        );

        Ok(full_text)
    }
}
