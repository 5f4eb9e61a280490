// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Specforge Contributors

//! Debounced exact token counting
//!
//! Provider-backed counts are rate-bounded: rapid text mutation collapses to
//! one request per debounce window. The counting path runs independently of
//! any active generation and never blocks it.

use std::sync::Arc;
use std::time::Duration;

use crate::accounting::estimate_tokens;
use crate::debounce::Debouncer;
use crate::llm::provider::{Credential, ModelProvider};

/// Debounced exact-count front end over a provider
pub struct ExactCounter {
    provider: Arc<dyn ModelProvider>,
    debouncer: Debouncer,
}

impl ExactCounter {
    pub fn new(provider: Arc<dyn ModelProvider>, window: Duration) -> Self {
        Self {
            provider,
            debouncer: Debouncer::new(window),
        }
    }

    /// Immediate estimate for instant feedback
    pub fn estimate(&self, text: &str) -> u32 {
        estimate_tokens(text)
    }

    /// Request an exact count; `on_result` fires once the debounce window
    /// elapses. Bursty calls coalesce to the most recent text. When the
    /// provider has no counting endpoint or the call fails, the result is
    /// the local estimate.
    pub fn request_exact(
        &self,
        text: String,
        model: String,
        credential: Credential,
        on_result: impl FnOnce(u32) + Send + 'static,
    ) {
        let provider = self.provider.clone();
        self.debouncer.schedule(move || async move {
            let count = if provider.capabilities().supports_exact_count {
                match provider.count_tokens(&text, &model, &credential).await {
                    Ok(count) => count,
                    Err(err) => {
                        tracing::debug!(error = %err, "exact count failed, using estimate");
                        estimate_tokens(&text)
                    }
                }
            } else {
                estimate_tokens(&text)
            };
            on_result(count);
        });
    }

    /// Drop any pending count request.
    pub fn cancel(&self) {
        self.debouncer.cancel();
    }
}
