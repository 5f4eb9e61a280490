// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Specforge Contributors

//! Generation sessions and cooperative cancellation
//!
//! A session is an explicit value handed back from the orchestrator; there
//! is no ambient "is generating" flag anywhere. Cancellation is a shared
//! token checked at defined checkpoints, never a preemptive interrupt.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use crate::artifacts::Stage;
use crate::llm::provider::ProviderId;

/// Cooperative cancellation token
///
/// Cloning shares the flag; once fired it stays fired.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the token. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Where a generation currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPhase {
    /// Request accepted, stream not yet established
    Requesting,
    /// First chunk seen, stream in progress
    Streaming,
    /// Stream finished, full text handed to the caller
    Committing,
    /// Cancel token observed
    Cancelled,
    /// Classified failure surfaced
    Failed,
}

impl GenerationPhase {
    /// Human status label for display
    pub fn label(&self) -> &'static str {
        match self {
            GenerationPhase::Requesting => "Initializing…",
            GenerationPhase::Streaming => "Streaming…",
            GenerationPhase::Committing => "Finalizing…",
            GenerationPhase::Cancelled => "Cancelled",
            GenerationPhase::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GenerationPhase::Committing | GenerationPhase::Cancelled | GenerationPhase::Failed
        )
    }
}

/// Bookkeeping for one in-flight generation
#[derive(Debug, Clone)]
pub struct GenerationSession {
    id: Uuid,
    pub stage: Stage,
    pub provider: ProviderId,
    pub model: String,
    cancel: CancelToken,
}

impl GenerationSession {
    pub(crate) fn new(stage: Stage, provider: ProviderId, model: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            stage,
            provider,
            model: model.into(),
            cancel: CancelToken::new(),
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    /// A handle the caller can keep to cancel from elsewhere
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Fire this session's cancel token
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
