// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Specforge Contributors

//! Generation engine
//!
//! Session admission, retry, streaming and cancellation live here. Version
//! commits stay with the caller.

pub mod orchestrator;
pub mod session;

pub use orchestrator::GenerationOrchestrator;
pub use session::{CancelToken, GenerationPhase, GenerationSession};
