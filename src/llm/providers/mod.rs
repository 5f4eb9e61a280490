// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Specforge Contributors

//! Provider adapter implementations
//!
//! One module per wire protocol. Everything protocol-specific stays behind
//! the `ModelProvider` trait boundary.

pub(crate) mod common;

pub mod anthropic;
pub mod gemini;
pub mod openai;
pub mod openrouter;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use openrouter::OpenRouterProvider;
