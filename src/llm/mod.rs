// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Specforge Contributors

//! Model provider layer
//!
//! Provides the uniform streaming abstraction over the provider backends.

pub mod catalog;
pub mod factory;
pub mod mock_provider;
pub mod provider;
pub mod providers;
pub mod retry;

pub use catalog::{ModelConfig, ModelTier, TieredPricing};
pub use factory::ProviderFactory;
pub use provider::{
    ChunkStream, Credential, GenerationRequest, ModelProvider, ProviderCapabilities, ProviderId,
};
pub use retry::{with_retry, RetryConfig};
