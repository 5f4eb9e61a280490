// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Specforge Contributors

//! Configuration management

pub mod settings;

pub use settings::{
    DefaultsConfig, PersistenceConfig, ProviderConfig, ProvidersConfig, ResilienceConfig, Settings,
};
