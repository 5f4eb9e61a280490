// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Specforge Contributors

//! Project state aggregate
//!
//! `ProjectState` is the single mutable root: answers, per-stage version
//! histories, generation settings and usage counters all hang off it. New
//! states are produced by cloning, never patched behind a reader's back.

pub mod persistence;
pub mod undo;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::accounting::TokenUsage;
use crate::artifacts::VersionStore;
use crate::llm::provider::ProviderId;

pub use persistence::ProjectStore;
pub use undo::UndoStack;

/// Where the durable copy of a project stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    /// In-memory state is ahead of the durable copy
    #[default]
    Unsaved,
    /// A write is in flight
    Saving,
    /// Durable copy matches
    Saved,
    /// The last write failed; distinct from `Unsaved` so callers can show
    /// a storage-full condition instead of a generic failure
    Error,
}

/// Per-project generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSettings {
    /// Active provider
    #[serde(default = "default_provider")]
    pub provider: ProviderId,

    /// Active model id
    #[serde(default)]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum output tokens
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Thinking budget, for models that take one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<u32>,

    /// Reasoning effort, for models that take one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,

    /// Whether generations should consult live search grounding
    #[serde(default)]
    pub use_grounding: bool,
}

fn default_provider() -> ProviderId {
    ProviderId::Gemini
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_output_tokens() -> u32 {
    8192
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: crate::llm::catalog::default_model(default_provider()),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            thinking_budget: None,
            reasoning_effort: None,
            use_grounding: false,
        }
    }
}

/// The single mutable root for one project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    /// Project id, the persistence key
    pub id: Uuid,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Intake questionnaire answers, field name to text
    #[serde(default)]
    pub answers: BTreeMap<String, String>,

    /// Per-stage version histories and cursors
    #[serde(default)]
    pub artifacts: VersionStore,

    /// Generation settings
    #[serde(default)]
    pub settings: ProjectSettings,

    /// Cumulative token/cost counters
    #[serde(default)]
    pub usage: TokenUsage,

    /// Transient save indicator, never persisted
    #[serde(skip)]
    pub save_status: SaveStatus,
}

impl ProjectState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            answers: BTreeMap::new(),
            artifacts: VersionStore::default(),
            settings: ProjectSettings::default(),
            usage: TokenUsage::default(),
            save_status: SaveStatus::Unsaved,
        }
    }

    /// Set one questionnaire answer
    pub fn set_answer(&mut self, field: impl Into<String>, text: impl Into<String>) {
        self.answers.insert(field.into(), text.into());
        self.save_status = SaveStatus::Unsaved;
    }

    /// All stage texts plus answers concatenated, the input to cost
    /// estimation over the whole project.
    pub fn combined_text(&self) -> String {
        let mut combined = String::new();
        for answer in self.answers.values() {
            combined.push_str(answer);
            combined.push('\n');
        }
        for stage in crate::artifacts::Stage::all() {
            if let Some(content) = self.artifacts.current_content(*stage) {
                combined.push_str(content);
                combined.push('\n');
            }
        }
        combined
    }

    /// Repair invariants after loading a document from an older schema
    pub fn normalize(&mut self) {
        self.artifacts.normalize();
        self.save_status = SaveStatus::Saved;
    }
}
