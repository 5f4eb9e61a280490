// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Specforge Contributors

//! Artifact version store
//!
//! Each pipeline stage keeps an append-only history of drafts plus a cursor
//! over them. Refinements never destroy prior versions; navigating back is
//! how a bad refinement gets discarded without losing it.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// One pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Research,
    Prd,
    Tech,
    Agent,
    Build,
}

impl Stage {
    /// All stages in pipeline order
    pub fn all() -> &'static [Stage] {
        &[
            Stage::Research,
            Stage::Prd,
            Stage::Tech,
            Stage::Agent,
            Stage::Build,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Research => "research",
            Stage::Prd => "prd",
            Stage::Tech => "tech",
            Stage::Agent => "agent",
            Stage::Build => "build",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "research" => Some(Stage::Research),
            "prd" => Some(Stage::Prd),
            "tech" => Some(Stage::Tech),
            "agent" => Some(Stage::Agent),
            "build" => Some(Stage::Build),
            _ => None,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactVersion {
    pub content: String,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
}

impl ArtifactVersion {
    fn now(content: String) -> Self {
        Self {
            content,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// Append-only history for one stage
///
/// Invariant: `current < versions.len()` whenever `versions` is non-empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageHistory {
    #[serde(default)]
    versions: Vec<ArtifactVersion>,
    #[serde(default)]
    current: usize,
}

impl StageHistory {
    /// Append a new version and move the cursor to it
    pub fn commit(&mut self, content: impl Into<String>) {
        self.versions.push(ArtifactVersion::now(content.into()));
        self.current = self.versions.len() - 1;
    }

    /// Move the cursor by `delta`, clamped at both ends. A move past either
    /// boundary is a no-op at that boundary, never a wrap.
    pub fn cycle(&mut self, delta: i64) {
        if self.versions.is_empty() {
            return;
        }
        let last = (self.versions.len() - 1) as i64;
        let next = (self.current as i64).saturating_add(delta).clamp(0, last);
        self.current = next as usize;
    }

    /// Content under the cursor. `None` for a history with no versions,
    /// distinct from a version whose content is empty.
    pub fn current_content(&self) -> Option<&str> {
        self.versions.get(self.current).map(|v| v.content.as_str())
    }

    /// Read-only view of the versions
    pub fn versions(&self) -> &[ArtifactVersion] {
        &self.versions
    }

    /// Cursor index; meaningless when `is_empty`
    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Repair the cursor after deserializing a document that was written by
    /// something older or by hand.
    pub fn normalize(&mut self) {
        if !self.versions.is_empty() && self.current >= self.versions.len() {
            self.current = self.versions.len() - 1;
        }
        if self.versions.is_empty() {
            self.current = 0;
        }
    }
}

/// Version store over all stages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionStore {
    #[serde(default)]
    research: StageHistory,
    #[serde(default)]
    prd: StageHistory,
    #[serde(default)]
    tech: StageHistory,
    #[serde(default)]
    agent: StageHistory,
    #[serde(default)]
    build: StageHistory,
}

impl VersionStore {
    pub fn stage(&self, stage: Stage) -> &StageHistory {
        match stage {
            Stage::Research => &self.research,
            Stage::Prd => &self.prd,
            Stage::Tech => &self.tech,
            Stage::Agent => &self.agent,
            Stage::Build => &self.build,
        }
    }

    pub fn stage_mut(&mut self, stage: Stage) -> &mut StageHistory {
        match stage {
            Stage::Research => &mut self.research,
            Stage::Prd => &mut self.prd,
            Stage::Tech => &mut self.tech,
            Stage::Agent => &mut self.agent,
            Stage::Build => &mut self.build,
        }
    }

    /// Append a generated draft for a stage
    pub fn commit(&mut self, stage: Stage, content: impl Into<String>) {
        self.stage_mut(stage).commit(content);
    }

    /// A manual edit is a first-class version, not an overwrite
    pub fn manual_edit(&mut self, stage: Stage, content: impl Into<String>) {
        self.stage_mut(stage).commit(content);
    }

    /// Navigate a stage's history
    pub fn cycle(&mut self, stage: Stage, delta: i64) {
        self.stage_mut(stage).cycle(delta);
    }

    /// Content under a stage's cursor
    pub fn current_content(&self, stage: Stage) -> Option<&str> {
        self.stage(stage).current_content()
    }

    /// Read-only history view: versions plus cursor
    pub fn history(&self, stage: Stage) -> (&[ArtifactVersion], usize) {
        let h = self.stage(stage);
        (h.versions(), h.current_index())
    }

    /// Repair cursors after loading an older document
    pub fn normalize(&mut self) {
        for stage in Stage::all() {
            self.stage_mut(*stage).normalize();
        }
    }
}
