// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Specforge Contributors

//! Version store, accounting and persistence property tests

use proptest::prelude::*;

use specforge::accounting::{self, TokenUsage};
use specforge::artifacts::{Stage, VersionStore};
use specforge::llm::catalog::{self, TieredPricing};
use specforge::project::{ProjectState, SaveStatus, UndoStack};

#[test]
fn committed_versions_survive_later_commits() {
    let mut store = VersionStore::default();
    store.commit(Stage::Prd, "c1");
    store.commit(Stage::Prd, "c2");

    let (versions, cursor) = store.history(Stage::Prd);
    assert_eq!(versions[0].content, "c1");
    assert_eq!(versions[1].content, "c2");
    assert_eq!(cursor, 1);
}

#[test]
fn tiered_cost_matches_reference_value() {
    let mut model = catalog::lookup("gemini-2.5-pro").unwrap();
    model.input_cost_per_million = 2.0;
    model.output_cost_per_million = 10.0;
    model.tiered_pricing = Some(TieredPricing {
        threshold: 200_000,
        input_cost_above: 4.0,
        output_cost_above: 18.0,
    });

    let cost = accounting::cost(&model, 250_000, 1_000, false);
    assert!((cost - 0.618).abs() < 1e-9);
}

#[test]
fn estimate_boundaries() {
    assert_eq!(accounting::estimate_tokens(""), 0);
    let text = "x".repeat(400);
    assert_eq!(accounting::estimate_tokens(&text), 100);
}

#[test]
fn undo_then_commit_discards_forward_branch() {
    let mut project = ProjectState::new("undo");
    let mut stack = UndoStack::new(project.clone(), 10);

    project.artifacts.commit(Stage::Prd, "A");
    stack.push(project.clone());

    project.artifacts.commit(Stage::Prd, "B");
    stack.push(project.clone());

    // Back to A
    project = stack.undo().unwrap().clone();
    assert_eq!(project.artifacts.current_content(Stage::Prd), Some("A"));

    project.artifacts.commit(Stage::Prd, "C");
    stack.push(project.clone());

    // B is unreachable now
    assert!(!stack.can_redo());
    assert!(stack.redo().is_none());
    assert_eq!(
        stack.current().artifacts.current_content(Stage::Prd),
        Some("C")
    );
}

#[test]
fn usage_is_monotonic_until_reset() {
    let mut usage = TokenUsage::default();
    let mut last_total = 0;

    for i in 1..=10u64 {
        usage.record(i, i * 2, 0.001);
        assert!(usage.total_tokens() >= last_total);
        last_total = usage.total_tokens();
    }

    usage.reset();
    assert_eq!(usage.total_tokens(), 0);
}

proptest! {
    #[test]
    fn cycle_never_leaves_bounds(
        commits in 1usize..8,
        deltas in proptest::collection::vec(-5i64..=5, 0..32),
    ) {
        let mut store = VersionStore::default();
        for i in 0..commits {
            store.commit(Stage::Tech, format!("v{i}"));
        }

        for delta in deltas {
            store.cycle(Stage::Tech, delta);
            let (versions, cursor) = store.history(Stage::Tech);
            prop_assert!(cursor < versions.len());
        }
    }

    #[test]
    fn append_only_under_arbitrary_interleaving(
        ops in proptest::collection::vec((any::<bool>(), -3i64..=3), 1..24),
    ) {
        let mut store = VersionStore::default();
        let mut committed: Vec<String> = Vec::new();

        for (i, (commit, delta)) in ops.into_iter().enumerate() {
            if commit {
                let content = format!("content-{i}");
                store.commit(Stage::Agent, &content);
                committed.push(content);
            } else {
                store.cycle(Stage::Agent, delta);
            }

            // Every previously committed version is still byte-identical
            let (versions, _) = store.history(Stage::Agent);
            prop_assert_eq!(versions.len(), committed.len());
            for (version, expected) in versions.iter().zip(&committed) {
                prop_assert_eq!(&version.content, expected);
            }
        }
    }

    #[test]
    fn cost_is_never_negative(
        input in 0u64..2_000_000,
        output in 0u64..500_000,
        aggregator in any::<bool>(),
    ) {
        let model = catalog::lookup("gemini-2.5-pro").unwrap();
        prop_assert!(accounting::cost(&model, input, output, aggregator) >= 0.0);
    }

    #[test]
    fn aggregator_markup_is_exactly_5_5_percent(
        input in 1u64..1_000_000,
        output in 1u64..500_000,
    ) {
        let model = catalog::lookup("anthropic/claude-sonnet-4").unwrap();
        let base = accounting::cost(&model, input, output, false);
        let marked = accounting::cost(&model, input, output, true);
        prop_assert!((marked - base * 1.055).abs() < 1e-9);
    }
}

#[tokio::test]
async fn persisted_document_roundtrips_through_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = specforge::project::ProjectStore::new(
        dir.path(),
        std::time::Duration::from_millis(50),
    );

    let mut project = ProjectState::new("roundtrip");
    project.set_answer("audience", "platform teams");
    project.artifacts.commit(Stage::Research, "notes");
    project.artifacts.commit(Stage::Research, "better notes");
    project.artifacts.cycle(Stage::Research, -1);
    project.usage.record(1000, 500, 0.02);

    store.save_now(&project).await.unwrap();
    let loaded = store.load(project.id).unwrap().unwrap();

    // The cursor position survives persistence
    assert_eq!(
        loaded.artifacts.current_content(Stage::Research),
        Some("notes")
    );
    let (versions, cursor) = loaded.artifacts.history(Stage::Research);
    assert_eq!(versions.len(), 2);
    assert_eq!(cursor, 0);
    assert_eq!(loaded.usage.input, 1000);
    assert_eq!(loaded.save_status, SaveStatus::Saved);
}

#[tokio::test]
async fn old_schema_documents_load_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let store = specforge::project::ProjectStore::new(
        dir.path(),
        std::time::Duration::from_millis(50),
    );

    let id = uuid::Uuid::new_v4();
    // A v0-era document: no artifacts, no usage, plus a removed field
    let doc = format!(
        r#"{{"id": "{id}", "name": "antique", "answers": {{"q": "a"}}, "theme": "dark"}}"#
    );
    std::fs::write(store.path_for(id), doc).unwrap();

    let loaded = store.load(id).unwrap().unwrap();
    assert_eq!(loaded.name, "antique");
    assert_eq!(loaded.answers.get("q").map(|s| s.as_str()), Some("a"));
    assert_eq!(loaded.usage, TokenUsage::default());
    for stage in Stage::all() {
        assert_eq!(loaded.artifacts.current_content(*stage), None);
    }
}

#[test]
fn credentials_never_reach_the_persisted_document() {
    let project = ProjectState::new("secrets");
    let json = serde_json::to_string(&project).unwrap();
    assert!(!json.contains("api_key"));
    assert!(!json.contains("credential"));
}
