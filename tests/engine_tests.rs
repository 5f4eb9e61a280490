// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Specforge Contributors

//! End-to-end engine flow tests
//!
//! Drives the orchestrator with the scripted mock provider and, for the
//! retry path, with a real adapter against wiremock. Commits stay with the
//! caller throughout, matching the generate/review/accept flow.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use specforge::artifacts::Stage;
use specforge::engine::{GenerationOrchestrator, GenerationPhase};
use specforge::error::{ApiError, SpecforgeError};
use specforge::llm::mock_provider::{MockFailure, MockOutcome, MockProvider};
use specforge::llm::provider::{Credential, GenerationRequest, ModelProvider, ProviderId};
use specforge::llm::providers::GeminiProvider;
use specforge::llm::RetryConfig;
use specforge::project::ProjectState;

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 3,
        base_delay_ms: 5,
        max_delay_ms: 40,
        jitter: 0.0,
    }
}

fn request() -> GenerationRequest {
    GenerationRequest::new("mock-model", "system", "prompt", Credential::new("k"))
}

#[tokio::test]
async fn generate_then_commit_produces_a_version() {
    let orchestrator = GenerationOrchestrator::new(fast_retry());
    let provider = MockProvider::new().with_chunks(vec!["The ", "answer"]);
    let mut project = ProjectState::new("flow");

    let session = orchestrator
        .begin(Stage::Research, ProviderId::Gemini, "mock-model")
        .unwrap();
    let full_text = orchestrator
        .run(&provider, &session, request(), |_| {}, |_| {})
        .await
        .unwrap();

    // The orchestrator returned text but committed nothing
    assert_eq!(project.artifacts.current_content(Stage::Research), None);

    project.artifacts.commit(Stage::Research, &full_text);
    assert_eq!(
        project.artifacts.current_content(Stage::Research),
        Some("The answer")
    );
}

#[tokio::test]
async fn cancelled_generation_commits_nothing() {
    let orchestrator = GenerationOrchestrator::new(fast_retry());
    let provider = MockProvider::new()
        .with_chunks(vec!["a", "b", "c", "d", "e"])
        .with_chunk_delay(Duration::from_millis(5));
    let project = Arc::new(Mutex::new(ProjectState::new("cancelled")));

    let session = orchestrator
        .begin(Stage::Prd, ProviderId::Gemini, "mock-model")
        .unwrap();
    let token = session.cancel_token();

    let delivered = Arc::new(Mutex::new(Vec::new()));
    let delivered_clone = delivered.clone();
    let result = orchestrator
        .run(
            &provider,
            &session,
            request(),
            move |chunk| {
                delivered_clone.lock().unwrap().push(chunk.to_string());
                if chunk == "b" {
                    token.cancel();
                }
            },
            |_| {},
        )
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, SpecforgeError::Api(ApiError::Cancelled)));

    // No chunk after the token fired, and no version appeared
    assert_eq!(*delivered.lock().unwrap(), vec!["a", "b"]);
    assert_eq!(
        project.lock().unwrap().artifacts.current_content(Stage::Prd),
        None
    );
}

#[tokio::test]
async fn rejected_second_start_leaves_project_untouched() {
    let orchestrator = GenerationOrchestrator::new(fast_retry());
    let mut project = ProjectState::new("exclusive");
    project.set_answer("goal", "only one at a time");
    project.artifacts.commit(Stage::Research, "existing");

    let before = serde_json::to_vec(&project).unwrap();

    let _active = orchestrator
        .begin(Stage::Prd, ProviderId::Gemini, "mock-model")
        .unwrap();
    let err = orchestrator
        .begin(Stage::Tech, ProviderId::Gemini, "mock-model")
        .unwrap_err();
    assert!(matches!(err, SpecforgeError::Session(_)));

    let after = serde_json::to_vec(&project).unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn status_phases_progress_in_order() {
    let orchestrator = GenerationOrchestrator::new(fast_retry());
    let provider = MockProvider::new().with_chunks(vec!["x"]);

    let session = orchestrator
        .begin(Stage::Agent, ProviderId::Gemini, "mock-model")
        .unwrap();
    let phases = Arc::new(Mutex::new(Vec::new()));
    let phases_clone = phases.clone();

    orchestrator
        .run(&provider, &session, request(), |_| {}, move |p| {
            phases_clone.lock().unwrap().push(p)
        })
        .await
        .unwrap();

    let phases = phases.lock().unwrap();
    assert_eq!(
        *phases,
        vec![
            GenerationPhase::Requesting,
            GenerationPhase::Streaming,
            GenerationPhase::Committing,
        ]
    );
}

#[tokio::test]
async fn refinement_keeps_both_versions_reachable() {
    let orchestrator = GenerationOrchestrator::new(fast_retry());
    let provider = MockProvider::new().with_outcomes(vec![
        MockOutcome::Chunks(vec!["first draft".to_string()]),
        MockOutcome::Chunks(vec!["refined draft".to_string()]),
    ]);
    let mut project = ProjectState::new("refine");

    for _ in 0..2 {
        let session = orchestrator
            .begin(Stage::Tech, ProviderId::Gemini, "mock-model")
            .unwrap();
        let text = orchestrator
            .run(&provider, &session, request(), |_| {}, |_| {})
            .await
            .unwrap();
        project.artifacts.commit(Stage::Tech, &text);
    }

    assert_eq!(
        project.artifacts.current_content(Stage::Tech),
        Some("refined draft")
    );
    project.artifacts.cycle(Stage::Tech, -1);
    assert_eq!(
        project.artifacts.current_content(Stage::Tech),
        Some("first draft")
    );
}

#[tokio::test]
async fn transient_failures_retry_then_stream() {
    let orchestrator = GenerationOrchestrator::new(fast_retry());
    let provider = MockProvider::new().with_outcomes(vec![
        MockOutcome::Fail(MockFailure::ServerError),
        MockOutcome::Fail(MockFailure::ServerError),
        MockOutcome::Fail(MockFailure::ServerError),
        MockOutcome::Chunks(vec!["finally".to_string()]),
    ]);

    let session = orchestrator
        .begin(Stage::Build, ProviderId::Gemini, "mock-model")
        .unwrap();
    let text = orchestrator
        .run(&provider, &session, request(), |_| {}, |_| {})
        .await
        .unwrap();

    assert_eq!(text, "finally");
    // Three failures then success: invoked exactly four times
    assert_eq!(provider.call_count(), 4);
}

#[tokio::test]
async fn retry_delays_double_between_attempts() {
    let orchestrator = GenerationOrchestrator::new(RetryConfig {
        max_retries: 3,
        base_delay_ms: 40,
        max_delay_ms: 400,
        jitter: 0.0,
    });
    let provider = MockProvider::new().with_outcomes(vec![
        MockOutcome::Fail(MockFailure::ServerError),
        MockOutcome::Fail(MockFailure::ServerError),
        MockOutcome::Fail(MockFailure::ServerError),
        MockOutcome::Chunks(vec!["done".to_string()]),
    ]);

    let session = orchestrator
        .begin(Stage::Research, ProviderId::Gemini, "mock-model")
        .unwrap();
    let started = Instant::now();
    orchestrator
        .run(&provider, &session, request(), |_| {}, |_| {})
        .await
        .unwrap();
    let elapsed = started.elapsed();

    // 40 + 80 + 160 = 280ms of scheduled backoff
    assert!(elapsed >= Duration::from_millis(280), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1000), "elapsed {elapsed:?}");
}

#[tokio::test]
async fn auth_failure_does_not_retry() {
    let orchestrator = GenerationOrchestrator::new(fast_retry());
    let provider = MockProvider::new().with_outcomes(vec![MockOutcome::Fail(MockFailure::Auth)]);

    let session = orchestrator
        .begin(Stage::Research, ProviderId::Gemini, "mock-model")
        .unwrap();
    let err = orchestrator
        .run(&provider, &session, request(), |_| {}, |_| {})
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SpecforgeError::Api(ApiError::AuthenticationFailed)
    ));
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn retry_integrates_with_real_adapter_over_http() {
    let counter = Arc::new(AtomicU32::new(0));
    let server = MockServer::start().await;

    // Two failures, then a good stream
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.5-flash:streamGenerateContent"))
        .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
            "error": {"code": 503, "status": "UNAVAILABLE", "message": "overloaded"}
        })))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.5-flash:streamGenerateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"recovered\"}]}}]}\n\n",
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let provider = GeminiProvider::with_base_url(server.uri());
    let orchestrator = GenerationOrchestrator::new(fast_retry());
    let session = orchestrator
        .begin(Stage::Research, ProviderId::Gemini, "gemini-2.5-flash")
        .unwrap();

    let counter_clone = counter.clone();
    let text = orchestrator
        .run(
            &provider,
            &session,
            GenerationRequest::new("gemini-2.5-flash", "s", "p", Credential::new("k")),
            move |_| {
                counter_clone.fetch_add(1, Ordering::SeqCst);
            },
            |_| {},
        )
        .await
        .unwrap();

    assert_eq!(text, "recovered");
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn exact_count_runs_concurrently_with_generation() {
    // The accountant's exact-count path must not block or be blocked by an
    // active generation.
    let orchestrator = GenerationOrchestrator::new(fast_retry());
    let gen_provider = MockProvider::new()
        .with_chunks(vec!["slow", " stream"])
        .with_chunk_delay(Duration::from_millis(20));
    let count_provider: Arc<dyn ModelProvider> =
        Arc::new(MockProvider::new().with_exact_count(55));

    let session = orchestrator
        .begin(Stage::Prd, ProviderId::Gemini, "mock-model")
        .unwrap();

    let count_task = {
        let provider = count_provider.clone();
        tokio::spawn(async move {
            provider
                .count_tokens("project text", "mock-model", &Credential::new("k"))
                .await
                .unwrap()
        })
    };

    let text = orchestrator
        .run(&gen_provider, &session, request(), |_| {}, |_| {})
        .await
        .unwrap();

    assert_eq!(text, "slow stream");
    assert_eq!(count_task.await.unwrap(), 55);
}
