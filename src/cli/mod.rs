// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Specforge Contributors

//! Thin command-line consumer of the engine
//!
//! No rendering logic lives here beyond printing; all behavior is engine
//! calls composed per command.

pub mod args;

use std::io::{Read, Write};

use uuid::Uuid;

use crate::accounting;
use crate::artifacts::Stage;
use crate::config::Settings;
use crate::engine::{GenerationOrchestrator, GenerationPhase};
use crate::error::{Result, SpecforgeError};
use crate::llm::provider::{GenerationRequest, ProviderId};
use crate::llm::{catalog, ProviderFactory, RetryConfig};
use crate::project::{ProjectState, ProjectStore};

pub use args::{Cli, Command};

/// Execute one CLI invocation
pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load()?;
    let store = ProjectStore::open_default(&settings);

    match cli.command {
        Command::New { name } => {
            let mut project = ProjectState::new(&name);
            project.settings.provider = settings.defaults.provider;
            project.settings.model =
                ProviderFactory::default_model(settings.defaults.provider, &settings);
            project.settings.temperature = settings.defaults.temperature;
            project.settings.max_output_tokens = settings.defaults.max_output_tokens;
            store.save_now(&project).await?;
            println!("Created project {} ({})", project.name, project.id);
            Ok(())
        }

        Command::Projects => {
            let projects = store.list()?;
            if projects.is_empty() {
                println!("No projects yet. Create one with `specforge new <name>`.");
            }
            for (id, name) in projects {
                println!("{id}  {name}");
            }
            Ok(())
        }

        Command::Generate {
            project,
            stage,
            prompt,
            system,
            provider,
            model,
            grounding,
        } => {
            let stage = parse_stage(&stage)?;
            let mut state = load_project(&store, project)?;
            generate(
                &settings, &store, &mut state, stage, &system, &prompt, provider, model, grounding,
            )
            .await
        }

        Command::Show { project, stage } => {
            let stage = parse_stage(&stage)?;
            let state = load_project(&store, project)?;
            match state.artifacts.current_content(stage) {
                Some(content) => println!("{content}"),
                None => println!("({stage} has no versions yet)"),
            }
            Ok(())
        }

        Command::Versions { project, stage } => {
            let stage = parse_stage(&stage)?;
            let state = load_project(&store, project)?;
            let (versions, cursor) = state.artifacts.history(stage);
            if versions.is_empty() {
                println!("({stage} has no versions yet)");
            }
            for (i, version) in versions.iter().enumerate() {
                let marker = if i == cursor { "*" } else { " " };
                let preview: String = version.content.chars().take(60).collect();
                println!("{marker} [{i}] {} {preview}", version.timestamp);
            }
            Ok(())
        }

        Command::Cycle {
            project,
            stage,
            delta,
        } => {
            let stage = parse_stage(&stage)?;
            let mut state = load_project(&store, project)?;
            state.artifacts.cycle(stage, delta);
            store.save_now(&state).await?;
            let (versions, cursor) = state.artifacts.history(stage);
            println!("{stage} now at version {cursor} of {}", versions.len());
            Ok(())
        }

        Command::Edit {
            project,
            stage,
            content,
        } => {
            let stage = parse_stage(&stage)?;
            let mut state = load_project(&store, project)?;
            let content = match content {
                Some(content) => content,
                None => {
                    let mut buffer = String::new();
                    std::io::stdin().read_to_string(&mut buffer)?;
                    buffer
                }
            };
            state.artifacts.manual_edit(stage, content);
            store.save_now(&state).await?;
            println!("Recorded manual edit as a new {stage} version");
            Ok(())
        }

        Command::Count { project } => {
            let state = load_project(&store, project)?;
            let text = state.combined_text();
            println!("estimated tokens: {}", accounting::estimate_tokens(&text));

            let provider_id = state.settings.provider;
            if let Ok(credential) = ProviderFactory::credential(provider_id, &settings) {
                let provider = ProviderFactory::create(provider_id, &settings);
                let counter = accounting::ExactCounter::new(
                    provider,
                    std::time::Duration::from_millis(settings.persistence.count_debounce_ms),
                );
                let (tx, rx) = tokio::sync::oneshot::channel();
                counter.request_exact(text, state.settings.model.clone(), credential, move |n| {
                    let _ = tx.send(n);
                });
                if let Ok(count) = rx.await {
                    println!("exact tokens:     {count}");
                }
            }
            Ok(())
        }

        Command::Usage { project } => {
            let state = load_project(&store, project)?;
            let usage = &state.usage;
            println!("input tokens:       {}", usage.input);
            println!("output tokens:      {}", usage.output);
            println!("grounding requests: {}", usage.grounding_requests);
            println!("estimated cost:     ${:.4}", usage.estimated_cost);
            Ok(())
        }

        Command::ResetUsage { project } => {
            let mut state = load_project(&store, project)?;
            state.usage.reset();
            store.save_now(&state).await?;
            println!("Usage counters reset");
            Ok(())
        }
    }
}

fn parse_stage(name: &str) -> Result<Stage> {
    Stage::parse(name)
        .ok_or_else(|| SpecforgeError::Config(format!("unknown stage '{name}'")))
}

fn load_project(store: &ProjectStore, id: Uuid) -> Result<ProjectState> {
    store
        .load(id)?
        .ok_or_else(|| SpecforgeError::Config(format!("no project with id {id}")))
}

#[allow(clippy::too_many_arguments)]
async fn generate(
    settings: &Settings,
    store: &ProjectStore,
    state: &mut ProjectState,
    stage: Stage,
    system: &str,
    prompt: &str,
    provider_override: Option<String>,
    model_override: Option<String>,
    grounding: bool,
) -> Result<()> {
    let provider_id = match provider_override {
        Some(ref name) => ProviderId::parse(name)
            .ok_or_else(|| SpecforgeError::Config(format!("unknown provider '{name}'")))?,
        None => state.settings.provider,
    };
    let model = model_override.unwrap_or_else(|| {
        if state.settings.model.is_empty() || provider_override.is_some() {
            ProviderFactory::default_model(provider_id, settings)
        } else {
            state.settings.model.clone()
        }
    });

    let provider = ProviderFactory::create(provider_id, settings);
    let credential = ProviderFactory::credential(provider_id, settings)?;

    let mut request = GenerationRequest::new(model.as_str(), system, prompt, credential)
        .with_temperature(state.settings.temperature)
        .with_max_output_tokens(state.settings.max_output_tokens);
    if let Some(budget) = state.settings.thinking_budget {
        request = request.with_thinking_budget(budget);
    }
    if let Some(ref effort) = state.settings.reasoning_effort {
        request = request.with_reasoning_effort(effort.clone());
    }
    if grounding || state.settings.use_grounding {
        request = request.with_grounding();
    }

    let orchestrator = GenerationOrchestrator::new(RetryConfig::from(&settings.resilience));
    let session = orchestrator.begin(stage, provider_id, &model)?;

    let full_text = orchestrator
        .run(
            provider.as_ref(),
            &session,
            request,
            |chunk| {
                print!("{chunk}");
                let _ = std::io::stdout().flush();
            },
            |phase| {
                if phase == GenerationPhase::Requesting {
                    eprintln!("{}", phase.label());
                }
            },
        )
        .await?;
    println!();

    // Commit is the caller's decision; the CLI accepts every completed run.
    state.artifacts.commit(stage, &full_text);

    let input_tokens = accounting::estimate_tokens(prompt) as u64
        + accounting::estimate_tokens(system) as u64;
    let output_tokens = accounting::estimate_tokens(&full_text) as u64;
    if let Some(config) = catalog::lookup(&model) {
        let call_cost = accounting::cost(
            &config,
            input_tokens,
            output_tokens,
            provider_id.is_aggregator(),
        );
        state.usage.record(input_tokens, output_tokens, call_cost);
    } else {
        state.usage.record(input_tokens, output_tokens, 0.0);
    }
    if grounding || state.settings.use_grounding {
        state.usage.record_grounding();
    }

    store.save_now(state).await?;
    eprintln!(
        "Committed {stage} version {} ({} chars)",
        state.artifacts.history(stage).1,
        full_text.len()
    );
    Ok(())
}
