// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Specforge Contributors

//! Command-line argument definitions

use clap::{Parser, Subcommand};
use uuid::Uuid;

/// Specforge - staged AI document pipeline
#[derive(Debug, Parser)]
#[command(name = "specforge", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a new project
    New {
        /// Project name
        name: String,
    },

    /// List stored projects
    Projects,

    /// Generate or refine a stage's content
    Generate {
        /// Project id
        #[arg(long)]
        project: Uuid,

        /// Pipeline stage (research, prd, tech, agent, build)
        #[arg(long)]
        stage: String,

        /// The prompt for this generation
        #[arg(long)]
        prompt: String,

        /// System instruction framing the task
        #[arg(long, default_value = "You are an expert product development assistant.")]
        system: String,

        /// Provider override (gemini, anthropic, openai, openrouter)
        #[arg(long)]
        provider: Option<String>,

        /// Model override
        #[arg(long)]
        model: Option<String>,

        /// Consult live search grounding where supported
        #[arg(long)]
        grounding: bool,
    },

    /// Print a stage's current content
    Show {
        #[arg(long)]
        project: Uuid,
        #[arg(long)]
        stage: String,
    },

    /// List a stage's version history
    Versions {
        #[arg(long)]
        project: Uuid,
        #[arg(long)]
        stage: String,
    },

    /// Move a stage's version cursor
    Cycle {
        #[arg(long)]
        project: Uuid,
        #[arg(long)]
        stage: String,
        /// Steps to move, negative for older versions
        #[arg(long, allow_hyphen_values = true)]
        delta: i64,
    },

    /// Record a manual edit as a new version
    Edit {
        #[arg(long)]
        project: Uuid,
        #[arg(long)]
        stage: String,
        /// Replacement content (reads stdin when omitted)
        #[arg(long)]
        content: Option<String>,
    },

    /// Estimate and exactly count tokens for the project's combined text
    Count {
        #[arg(long)]
        project: Uuid,
    },

    /// Show cumulative token usage and cost
    Usage {
        #[arg(long)]
        project: Uuid,
    },

    /// Reset cumulative usage counters
    ResetUsage {
        #[arg(long)]
        project: Uuid,
    },
}
