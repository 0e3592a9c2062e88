//! Entry point for the combat arena.
//!
//! Loads the simulation YAML and the LLM endpoint from the environment,
//! builds the arena over a flat floor, and runs the step loop until a
//! bound is reached, every agent is dead, or Ctrl-C is pressed.
//!
//! # Architecture
//!
//! ```text
//! step loop --> prompt assembler --> decision client --> LLM backend (HTTP)
//!     ^                                                        |
//!     +-------------- parsed action / summary / name ----------+
//! ```
//!
//! Provider calls run in the background; a failed or slow call never
//! stalls the loop, it only costs the agent that decision.

mod config;
mod error;
mod llm;

use std::sync::Arc;

use anyhow::Context;
use arena_core::config::SimulationConfig;
use arena_core::decision::{ClientSettings, DecisionClient};
use arena_core::nav::FlatArena;
use arena_core::prompt::PromptAssembler;
use arena_core::runner::{RunControl, log_simulation_end, run_simulation};
use arena_core::tick::Simulation;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::RunnerConfig;
use crate::llm::create_backend;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, templates or the seed roster are
/// invalid, or if a step fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("arena-runner starting");

    // Load configuration
    let runner_config = RunnerConfig::from_env()?;
    let mut config = SimulationConfig::from_file(&runner_config.arena_config)
        .with_context(|| format!("failed to load {}", runner_config.arena_config.display()))?;
    if let Some(model) = runner_config.model.clone() {
        config.llm.model = model;
    }
    if config.llm.model.trim().is_empty() {
        anyhow::bail!("no model configured: set LLM_MODEL or llm.model");
    }
    info!(
        world = %config.world.name,
        agents = config.roster.len(),
        model = %config.llm.model,
        max_ticks = config.world.max_ticks,
        "configuration loaded"
    );

    // Prompt templates
    let reveal_stats = config.agents.reveal_stats;
    let prompts = runner_config.templates_dir.as_deref().map_or_else(
        || PromptAssembler::new(reveal_stats),
        |dir| {
            info!(templates_dir = %dir.display(), "loading template overrides");
            PromptAssembler::with_overrides(reveal_stats, dir)
        },
    )?;

    // LLM backend
    let backend = create_backend(&runner_config.backend)?;
    info!(
        backend = backend.name(),
        api_url = %runner_config.backend.api_url,
        "LLM backend configured"
    );
    let client = DecisionClient::new(Arc::new(backend), ClientSettings::from(&config.llm));

    // Arena
    let engine = FlatArena::new(config.world.half_extent);
    let mut sim = Simulation::new(&config, engine, client, prompts)?;

    let control = Arc::new(RunControl::new(&config.world));
    let stop = Arc::clone(&control);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, stopping after the current step");
            stop.request_stop();
        }
    });

    let result = run_simulation(&mut sim, &control).await?;
    log_simulation_end(&result);

    Ok(())
}
