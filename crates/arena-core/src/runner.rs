//! Simulation loop runner.
//!
//! [`run_simulation`] drives [`Simulation::step`] on a fixed real-time
//! interval until one of these holds:
//!
//! - **Tick limit**: `max_ticks` steps have run (0 = unlimited)
//! - **Time limit**: `max_real_time_seconds` of wall clock have passed
//! - **Extinction**: no agent is alive
//! - **Stop**: [`RunControl::request_stop`] was called (e.g. on Ctrl-C)
//!
//! Background provider work still in flight when the loop ends is
//! aborted.

use std::sync::atomic::{AtomicBool, Ordering};

use arena_agents::WorldEngine;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::WorldConfig;
use crate::decision::DecisionProvider;
use crate::tick::{Simulation, StepSummary, TickError};

/// Errors that can occur during the simulation run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A step failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: TickError,
    },
}

/// Why a simulation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationEndReason {
    /// Reached the configured `max_ticks` limit.
    MaxTicksReached,
    /// Reached the configured `max_real_time_seconds` limit.
    MaxRealTimeReached,
    /// A stop was requested.
    Stopped,
    /// All agents are dead.
    Extinction,
}

/// Result of the simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    /// The reason the simulation ended.
    pub end_reason: SimulationEndReason,
    /// The last step summary, if any step completed.
    pub final_summary: Option<StepSummary>,
    /// Total number of steps executed.
    pub total_ticks: u64,
    /// Offspring born over the whole run.
    pub total_births: usize,
    /// Defeats over the whole run.
    pub total_defeats: usize,
}

/// Bounds and stop flag shared with whoever may end the run.
#[derive(Debug)]
pub struct RunControl {
    stop_requested: AtomicBool,
    started_at: DateTime<Utc>,
    max_ticks: u64,
    max_real_time_seconds: u64,
    tick_interval_ms: u64,
    step_seconds: f64,
}

impl RunControl {
    /// Bounds taken from the world configuration; the wall clock starts now.
    pub fn new(world: &WorldConfig) -> Self {
        Self {
            stop_requested: AtomicBool::new(false),
            started_at: Utc::now(),
            max_ticks: world.max_ticks,
            max_real_time_seconds: world.max_real_time_seconds,
            tick_interval_ms: world.tick_interval_ms,
            step_seconds: world.step_seconds,
        }
    }

    /// Ask the loop to stop before its next step.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    /// Whether a stop was requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Whether `current_tick` reached the tick limit.
    pub const fn tick_limit_reached(&self, current_tick: u64) -> bool {
        self.max_ticks > 0 && current_tick >= self.max_ticks
    }

    /// Whether the wall-clock limit has passed.
    pub fn time_limit_reached(&self) -> bool {
        if self.max_real_time_seconds == 0 {
            return false;
        }
        let elapsed = Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds();
        u64::try_from(elapsed.max(0)).unwrap_or(u64::MAX) >= self.max_real_time_seconds
    }

    /// Simulated seconds per step.
    pub const fn step_seconds(&self) -> f64 {
        self.step_seconds
    }
}

/// Run the simulation loop until a termination condition is met.
///
/// # Errors
///
/// Returns [`RunnerError`] if a step fails.
pub async fn run_simulation<P: DecisionProvider, E: WorldEngine>(
    sim: &mut Simulation<P, E>,
    control: &RunControl,
) -> Result<SimulationResult, RunnerError> {
    let mut last_summary: Option<StepSummary> = None;
    let mut total_ticks: u64 = 0;
    let mut total_births: usize = 0;
    let mut total_defeats: usize = 0;

    info!(
        max_ticks = control.max_ticks,
        max_real_time_seconds = control.max_real_time_seconds,
        tick_interval_ms = control.tick_interval_ms,
        step_seconds = control.step_seconds,
        "Simulation starting"
    );

    let end_reason = loop {
        if control.is_stop_requested() {
            info!("Stop requested");
            break SimulationEndReason::Stopped;
        }
        if control.time_limit_reached() {
            info!(
                max_seconds = control.max_real_time_seconds,
                "Real-time limit reached"
            );
            break SimulationEndReason::MaxRealTimeReached;
        }

        let summary = sim.step(control.step_seconds)?;
        total_ticks = total_ticks.saturating_add(1);
        total_births = total_births.saturating_add(summary.births.len());
        total_defeats = total_defeats.saturating_add(summary.defeats.len());

        let extinct = summary.living == 0;
        let tick_limit = control.tick_limit_reached(summary.tick);
        let tick = summary.tick;
        last_summary = Some(summary);

        if extinct {
            info!(tick, "All agents dead -- extinction");
            break SimulationEndReason::Extinction;
        }
        if tick_limit {
            info!(tick, max_ticks = control.max_ticks, "Tick limit reached");
            break SimulationEndReason::MaxTicksReached;
        }

        if control.tick_interval_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(control.tick_interval_ms)).await;
        } else {
            tokio::task::yield_now().await;
        }
    };

    let aborted = sim.abort_pending();
    if aborted > 0 {
        info!(aborted, "Aborted in-flight provider requests");
    }

    Ok(SimulationResult {
        end_reason,
        final_summary: last_summary,
        total_ticks,
        total_births,
        total_defeats,
    })
}

/// Log the simulation end sequence.
pub fn log_simulation_end(result: &SimulationResult) {
    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        total_births = result.total_births,
        total_defeats = result.total_defeats,
        "Simulation ended"
    );

    if let Some(ref summary) = result.final_summary {
        info!(
            tick = summary.tick,
            simulated_seconds = summary.now,
            agents_alive = summary.living,
            "Final step summary"
        );
    } else {
        warn!("Simulation ended with no ticks executed");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use arena_agents::AgentBlueprint;
    use arena_types::{AgentStats, EvolutionTraits, Vec3};

    use super::*;
    use crate::config::SimulationConfig;
    use crate::decision::{ClientSettings, CompletionRequest, DecisionClient, ProviderError, ScriptedProvider};
    use crate::nav::FlatArena;
    use crate::prompt::PromptAssembler;

    type Idle = fn(&CompletionRequest) -> Result<String, ProviderError>;

    fn idle(_: &CompletionRequest) -> Result<String, ProviderError> {
        Ok(String::from("I wait."))
    }

    fn config(max_ticks: u64) -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.world.max_ticks = max_ticks;
        config.world.tick_interval_ms = 0;
        config.roster = vec![AgentBlueprint {
            name: String::from("Alpha"),
            faction: None,
            position: Vec3::ZERO,
            stats: AgentStats::default(),
            evolution: EvolutionTraits::default(),
            strategy: String::new(),
            instructions: String::new(),
        }];
        config
    }

    fn simulation(config: &SimulationConfig) -> Option<Simulation<ScriptedProvider<Idle>, FlatArena>> {
        let client = DecisionClient::new(
            Arc::new(ScriptedProvider::new(idle as Idle)),
            ClientSettings {
                model: String::new(),
                temperature: 0.0,
                max_retries: 0,
                request_timeout: Duration::from_secs(1),
                retry_backoff: Duration::from_millis(1),
            },
        );
        let prompts = PromptAssembler::new(true).ok()?;
        Simulation::new(config, FlatArena::new(config.world.half_extent), client, prompts).ok()
    }

    #[tokio::test]
    async fn bounded_by_max_ticks() {
        let config = config(5);
        let Some(mut sim) = simulation(&config) else {
            panic!("simulation setup failed");
        };
        let control = RunControl::new(&config.world);
        let Ok(result) = run_simulation(&mut sim, &control).await else {
            panic!("run failed");
        };
        assert_eq!(result.end_reason, SimulationEndReason::MaxTicksReached);
        assert_eq!(result.total_ticks, 5);
        assert_eq!(sim.pending_tasks(), 0);
    }

    #[tokio::test]
    async fn stop_before_first_tick() {
        let config = config(0);
        let Some(mut sim) = simulation(&config) else {
            panic!("simulation setup failed");
        };
        let control = RunControl::new(&config.world);
        control.request_stop();
        let Ok(result) = run_simulation(&mut sim, &control).await else {
            panic!("run failed");
        };
        assert_eq!(result.end_reason, SimulationEndReason::Stopped);
        assert_eq!(result.total_ticks, 0);
        assert!(result.final_summary.is_none());
    }

    #[test]
    fn limits() {
        let mut world = WorldConfig::default();
        world.max_ticks = 100;
        let control = RunControl::new(&world);
        assert!(!control.tick_limit_reached(99));
        assert!(control.tick_limit_reached(100));
        assert!(!control.time_limit_reached());
    }
}
