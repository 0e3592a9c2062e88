//! Step cycle: the fixed-order loop that drives the arena.
//!
//! Each call to [`Simulation::step`] runs these phases:
//!
//! 1. **Clock** -- advance simulated time by one step.
//!
//! 2. **Completions** -- apply every background result that has finished
//!    (decisions, summaries, names, strategies), re-checking liveness
//!    first. Results for killed agents are discarded.
//!
//! 3. **Agents** -- in ascending [`AgentId`] order: regenerate health,
//!    issue a decision request if the cooldown expired, and advance the
//!    attack loop. A defeat plans an offspring and asks for its name.
//!
//! 4. **Movement** -- the [`WorldEngine`] integrates positions.
//!
//! 5. **Removal** -- killed agents whose delay has passed leave the roster.
//!
//! Provider calls never block a step: they run as tasks on the tokio
//! runtime and their results are picked up by a later step. Everything
//! else mutates state only here, on the caller's task.

use std::collections::BTreeMap;

use arena_agents::death::remove_expired;
use arena_agents::reproduction::{
    apply_strategy, birth_announcement, fallback_name, materialize, plan_offspring,
};
use arena_agents::{
    Agent, AgentBlueprint, AgentError, AgentRoster, DefeatRecord, LifecycleConfig, SpawnRequest,
    StrikeOutcome, SummaryRequest, WorldEngine, advance_attack, messaging,
};
use arena_types::{Action, AgentId, SUMMARY_PLACEHOLDER};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use crate::clock::{ClockError, SimClock};
use crate::config::SimulationConfig;
use crate::controller::{AgentController, dispatch_action};
use crate::decision::{DecisionClient, DecisionProvider};
use crate::prompt::PromptAssembler;
use crate::world::WorldQuery;

/// Errors that can occur while building or stepping a simulation.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// A clock operation failed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// A seed agent could not be placed.
    #[error("agent error: {source}")]
    Agent {
        /// The underlying agent error.
        #[from]
        source: AgentError,
    },
}

/// Summary of one step (or one [`Simulation::settle`]).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepSummary {
    /// Step number.
    pub tick: u64,
    /// Simulated time at the end of the step.
    pub now: f64,
    /// Living agents at the end of the step.
    pub living: usize,
    /// Agents that issued a decision request.
    pub decisions: Vec<AgentId>,
    /// Defeats that happened.
    pub defeats: Vec<DefeatRecord>,
    /// Offspring that entered the roster.
    pub births: Vec<AgentId>,
    /// Agents removed after their delay.
    pub removed: Vec<AgentId>,
}

/// A finished background task.
#[derive(Debug)]
enum Completion {
    Decision { agent: AgentId, action: Action },
    Summary { agent: AgentId, text: String },
    Name { spawn: Box<SpawnRequest>, name: String },
    Strategy { agent: AgentId, text: String },
}

/// The whole arena: roster, engine, clock and in-flight provider work.
pub struct Simulation<P, E> {
    clock: SimClock,
    roster: AgentRoster,
    controllers: BTreeMap<AgentId, AgentController>,
    engine: E,
    client: DecisionClient<P>,
    prompts: PromptAssembler,
    template: AgentBlueprint,
    lifecycle: LifecycleConfig,
    decision_interval: f64,
    rng: StdRng,
    tasks: JoinSet<Completion>,
}

impl<P: DecisionProvider, E: WorldEngine> Simulation<P, E> {
    /// Build a simulation from configuration, placing every seed agent.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::Agent`] if two seed agents share a name.
    pub fn new(
        config: &SimulationConfig,
        engine: E,
        client: DecisionClient<P>,
        prompts: PromptAssembler,
    ) -> Result<Self, TickError> {
        let lifecycle = config.lifecycle();
        let mut roster = AgentRoster::new();
        let mut controllers = BTreeMap::new();
        for blueprint in &config.roster {
            let agent = Agent::from_blueprint(
                blueprint,
                lifecycle.chat_char_budget,
                lifecycle.action_history_limit,
            );
            let id = roster.insert(agent)?;
            controllers.insert(id, AgentController::new(0.0));
            debug!(agent_id = %id, name = %blueprint.name, "seed agent placed");
        }
        info!(
            world = %config.world.name,
            agents = roster.len(),
            seed = config.world.seed,
            "simulation initialized"
        );

        Ok(Self {
            clock: SimClock::new(),
            roster,
            controllers,
            engine,
            client,
            prompts,
            template: config.template.clone(),
            lifecycle,
            decision_interval: config.agents.decision_interval_secs,
            rng: StdRng::seed_from_u64(config.world.seed),
            tasks: JoinSet::new(),
        })
    }

    /// The roster.
    pub const fn roster(&self) -> &AgentRoster {
        &self.roster
    }

    /// The world engine.
    pub const fn engine(&self) -> &E {
        &self.engine
    }

    /// The clock.
    pub const fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// Decision state of one agent.
    pub fn controller(&self, agent: AgentId) -> Option<&AgentController> {
        self.controllers.get(&agent)
    }

    /// Number of background tasks not yet applied.
    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Run one step of `dt` simulated seconds.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::Clock`] for an invalid `dt` or tick overflow.
    pub fn step(&mut self, dt: f64) -> Result<StepSummary, TickError> {
        // --- Phase 1: Clock ---
        let tick = self.clock.advance(dt)?;
        let now = self.clock.now();
        #[allow(clippy::cast_possible_truncation)]
        let dt_f32 = dt as f32;
        let mut summary = StepSummary {
            tick,
            now,
            ..StepSummary::default()
        };

        // --- Phase 2: Completions ---
        while let Some(joined) = self.tasks.try_join_next() {
            self.handle_joined(joined, &mut summary);
        }

        // --- Phase 3: Agents ---
        for id in self.roster.ids() {
            let alive = match self.roster.get_mut(id) {
                Some(agent) => {
                    agent.regenerate(dt_f32);
                    agent.is_alive()
                }
                None => continue,
            };

            if alive && self.controllers.get(&id).is_some_and(|c| c.is_due(now)) {
                self.request_decision(id, now);
                summary.decisions.push(id);
            }

            if let StrikeOutcome::Defeated(record) =
                advance_attack(&mut self.roster, &mut self.engine, id, now, &self.lifecycle)
            {
                self.on_defeat(&record, &mut summary);
                summary.defeats.push(record);
            }
        }

        // --- Phase 4: Movement ---
        self.engine.integrate(&mut self.roster, dt_f32);

        // --- Phase 5: Removal ---
        summary.removed = remove_expired(&mut self.roster, &mut self.engine, now);
        for id in &summary.removed {
            self.controllers.remove(id);
        }

        summary.living = self.roster.living_count();
        debug!(
            tick,
            living = summary.living,
            decisions = summary.decisions.len(),
            defeats = summary.defeats.len(),
            births = summary.births.len(),
            pending = self.tasks.len(),
            "step complete"
        );
        Ok(summary)
    }

    /// Wait for every background task, including tasks spawned while
    /// applying results, and apply them. Simulated time does not move.
    pub async fn settle(&mut self) -> StepSummary {
        let mut summary = StepSummary {
            tick: self.clock.tick(),
            now: self.clock.now(),
            ..StepSummary::default()
        };
        while let Some(joined) = self.tasks.join_next().await {
            self.handle_joined(joined, &mut summary);
        }
        summary.living = self.roster.living_count();
        summary
    }

    /// Abort every background task and drop its result. Returns how many
    /// were running.
    pub fn abort_pending(&mut self) -> usize {
        let pending = self.tasks.len();
        self.tasks.abort_all();
        self.tasks.detach_all();
        pending
    }

    // -----------------------------------------------------------------------
    // Completions
    // -----------------------------------------------------------------------

    fn handle_joined(&mut self, joined: Result<Completion, JoinError>, summary: &mut StepSummary) {
        match joined {
            Ok(completion) => self.apply_completion(completion, summary),
            Err(e) if e.is_cancelled() => debug!("background task cancelled"),
            Err(e) => warn!(error = %e, "background task failed"),
        }
    }

    fn apply_completion(&mut self, completion: Completion, summary: &mut StepSummary) {
        match completion {
            Completion::Decision { agent, action } => {
                if let Some(controller) = self.controllers.get_mut(&agent) {
                    controller.complete();
                }
                if !self.roster.get(agent).is_some_and(Agent::is_alive) {
                    debug!(agent_id = %agent, action = action.label(), "decision for dead agent discarded");
                    return;
                }
                let summaries = dispatch_action(&mut self.roster, agent, &action);
                self.request_summaries(summaries);
            }
            Completion::Summary { agent, text } => {
                if !messaging::apply_summary(&mut self.roster, agent, &text) {
                    debug!(agent_id = %agent, "summary discarded");
                }
            }
            Completion::Name { spawn, name } => self.apply_name(*spawn, name, summary),
            Completion::Strategy { agent, text } => {
                if apply_strategy(&mut self.roster, agent, &text) {
                    debug!(agent_id = %agent, "offspring strategy applied");
                } else {
                    debug!(agent_id = %agent, "strategy for dead offspring discarded");
                }
            }
        }
    }

    fn apply_name(&mut self, mut spawn: SpawnRequest, name: String, summary: &mut StepSummary) {
        let name = if self.roster.names().is_held(&name) {
            if spawn.name_attempts < self.lifecycle.name_retry_limit {
                spawn.name_attempts = spawn.name_attempts.saturating_add(1);
                info!(
                    spawn_id = %spawn.id,
                    name = %name,
                    attempt = spawn.name_attempts,
                    "generated name taken, asking again"
                );
                self.request_name(spawn, summary);
                return;
            }
            let fallback = fallback_name(self.roster.names(), &spawn.parent_name, spawn.generation());
            info!(spawn_id = %spawn.id, name = %name, fallback = %fallback, "generated name taken, using fallback");
            fallback
        } else {
            name
        };

        match materialize(&mut self.roster, &spawn, &name, &self.template, &self.lifecycle) {
            Ok(id) => {
                self.controllers
                    .insert(id, AgentController::new(self.clock.now()));
                summary.births.push(id);
                let summaries =
                    messaging::broadcast(&mut self.roster, &birth_announcement(&spawn, &name));
                self.request_summaries(summaries);
                self.request_strategy(id, &spawn);
            }
            Err(e) => warn!(spawn_id = %spawn.id, error = %e, "offspring not spawned"),
        }
    }

    // -----------------------------------------------------------------------
    // Background requests
    // -----------------------------------------------------------------------

    fn request_decision(&mut self, agent: AgentId, now: f64) {
        let payload = self.roster.get(agent).and_then(|a| {
            let world = WorldQuery::new(&self.roster);
            let context = self.prompts.build_context(a, &world);
            self.prompts
                .build_request(a, &context)
                .map_err(|e| warn!(agent_id = %agent, error = %e, "decision prompt failed"))
                .ok()
        });

        let Some(controller) = self.controllers.get_mut(&agent) else {
            return;
        };
        controller.issue(now, self.decision_interval);
        let Some(request) = payload else {
            controller.complete();
            return;
        };

        let client = self.client.clone();
        let payload = request.into_payload();
        self.tasks.spawn(async move {
            let action = client.decide(agent, payload).await;
            Completion::Decision { agent, action }
        });
    }

    fn request_summaries(&mut self, requests: Vec<SummaryRequest>) {
        for request in requests {
            let agent = request.agent;
            let payload = self.roster.get(agent).map(|a| {
                let visible: Vec<String> = WorldQuery::new(&self.roster)
                    .visible_agents(agent)
                    .into_iter()
                    .map(|s| s.name)
                    .collect();
                self.prompts.summary_payload(&a.name, &request.entries, &visible)
            });
            match payload {
                Some(Ok(payload)) => {
                    let client = self.client.clone();
                    self.tasks.spawn(async move {
                        let text = client.summarize(agent, payload).await;
                        Completion::Summary { agent, text }
                    });
                }
                Some(Err(e)) => {
                    warn!(agent_id = %agent, error = %e, "summary prompt failed");
                    messaging::apply_summary(&mut self.roster, agent, SUMMARY_PLACEHOLDER);
                }
                None => {}
            }
        }
    }

    fn request_name(&mut self, spawn: SpawnRequest, summary: &mut StepSummary) {
        let fallback = fallback_name(self.roster.names(), &spawn.parent_name, spawn.generation());
        match self.prompts.name_payload(&self.roster.names().known_names()) {
            Ok(payload) => {
                let client = self.client.clone();
                self.tasks.spawn(async move {
                    let name = client.generate_name(payload, fallback).await;
                    Completion::Name {
                        spawn: Box::new(spawn),
                        name,
                    }
                });
            }
            Err(e) => {
                warn!(spawn_id = %spawn.id, error = %e, "name prompt failed, using fallback");
                self.apply_name(spawn, fallback, summary);
            }
        }
    }

    fn request_strategy(&mut self, agent: AgentId, spawn: &SpawnRequest) {
        match self.prompts.strategy_payload(spawn) {
            Ok(payload) => {
                let client = self.client.clone();
                let parent_strategy = spawn.parent_strategy.clone();
                self.tasks.spawn(async move {
                    let text = client.generate_strategy(payload, parent_strategy).await;
                    Completion::Strategy { agent, text }
                });
            }
            Err(e) => {
                warn!(agent_id = %agent, error = %e, "strategy prompt failed, keeping parent strategy");
                apply_strategy(&mut self.roster, agent, &spawn.parent_strategy);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Reproduction
    // -----------------------------------------------------------------------

    fn on_defeat(&mut self, record: &DefeatRecord, summary: &mut StepSummary) {
        info!(
            victor = %record.victor_name,
            victim = %record.victim_name,
            at = record.at,
            "agent defeated"
        );
        match plan_offspring(
            &self.roster,
            &self.engine,
            &self.template,
            record,
            &self.lifecycle,
            &mut self.rng,
        ) {
            Ok(spawn) => self.request_name(spawn, summary),
            Err(e) => warn!(agent_id = %record.victor, error = %e, "no offspring"),
        }
    }
}
