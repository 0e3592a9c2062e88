//! Agent records, the live roster, and the name registry.
//!
//! An [`Agent`] is built either from an [`AgentBlueprint`] (seed agents and
//! the offspring template, both loaded from configuration) or by the
//! reproduction system. The [`AgentRoster`] owns every agent that has not
//! yet been removed, indexed by [`AgentId`], together with the
//! [`NameRegistry`] that keeps display names unique among the living.

use std::collections::{BTreeMap, BTreeSet};

use arena_types::{AgentId, AgentSnapshot, AgentStats, EvolutionTraits, Tag, Vec3};
use serde::{Deserialize, Serialize};

use crate::combat::AttackLoop;
use crate::error::AgentError;
use crate::messaging::ChatHistory;

// ---------------------------------------------------------------------------
// Blueprint
// ---------------------------------------------------------------------------

/// Static description of an agent, as written in configuration.
///
/// Seed roster entries and the offspring template share this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentBlueprint {
    /// Display name. For the offspring template this is only used as the
    /// base of generational fallback names.
    pub name: String,
    /// Optional faction label.
    #[serde(default)]
    pub faction: Option<String>,
    /// Starting position.
    #[serde(default = "default_position")]
    pub position: Vec3,
    /// Combat and movement stats.
    #[serde(default)]
    pub stats: AgentStats,
    /// Mutation parameters.
    #[serde(default)]
    pub evolution: EvolutionTraits,
    /// Persona and goal text.
    #[serde(default)]
    pub strategy: String,
    /// Instruction text appended to every decision request.
    #[serde(default)]
    pub instructions: String,
}

const fn default_position() -> Vec3 {
    Vec3::ZERO
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// One combatant and all of its mutable state.
#[derive(Debug, Clone)]
pub struct Agent {
    /// Stable id, assigned at creation.
    pub id: AgentId,
    /// Display name, unique among living agents.
    pub name: String,
    /// Optional faction label.
    pub faction: Option<String>,
    /// Current position, advanced by the world engine.
    pub position: Vec3,
    /// Current health. May go below zero for the instant of a kill.
    pub health: f32,
    /// Combat and movement stats.
    pub stats: AgentStats,
    /// Mutation parameters passed on to offspring.
    pub evolution: EvolutionTraits,
    /// 1 for seed agents, parent + 1 for offspring.
    pub generation: u32,
    /// Scene tag.
    pub tag: Tag,
    /// Current attack target.
    pub target: Option<AgentId>,
    /// Running attack state machine, if any.
    pub attack: Option<AttackLoop>,
    /// Bounded chat history.
    pub chat: ChatHistory,
    /// Persona and goal text.
    pub strategy: String,
    /// Instruction text.
    pub instructions: String,
    /// Simulated time at which the agent leaves the live set.
    pub removal_at: Option<f64>,
    killed: bool,
    facts: Vec<String>,
    actions: Vec<String>,
    action_limit: usize,
}

impl Agent {
    /// Create an agent from a blueprint, at full health.
    pub fn from_blueprint(
        blueprint: &AgentBlueprint,
        chat_char_budget: usize,
        action_limit: usize,
    ) -> Self {
        Self {
            id: AgentId::new(),
            name: blueprint.name.clone(),
            faction: blueprint.faction.clone(),
            position: blueprint.position,
            health: blueprint.stats.max_health,
            stats: blueprint.stats,
            evolution: blueprint.evolution,
            generation: 1,
            tag: Tag::Enemy,
            target: None,
            attack: None,
            chat: ChatHistory::new(chat_char_budget),
            strategy: blueprint.strategy.clone(),
            instructions: blueprint.instructions.clone(),
            removal_at: None,
            killed: false,
            facts: Vec::new(),
            actions: Vec::new(),
            action_limit,
        }
    }

    /// Whether the agent has been defeated.
    pub const fn is_killed(&self) -> bool {
        self.killed
    }

    /// Whether the agent can act and be targeted.
    pub fn is_alive(&self) -> bool {
        !self.killed && self.tag != Tag::Dead && self.health > 0.0
    }

    /// Flip the killed flag. Returns `true` only for the call that made
    /// the transition; every later call returns `false`.
    ///
    /// A killed agent loses its target and attack loop.
    pub(crate) fn mark_killed(&mut self) -> bool {
        if self.killed {
            return false;
        }
        self.killed = true;
        self.target = None;
        self.attack = None;
        true
    }

    /// Append a persistent fact. The log is append-only and never pruned.
    pub fn remember_fact(&mut self, fact: impl Into<String>) {
        self.facts.push(fact.into());
    }

    /// The persistent fact log, oldest first.
    pub fn facts(&self) -> &[String] {
        &self.facts
    }

    /// Record an action taken by this agent, dropping the oldest once the
    /// history limit is reached.
    pub fn record_action(&mut self, action: impl Into<String>) {
        if self.action_limit == 0 {
            return;
        }
        if self.actions.len() >= self.action_limit {
            self.actions.remove(0);
        }
        self.actions.push(action.into());
    }

    /// The action history, oldest first.
    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    /// Clear chat and action histories.
    pub(crate) fn clear_history(&mut self) {
        self.chat.clear();
        self.actions.clear();
    }

    /// Apply passive regeneration for `dt` seconds, capped at max health.
    pub fn regenerate(&mut self, dt: f32) {
        if !self.stats.regen || !self.is_alive() || self.health >= self.stats.max_health {
            return;
        }
        self.health = self
            .stats
            .health_regen
            .mul_add(dt, self.health)
            .min(self.stats.max_health);
    }

    /// Read-only view of this agent as seen from `viewer`.
    pub fn snapshot(&self, viewer: Vec3, target_name: Option<String>) -> AgentSnapshot {
        AgentSnapshot {
            id: self.id,
            name: self.name.clone(),
            faction: self.faction.clone(),
            position: self.position,
            distance: self.position.distance(viewer),
            health: self.health,
            stats: self.stats,
            target_name,
        }
    }
}

// ---------------------------------------------------------------------------
// Name registry
// ---------------------------------------------------------------------------

/// Every name ever seen, and which living agent holds each name now.
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    seen: BTreeSet<String>,
    living: BTreeMap<String, AgentId>,
}

impl NameRegistry {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            seen: BTreeSet::new(),
            living: BTreeMap::new(),
        }
    }

    /// Reserve `name` for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::DuplicateName`] if a living agent already
    /// holds the name.
    pub fn claim(&mut self, name: &str, id: AgentId) -> Result<(), AgentError> {
        if self.living.contains_key(name) {
            return Err(AgentError::DuplicateName(name.to_owned()));
        }
        self.seen.insert(name.to_owned());
        self.living.insert(name.to_owned(), id);
        Ok(())
    }

    /// Release a name once its holder is defeated. It stays in the seen
    /// set.
    pub fn release(&mut self, name: &str) {
        self.living.remove(name);
    }

    /// Whether a living agent holds `name`.
    pub fn is_held(&self, name: &str) -> bool {
        self.living.contains_key(name)
    }

    /// Living holder of `name`.
    pub fn holder(&self, name: &str) -> Option<AgentId> {
        self.living.get(name).copied()
    }

    /// Every name ever registered, dead agents included, sorted.
    pub fn known_names(&self) -> Vec<String> {
        self.seen.iter().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

/// All agents that have not been removed yet, killed ones included.
///
/// Iteration is in ascending [`AgentId`] order, which is creation order.
#[derive(Debug, Clone, Default)]
pub struct AgentRoster {
    agents: BTreeMap<AgentId, Agent>,
    names: NameRegistry,
}

impl AgentRoster {
    /// Create an empty roster.
    pub const fn new() -> Self {
        Self {
            agents: BTreeMap::new(),
            names: NameRegistry::new(),
        }
    }

    /// Add an agent and claim its name.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::DuplicateName`] if a living agent already
    /// holds the agent's name.
    pub fn insert(&mut self, agent: Agent) -> Result<AgentId, AgentError> {
        let id = agent.id;
        if agent.is_killed() {
            self.names.seen.insert(agent.name.clone());
        } else {
            self.names.claim(&agent.name, id)?;
        }
        self.agents.insert(id, agent);
        Ok(id)
    }

    /// Remove an agent from the live set entirely.
    pub fn remove(&mut self, id: AgentId) -> Option<Agent> {
        let agent = self.agents.remove(&id)?;
        if self.names.holder(&agent.name) == Some(id) {
            self.names.release(&agent.name);
        }
        Some(agent)
    }

    /// Look up an agent by id.
    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    /// Look up an agent by id, mutably.
    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(&id)
    }

    /// The single check-and-set for defeat. Returns `true` only for the
    /// call that transitioned the agent to killed; the name is released
    /// at the same moment.
    pub fn kill(&mut self, id: AgentId) -> bool {
        let Some(agent) = self.agents.get_mut(&id) else {
            return false;
        };
        if !agent.mark_killed() {
            return false;
        }
        if self.names.holder(&agent.name) == Some(id) {
            self.names.release(&agent.name);
        }
        true
    }

    /// Resolve a display name to an agent id.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::TargetAlreadyDead`] if only defeated agents
    /// carry the name, or [`AgentError::TargetNotFound`] if no agent in the
    /// roster carries it.
    pub fn resolve_name(&self, name: &str) -> Result<AgentId, AgentError> {
        if let Some(id) = self.names.holder(name) {
            if self.agents.get(&id).is_some_and(Agent::is_alive) {
                return Ok(id);
            }
        }
        if self.agents.values().any(|a| a.name == name) {
            return Err(AgentError::TargetAlreadyDead(name.to_owned()));
        }
        Err(AgentError::TargetNotFound(name.to_owned()))
    }

    /// Ids of every agent in the roster, ascending.
    pub fn ids(&self) -> Vec<AgentId> {
        self.agents.keys().copied().collect()
    }

    /// Ids of living agents, ascending.
    pub fn living_ids(&self) -> Vec<AgentId> {
        self.agents
            .values()
            .filter(|a| a.is_alive())
            .map(|a| a.id)
            .collect()
    }

    /// Iterate over every agent, ascending by id.
    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    /// Iterate mutably over every agent, ascending by id.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Agent> {
        self.agents.values_mut()
    }

    /// Number of agents in the roster, killed ones included.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Number of living agents.
    pub fn living_count(&self) -> usize {
        self.agents.values().filter(|a| a.is_alive()).count()
    }

    /// The name registry.
    pub const fn names(&self) -> &NameRegistry {
        &self.names
    }
}
