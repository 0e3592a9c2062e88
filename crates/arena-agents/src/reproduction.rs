//! On-kill asexual reproduction with Gaussian stat inheritance.
//!
//! A kill produces a [`SpawnRequest`] right away: position, mutated stats
//! and a snapshot of the victor's lineage. The request waits for a name
//! from the decision source (or a generational fallback) and is then
//! turned into an [`Agent`] by [`materialize`]. A mutated strategy may
//! arrive later still and is applied with [`apply_strategy`].
//!
//! Stat inheritance, per offspring:
//!
//! - damage and max health: `parent * (1 + N(0, sigma))`, floored to 1.0
//!   when the result is not positive
//! - movement speed: `parent + N(0, sigma)`, not floored
//! - with genetic instability, sigma itself becomes `sigma + N(0, sigma)`
//!   and falls back to the parent's sigma when not positive

use std::f64::consts::TAU;

use arena_types::{AgentId, AgentStats, EvolutionTraits, SpawnId, Vec3};
use rand::Rng;

use crate::agent::{Agent, AgentBlueprint, AgentRoster, NameRegistry};
use crate::config::LifecycleConfig;
use crate::death::DefeatRecord;
use crate::engine::WorldEngine;
use crate::error::AgentError;

/// Separator between a base name and its generation suffix.
const GENERATION_SEPARATOR: &str = " - Gen ";

// ---------------------------------------------------------------------------
// Gaussian draws
// ---------------------------------------------------------------------------

/// Draw from `N(mean, std_dev)` with the Box-Muller transform over two
/// independent uniform draws.
pub fn sample_gaussian<R: Rng + ?Sized>(rng: &mut R, mean: f32, std_dev: f32) -> f32 {
    // Both in (0, 1]; ln(u1) stays finite.
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = 1.0 - rng.random::<f64>();
    let z = (-2.0 * u1.ln()).sqrt() * (TAU * u2).sin();
    #[allow(clippy::cast_possible_truncation)]
    let z = z as f32;
    std_dev.mul_add(z, mean)
}

/// Produce offspring stats from the template and the parent.
///
/// Stats the mutation does not touch (attack speed, range, regeneration)
/// come from the template.
pub fn inherit_stats<R: Rng + ?Sized>(
    template: &AgentStats,
    parent: &AgentStats,
    traits: &EvolutionTraits,
    rng: &mut R,
) -> (AgentStats, EvolutionTraits) {
    let sigma = traits.std_deviation;
    let mut stats = *template;

    stats.attack_damage = floored(parent.attack_damage * (1.0 + sample_gaussian(rng, 0.0, sigma)));
    stats.max_health = floored(parent.max_health * (1.0 + sample_gaussian(rng, 0.0, sigma)));
    stats.movement_speed = parent.movement_speed + sample_gaussian(rng, 0.0, sigma);

    let mut child_traits = *traits;
    if traits.genetic_instability {
        let mutated = sigma + sample_gaussian(rng, 0.0, sigma);
        child_traits.std_deviation = if mutated > 0.0 { mutated } else { sigma };
    }
    (stats, child_traits)
}

fn floored(value: f32) -> f32 {
    if value > 0.0 { value } else { 1.0 }
}

/// Uniform random point inside a sphere of `radius` around the origin.
pub fn random_offset<R: Rng + ?Sized>(rng: &mut R, radius: f32) -> Vec3 {
    loop {
        let candidate = Vec3::new(
            rng.random_range(-1.0..=1.0),
            rng.random_range(-1.0..=1.0),
            rng.random_range(-1.0..=1.0),
        );
        if candidate.length_squared() <= 1.0 {
            return candidate * radius;
        }
    }
}

// ---------------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------------

/// Strip a trailing generation suffix: `"Bob - Gen 3"` becomes `"Bob"`.
pub fn base_name(name: &str) -> &str {
    name.rsplit_once(GENERATION_SEPARATOR)
        .filter(|(_, generation)| {
            !generation.is_empty() && generation.chars().all(|c| c.is_ascii_digit())
        })
        .map_or(name, |(base, _)| base)
}

/// `"<base> - Gen <generation>"`.
pub fn generational_name(parent_name: &str, generation: u32) -> String {
    format!("{}{GENERATION_SEPARATOR}{generation}", base_name(parent_name))
}

/// A generational name no living agent holds, suffixed with a counter
/// when needed.
pub fn fallback_name(registry: &NameRegistry, parent_name: &str, generation: u32) -> String {
    let name = generational_name(parent_name, generation);
    if !registry.is_held(&name) {
        return name;
    }
    (2_u32..)
        .map(|n| format!("{name} ({n})"))
        .find(|candidate| !registry.is_held(candidate))
        .unwrap_or(name)
}

// ---------------------------------------------------------------------------
// Spawn requests
// ---------------------------------------------------------------------------

/// Everything needed to create an offspring once its name arrives.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRequest {
    /// Id of this pending spawn.
    pub id: SpawnId,
    /// The victor.
    pub parent: AgentId,
    /// Victor display name.
    pub parent_name: String,
    /// Victor generation.
    pub parent_generation: u32,
    /// Display name of the agent the victor defeated.
    pub defeated_name: String,
    /// Where the offspring appears.
    pub position: Vec3,
    /// Mutated stats.
    pub stats: AgentStats,
    /// Mutated evolution parameters.
    pub evolution: EvolutionTraits,
    /// Victor strategy at the time of the kill.
    pub parent_strategy: String,
    /// Victor instructions at the time of the kill.
    pub parent_instructions: String,
    /// Victor action history at the time of the kill.
    pub parent_actions: Vec<String>,
    /// Number of generated names already rejected as duplicates.
    pub name_attempts: u32,
}

impl SpawnRequest {
    /// Generation of the offspring.
    pub const fn generation(&self) -> u32 {
        self.parent_generation.saturating_add(1)
    }
}

/// Plan an offspring for the victor of `defeat`.
///
/// # Errors
///
/// - [`AgentError::AgentNotFound`] if the victor is no longer in the roster
/// - [`AgentError::SpawnPositionUnavailable`] if the engine finds no valid
///   ground near the sampled point
pub fn plan_offspring<R: Rng + ?Sized>(
    roster: &AgentRoster,
    engine: &dyn WorldEngine,
    template: &AgentBlueprint,
    defeat: &DefeatRecord,
    config: &LifecycleConfig,
    rng: &mut R,
) -> Result<SpawnRequest, AgentError> {
    let victor = roster
        .get(defeat.victor)
        .ok_or(AgentError::AgentNotFound(defeat.victor))?;

    let sampled = victor.position + random_offset(rng, config.spawn_radius);
    let position = engine
        .sample_position(sampled, config.spawn_search_radius)
        .ok_or(AgentError::SpawnPositionUnavailable {
            x: sampled.x,
            y: sampled.y,
            z: sampled.z,
            search_radius: config.spawn_search_radius,
        })?;

    let (stats, evolution) = inherit_stats(&template.stats, &victor.stats, &victor.evolution, rng);

    tracing::debug!(
        agent_id = %victor.id,
        generation = victor.generation.saturating_add(1),
        attack_damage = stats.attack_damage,
        max_health = stats.max_health,
        movement_speed = stats.movement_speed,
        std_deviation = evolution.std_deviation,
        "offspring planned"
    );

    Ok(SpawnRequest {
        id: SpawnId::new(),
        parent: victor.id,
        parent_name: victor.name.clone(),
        parent_generation: victor.generation,
        defeated_name: defeat.victim_name.clone(),
        position,
        stats,
        evolution,
        parent_strategy: victor.strategy.clone(),
        parent_instructions: victor.instructions.clone(),
        parent_actions: victor.actions().to_vec(),
        name_attempts: 0,
    })
}

/// Create the offspring described by `request` under `name`.
///
/// The offspring is a copy of the template at full health with the
/// mutated stats, an empty history and the template's strategy until a
/// mutated one arrives.
///
/// # Errors
///
/// Returns [`AgentError::DuplicateName`] if a living agent holds `name`.
pub fn materialize(
    roster: &mut AgentRoster,
    request: &SpawnRequest,
    name: &str,
    template: &AgentBlueprint,
    config: &LifecycleConfig,
) -> Result<AgentId, AgentError> {
    if roster.names().is_held(name) {
        return Err(AgentError::DuplicateName(name.to_owned()));
    }
    let mut agent = Agent::from_blueprint(template, config.chat_char_budget, config.action_history_limit);
    name.clone_into(&mut agent.name);
    agent.position = request.position;
    agent.stats = request.stats;
    agent.evolution = request.evolution;
    agent.health = request.stats.max_health;
    agent.generation = request.generation();
    agent.clear_history();

    let id = roster.insert(agent)?;
    tracing::info!(
        agent_id = %id,
        name,
        parent = %request.parent_name,
        generation = request.generation(),
        "offspring spawned"
    );
    Ok(id)
}

/// Text broadcast to every living agent when an offspring appears.
pub fn birth_announcement(request: &SpawnRequest, offspring_name: &str) -> String {
    format!(
        "{} has defeated {}. {} was born as their offspring.",
        request.parent_name, request.defeated_name, offspring_name
    )
}

/// Replace the offspring's strategy. Returns `false` if it is no longer
/// alive, in which case nothing changes.
pub fn apply_strategy(roster: &mut AgentRoster, offspring: AgentId, strategy: &str) -> bool {
    match roster.get_mut(offspring) {
        Some(agent) if agent.is_alive() => {
            strategy.clone_into(&mut agent.strategy);
            true
        }
        _ => false,
    }
}
