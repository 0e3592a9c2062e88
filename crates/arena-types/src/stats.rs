//! Combat stat blocks and read-only agent snapshots.

use serde::{Deserialize, Serialize};

use crate::geometry::Vec3;
use crate::ids::AgentId;

/// Combat and movement stats of an agent.
///
/// Loaded from configuration for seed agents and the offspring template,
/// and perturbed on inheritance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentStats {
    /// Maximum health. Current health lives on the agent.
    pub max_health: f32,
    /// Health subtracted from a victim per landed strike.
    pub attack_damage: f32,
    /// Seconds per full strike cycle (wind-up plus wind-down).
    pub attack_speed: f32,
    /// Maximum distance at which a strike can start.
    pub attack_range: f32,
    /// Units per second when moving.
    pub movement_speed: f32,
    /// Health regained per second while `regen` is on.
    #[serde(default)]
    pub health_regen: f32,
    /// Whether passive regeneration is active.
    #[serde(default)]
    pub regen: bool,
}

impl Default for AgentStats {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            attack_damage: 10.0,
            attack_speed: 1.0,
            attack_range: 2.0,
            movement_speed: 3.5,
            health_regen: 0.0,
            regen: false,
        }
    }
}

/// Heritable mutation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvolutionTraits {
    /// Standard deviation of the Gaussian stat perturbation.
    pub std_deviation: f32,
    /// When set, the standard deviation itself mutates every generation.
    pub genetic_instability: bool,
}

impl Default for EvolutionTraits {
    fn default() -> Self {
        Self {
            std_deviation: 0.1,
            genetic_instability: false,
        }
    }
}

/// Scene tag of an agent. Attackers treat [`Tag::Dead`] as an invalid
/// target even before the agent is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    /// A live combatant.
    Enemy,
    /// A defeated combatant awaiting removal.
    Dead,
}

/// Read-only view of another agent, as seen by a perceiving agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    /// Stable id.
    pub id: AgentId,
    /// Display name.
    pub name: String,
    /// Faction label, if any.
    pub faction: Option<String>,
    /// Position at snapshot time.
    pub position: Vec3,
    /// Distance from the perceiving agent.
    pub distance: f32,
    /// Current health.
    pub health: f32,
    /// Stat block.
    pub stats: AgentStats,
    /// Display name of the snapshot agent's current target, if any.
    pub target_name: Option<String>,
}
