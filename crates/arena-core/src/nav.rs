//! Flat square arena implementing [`WorldEngine`].
//!
//! The floor is the plane `y = 0`, bounded by `±half_extent` on x and z.
//! Movement is straight-line at each agent's `movement_speed`; there are no
//! obstacles. A negative inherited speed moves nothing, and integrated
//! positions never leave the floor. Animation cues are logged and
//! otherwise ignored.

use std::collections::{BTreeMap, BTreeSet};

use arena_agents::{AgentRoster, AnimationCue, WorldEngine};
use arena_types::{AgentId, Vec3};
use tracing::trace;

/// Obstacle-free navigation over a bounded floor.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatArena {
    half_extent: f32,
    destinations: BTreeMap<AgentId, Vec3>,
    disabled: BTreeSet<AgentId>,
    facing: BTreeMap<AgentId, Vec3>,
}

impl FlatArena {
    /// An arena whose floor spans `[-half_extent, half_extent]` on x and z.
    pub const fn new(half_extent: f32) -> Self {
        Self {
            half_extent,
            destinations: BTreeMap::new(),
            disabled: BTreeSet::new(),
            facing: BTreeMap::new(),
        }
    }

    /// Project `point` onto the floor.
    pub const fn clamp(&self, point: Vec3) -> Vec3 {
        Vec3::new(
            point.x.clamp(-self.half_extent, self.half_extent),
            0.0,
            point.z.clamp(-self.half_extent, self.half_extent),
        )
    }

    /// Current destination of `agent`, if it is moving.
    pub fn destination(&self, agent: AgentId) -> Option<Vec3> {
        self.destinations.get(&agent).copied()
    }

    /// Point `agent` was last turned toward.
    pub fn facing(&self, agent: AgentId) -> Option<Vec3> {
        self.facing.get(&agent).copied()
    }
}

impl WorldEngine for FlatArena {
    fn move_to(&mut self, agent: AgentId, destination: Vec3) {
        if self.disabled.contains(&agent) {
            return;
        }
        let clamped = self.clamp(destination);
        self.destinations.insert(agent, clamped);
    }

    fn halt(&mut self, agent: AgentId) {
        self.destinations.remove(&agent);
    }

    fn face(&mut self, agent: AgentId, point: Vec3) {
        self.facing.insert(agent, point);
    }

    fn cue(&mut self, agent: AgentId, cue: AnimationCue) {
        trace!(agent_id = %agent, ?cue, "animation cue");
    }

    fn set_navigation(&mut self, agent: AgentId, enabled: bool) {
        if enabled {
            self.disabled.remove(&agent);
        } else {
            self.disabled.insert(agent);
            self.destinations.remove(&agent);
        }
    }

    fn has_navigation(&self, agent: AgentId) -> bool {
        !self.disabled.contains(&agent)
    }

    fn sample_position(&self, near: Vec3, max_distance: f32) -> Option<Vec3> {
        let on_floor = self.clamp(near);
        (on_floor.distance(near) <= max_distance).then_some(on_floor)
    }

    fn integrate(&mut self, roster: &mut AgentRoster, dt: f32) {
        let mut arrived = Vec::new();
        for agent in roster.iter_mut() {
            let Some(destination) = self.destinations.get(&agent.id).copied() else {
                continue;
            };
            if !agent.is_alive() {
                arrived.push(agent.id);
                continue;
            }
            let step = agent.stats.movement_speed.max(0.0) * dt;
            agent.position = self.clamp(agent.position.move_towards(destination, step));
            if agent.position.distance(destination) <= f32::EPSILON {
                arrived.push(agent.id);
            }
        }
        for id in arrived {
            self.destinations.remove(&id);
        }
    }

    fn forget(&mut self, agent: AgentId) {
        self.destinations.remove(&agent);
        self.disabled.remove(&agent);
        self.facing.remove(&agent);
    }
}

#[cfg(test)]
mod tests {
    use arena_agents::{Agent, AgentBlueprint};
    use arena_types::{AgentStats, EvolutionTraits};

    use super::*;

    fn roster_with(x: f32, speed: f32) -> (AgentRoster, AgentId) {
        let blueprint = AgentBlueprint {
            name: String::from("Runner"),
            faction: None,
            position: Vec3::new(x, 0.0, 0.0),
            stats: AgentStats {
                movement_speed: speed,
                ..AgentStats::default()
            },
            evolution: EvolutionTraits::default(),
            strategy: String::new(),
            instructions: String::new(),
        };
        let mut roster = AgentRoster::new();
        let id = roster
            .insert(Agent::from_blueprint(&blueprint, 1000, 10))
            .unwrap_or_default();
        (roster, id)
    }

    #[test]
    fn moves_at_agent_speed() {
        let (mut roster, id) = roster_with(0.0, 2.0);
        let mut arena = FlatArena::new(100.0);
        arena.move_to(id, Vec3::new(10.0, 0.0, 0.0));
        arena.integrate(&mut roster, 1.0);
        let x = roster.get(id).map_or(0.0, |a| a.position.x);
        assert!((x - 2.0).abs() < 1e-5);
        assert!(arena.destination(id).is_some());
    }

    #[test]
    fn arrival_clears_destination() {
        let (mut roster, id) = roster_with(0.0, 5.0);
        let mut arena = FlatArena::new(100.0);
        arena.move_to(id, Vec3::new(1.0, 0.0, 0.0));
        arena.integrate(&mut roster, 1.0);
        assert_eq!(arena.destination(id), None);
    }

    #[test]
    fn negative_speed_stays_on_floor() {
        let (mut roster, id) = roster_with(9.0, -2.0);
        let mut arena = FlatArena::new(10.0);
        arena.move_to(id, Vec3::ZERO);
        for _ in 0..10 {
            arena.integrate(&mut roster, 1.0);
        }
        let x = roster.get(id).map_or(f32::NAN, |a| a.position.x);
        assert!(x.abs() <= 10.0);
        assert!((x - 9.0).abs() < 1e-5);
    }

    #[test]
    fn integrated_position_is_clamped() {
        let (mut roster, id) = roster_with(12.0, 1.0);
        let mut arena = FlatArena::new(10.0);
        arena.move_to(id, Vec3::new(10.0, 0.0, 0.0));
        arena.integrate(&mut roster, 0.5);
        assert_eq!(
            roster.get(id).map(|a| a.position),
            Some(Vec3::new(10.0, 0.0, 0.0))
        );
    }

    #[test]
    fn disabled_navigation_ignores_orders() {
        let (mut roster, id) = roster_with(0.0, 5.0);
        let mut arena = FlatArena::new(100.0);
        arena.set_navigation(id, false);
        arena.move_to(id, Vec3::new(10.0, 0.0, 0.0));
        arena.integrate(&mut roster, 1.0);
        assert!(!arena.has_navigation(id));
        assert_eq!(roster.get(id).map(|a| a.position), Some(Vec3::ZERO));
    }

    #[test]
    fn sample_projects_to_floor() {
        let arena = FlatArena::new(10.0);
        assert_eq!(
            arena.sample_position(Vec3::new(1.0, 3.0, 2.0), 5.0),
            Some(Vec3::new(1.0, 0.0, 2.0))
        );
        assert_eq!(arena.sample_position(Vec3::new(40.0, 0.0, 0.0), 5.0), None);
    }

    #[test]
    fn forget_drops_state() {
        let mut arena = FlatArena::new(10.0);
        let id = AgentId::new();
        arena.move_to(id, Vec3::new(1.0, 0.0, 0.0));
        arena.face(id, Vec3::ZERO);
        arena.set_navigation(id, false);
        arena.forget(id);
        assert!(arena.has_navigation(id));
        assert_eq!(arena.destination(id), None);
        assert_eq!(arena.facing(id), None);
    }
}
