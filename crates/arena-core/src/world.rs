//! Read-only queries over the roster.
//!
//! [`WorldQuery`] is how the prompt assembler and the controller look at
//! other agents. Results are snapshots: anything acting on them must
//! re-validate liveness first.

use arena_agents::{Agent, AgentError, AgentRoster};
use arena_types::{AgentId, AgentSnapshot, AgentStats};

/// Why a display name did not resolve to a living agent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// No agent carries the name.
    #[error("no agent named {0}")]
    NotFound(String),
    /// Only defeated agents carry the name.
    #[error("{0} is dead")]
    Dead(String),
}

impl From<ResolveError> for AgentError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound(name) => Self::TargetNotFound(name),
            ResolveError::Dead(name) => Self::TargetAlreadyDead(name),
        }
    }
}

/// Borrowed view of the roster.
#[derive(Debug, Clone, Copy)]
pub struct WorldQuery<'a> {
    roster: &'a AgentRoster,
}

impl<'a> WorldQuery<'a> {
    /// Wrap a roster.
    pub const fn new(roster: &'a AgentRoster) -> Self {
        Self { roster }
    }

    /// Resolve a display name to a living agent.
    pub fn find_agent_by_name(&self, name: &str) -> Result<&'a Agent, ResolveError> {
        match self.roster.resolve_name(name) {
            Ok(id) => self
                .roster
                .get(id)
                .ok_or_else(|| ResolveError::NotFound(name.to_owned())),
            Err(AgentError::TargetAlreadyDead(n)) => Err(ResolveError::Dead(n)),
            Err(_) => Err(ResolveError::NotFound(name.to_owned())),
        }
    }

    /// Snapshots of every living agent except `viewer`, nearest first.
    pub fn visible_agents(&self, viewer: AgentId) -> Vec<AgentSnapshot> {
        let Some(me) = self.roster.get(viewer) else {
            return Vec::new();
        };
        let mut seen: Vec<AgentSnapshot> = self
            .roster
            .iter()
            .filter(|a| a.id != viewer && a.is_alive())
            .map(|a| a.snapshot(me.position, self.target_name(a)))
            .collect();
        seen.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        seen
    }

    /// Distance between two agents, if both are present.
    pub fn distance(&self, a: AgentId, b: AgentId) -> Option<f32> {
        let a = self.roster.get(a)?;
        let b = self.roster.get(b)?;
        Some(a.position.distance(b.position))
    }

    /// Stats of one agent.
    pub fn self_stats(&self, id: AgentId) -> Option<AgentStats> {
        self.roster.get(id).map(|a| a.stats)
    }

    /// Living agents whose attack loop targets `id`.
    pub fn attackers_of(&self, id: AgentId) -> Vec<&'a Agent> {
        self.roster
            .iter()
            .filter(|a| a.is_alive() && a.attack.is_some_and(|l| l.target == id))
            .collect()
    }

    /// Display name of `agent`'s current target.
    pub fn target_name(&self, agent: &Agent) -> Option<String> {
        agent
            .target
            .and_then(|t| self.roster.get(t))
            .map(|t| t.name.clone())
    }

    /// The underlying roster.
    pub const fn roster(&self) -> &'a AgentRoster {
        self.roster
    }
}

#[cfg(test)]
mod tests {
    use arena_agents::{AgentBlueprint, begin_attack};
    use arena_types::{EvolutionTraits, Vec3};

    use super::*;

    fn insert(roster: &mut AgentRoster, name: &str, x: f32) -> AgentId {
        let blueprint = AgentBlueprint {
            name: name.to_owned(),
            faction: None,
            position: Vec3::new(x, 0.0, 0.0),
            stats: AgentStats::default(),
            evolution: EvolutionTraits::default(),
            strategy: String::new(),
            instructions: String::new(),
        };
        roster
            .insert(Agent::from_blueprint(&blueprint, 1000, 10))
            .unwrap_or_default()
    }

    #[test]
    fn find_distinguishes_dead_and_missing() {
        let mut roster = AgentRoster::new();
        let bob = insert(&mut roster, "Bob", 0.0);
        roster.kill(bob);
        let world = WorldQuery::new(&roster);
        assert_eq!(
            world.find_agent_by_name("Bob").map(|a| a.id),
            Err(ResolveError::Dead(String::from("Bob")))
        );
        assert_eq!(
            world.find_agent_by_name("Zed").map(|a| a.id),
            Err(ResolveError::NotFound(String::from("Zed")))
        );
    }

    #[test]
    fn resolve_errors_become_target_errors() {
        assert_eq!(
            AgentError::from(ResolveError::NotFound(String::from("Ghost"))),
            AgentError::TargetNotFound(String::from("Ghost"))
        );
        assert_eq!(
            AgentError::from(ResolveError::Dead(String::from("Bob"))),
            AgentError::TargetAlreadyDead(String::from("Bob"))
        );
    }

    #[test]
    fn self_stats_reads_roster() {
        let mut roster = AgentRoster::new();
        let me = insert(&mut roster, "Me", 0.0);
        let world = WorldQuery::new(&roster);
        assert_eq!(world.self_stats(me), Some(AgentStats::default()));
        assert_eq!(world.self_stats(AgentId::new()), None);
    }

    #[test]
    fn visible_excludes_self_and_dead_sorted_by_distance() {
        let mut roster = AgentRoster::new();
        let me = insert(&mut roster, "Me", 0.0);
        let far = insert(&mut roster, "Far", 9.0);
        let near = insert(&mut roster, "Near", 1.0);
        let dead = insert(&mut roster, "Dead", 2.0);
        roster.kill(dead);

        let world = WorldQuery::new(&roster);
        let ids: Vec<AgentId> = world.visible_agents(me).iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![near, far]);
        assert_eq!(world.distance(me, far), Some(9.0));
        assert!(world.self_stats(me).is_some());
    }

    #[test]
    fn attackers_lists_loops_on_target() {
        let mut roster = AgentRoster::new();
        let a = insert(&mut roster, "A", 0.0);
        let b = insert(&mut roster, "B", 1.0);
        let c = insert(&mut roster, "C", 2.0);
        assert!(begin_attack(&mut roster, a, b).is_ok());
        assert!(begin_attack(&mut roster, c, b).is_ok());

        let world = WorldQuery::new(&roster);
        let attackers: Vec<AgentId> = world.attackers_of(b).iter().map(|x| x.id).collect();
        assert_eq!(attackers, vec![a, c]);
        assert!(world.attackers_of(a).is_empty());
        assert_eq!(
            roster.get(a).and_then(|x| world.target_name(x)),
            Some(String::from("B"))
        );
    }
}
