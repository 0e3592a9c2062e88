//! Error types for the arena-agents crate.
//!
//! Every variant here is recoverable: callers turn them into a no-op, a
//! persistent-fact entry on the acting agent, or a fallback value. None of
//! them ever aborts the tick loop.

use arena_types::AgentId;

/// Errors that can occur during agent state operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AgentError {
    /// No agent with the given display name exists in the arena.
    #[error("target not found: {0}")]
    TargetNotFound(String),

    /// The named agent exists but has already been defeated.
    #[error("target already dead: {0}")]
    TargetAlreadyDead(String),

    /// Agent with the given ID is not (or no longer) in the roster.
    #[error("agent not found: {0}")]
    AgentNotFound(AgentId),

    /// The acting agent has been defeated and may not act.
    #[error("agent {0} is defeated")]
    ActorDefeated(AgentId),

    /// An attack loop is already running for this agent; re-entry is
    /// rejected rather than queued.
    #[error("agent {0} is already attacking")]
    AlreadyAttacking(AgentId),

    /// An agent tried to attack itself.
    #[error("agent {0} cannot target itself")]
    SelfTarget(AgentId),

    /// No valid ground point was found near the victor for an offspring.
    #[error("no spawn position within {search_radius} of ({x:.1}, {y:.1}, {z:.1})")]
    SpawnPositionUnavailable {
        /// Sampled x coordinate.
        x: f32,
        /// Sampled y coordinate.
        y: f32,
        /// Sampled z coordinate.
        z: f32,
        /// Radius searched for a valid point.
        search_radius: f32,
    },

    /// Display name is already held by a living agent.
    #[error("duplicate agent name: {0}")]
    DuplicateName(String),
}
