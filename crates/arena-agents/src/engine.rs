//! The world-engine capability consumed by combat and reproduction.
//!
//! Navigation, animation playback and ground queries live outside this
//! crate. Combat issues orders through [`WorldEngine`]; the scheduler asks
//! the engine to integrate positions once per step.

use arena_types::{AgentId, Vec3};

use crate::agent::AgentRoster;

/// Animation cues an agent can be asked to play.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimationCue {
    /// Start the strike animation.
    Strike {
        /// Playback speed multiplier, `1 / attack_speed`.
        playback_speed: f32,
    },
    /// Reset the strike animation.
    StrikeEnd,
    /// Play the death animation.
    Death,
}

/// Navigation and animation backend.
///
/// Orders addressed to an agent the engine does not know, or whose
/// navigation is disabled, are ignored.
pub trait WorldEngine {
    /// Start moving `agent` toward `destination`.
    fn move_to(&mut self, agent: AgentId, destination: Vec3);

    /// Stop `agent` where it stands.
    fn halt(&mut self, agent: AgentId);

    /// Turn `agent` to face `point`.
    fn face(&mut self, agent: AgentId, point: Vec3);

    /// Play an animation cue on `agent`.
    fn cue(&mut self, agent: AgentId, cue: AnimationCue);

    /// Enable or disable navigation for `agent`.
    fn set_navigation(&mut self, agent: AgentId, enabled: bool);

    /// Whether `agent` currently has working navigation.
    fn has_navigation(&self, agent: AgentId) -> bool;

    /// Nearest valid ground point within `max_distance` of `near`.
    fn sample_position(&self, near: Vec3, max_distance: f32) -> Option<Vec3>;

    /// Advance every moving agent by `dt` seconds, writing new positions
    /// into the roster.
    fn integrate(&mut self, roster: &mut AgentRoster, dt: f32);

    /// Drop all engine state for a removed agent.
    fn forget(&mut self, agent: AgentId);
}
