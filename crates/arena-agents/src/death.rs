//! Defeat handling and delayed removal.
//!
//! A defeat flips the victim's killed flag through the roster's single
//! check-and-set, tags it [`Tag::Dead`], disables its navigation, plays
//! the death cue and schedules its removal a fixed delay later. Removal
//! itself happens in [`remove_expired`], never at the moment of the kill.

use arena_types::{AgentId, Tag, Vec3};

use crate::agent::AgentRoster;
use crate::config::LifecycleConfig;
use crate::engine::{AnimationCue, WorldEngine};

/// Facts about one defeat, handed to the reproduction system.
#[derive(Debug, Clone, PartialEq)]
pub struct DefeatRecord {
    /// The agent that landed the killing strike.
    pub victor: AgentId,
    /// Victor display name at the time of the kill.
    pub victor_name: String,
    /// The defeated agent.
    pub victim: AgentId,
    /// Victim display name.
    pub victim_name: String,
    /// Where the victim fell.
    pub position: Vec3,
    /// Simulated time of the kill.
    pub at: f64,
    /// Simulated time the victim leaves the live set.
    pub removal_at: f64,
}

/// Apply the consequences of `victor` defeating `victim` at `now`.
///
/// Returns `None` if the victim was already killed (or is gone), in which
/// case nothing happens. This is what keeps reproduction at exactly one
/// per death.
pub fn resolve_defeat(
    roster: &mut AgentRoster,
    engine: &mut dyn WorldEngine,
    victor: AgentId,
    victim: AgentId,
    now: f64,
    config: &LifecycleConfig,
) -> Option<DefeatRecord> {
    if !roster.kill(victim) {
        return None;
    }
    let removal_at = now + config.removal_delay_secs;

    let fallen = roster.get_mut(victim)?;
    fallen.tag = Tag::Dead;
    fallen.removal_at = Some(removal_at);
    let victim_name = fallen.name.clone();
    let position = fallen.position;

    engine.set_navigation(victim, false);
    engine.cue(victim, AnimationCue::Death);

    let victor_name = roster.get_mut(victor).map_or_else(String::new, |agent| {
        agent.record_action(format!("Defeated {victim_name}"));
        agent.name.clone()
    });

    tracing::info!(
        agent_id = %victor,
        victor = %victor_name,
        victim = %victim_name,
        removal_at,
        "agent defeated"
    );

    Some(DefeatRecord {
        victor,
        victor_name,
        victim,
        victim_name,
        position,
        at: now,
        removal_at,
    })
}

/// Remove every killed agent whose removal time has passed.
///
/// Returns the removed ids in ascending order.
pub fn remove_expired(
    roster: &mut AgentRoster,
    engine: &mut dyn WorldEngine,
    now: f64,
) -> Vec<AgentId> {
    let expired: Vec<AgentId> = roster
        .iter()
        .filter(|a| a.is_killed() && a.removal_at.is_some_and(|t| t <= now))
        .map(|a| a.id)
        .collect();
    for id in &expired {
        roster.remove(*id);
        engine.forget(*id);
        tracing::debug!(agent_id = %id, "agent removed");
    }
    expired
}
