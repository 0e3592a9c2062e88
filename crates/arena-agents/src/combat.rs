//! Pursue-and-strike state machine.
//!
//! An attack is data on the attacker ([`AttackLoop`]) advanced by the
//! scheduler once per step through [`advance_attack`]. The cycle is:
//!
//! ```text
//! Seeking -> Engaging -> Striking -> (resolve) -> Recovering -> Seeking ...
//! ```
//!
//! Damage lands at the midpoint of the strike animation, `attack_speed / 2`
//! seconds after wind-up starts, and the loop is free to start the next
//! wind-up `attack_speed / 2` seconds after that. The target is re-checked
//! on every step; any failure ends the loop and clears the attacker's
//! target.

use arena_types::{AgentId, Vec3};

use crate::agent::AgentRoster;
use crate::config::LifecycleConfig;
use crate::death::{self, DefeatRecord};
use crate::engine::{AnimationCue, WorldEngine};
use crate::error::AgentError;

/// Phase of a running attack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttackPhase {
    /// Moving toward the target until within range.
    Seeking,
    /// In range; the next step halts, faces and starts the wind-up.
    Engaging,
    /// Wind-up running; damage lands at `strike_at`.
    Striking {
        /// Simulated time of the damage instant.
        strike_at: f64,
    },
    /// Wind-down running until `until`.
    Recovering {
        /// Simulated time at which the next cycle may start.
        until: f64,
    },
}

/// A running attack, stored on the attacker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackLoop {
    /// The victim.
    pub target: AgentId,
    /// Current phase.
    pub phase: AttackPhase,
}

/// Why an attack loop ended without a kill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The target left the roster.
    TargetMissing,
    /// The target was defeated by someone else.
    TargetDefeated,
    /// The attacker itself was defeated.
    AttackerDefeated,
}

/// Result of advancing one attacker by one step.
#[derive(Debug, Clone, PartialEq)]
pub enum StrikeOutcome {
    /// The agent has no attack running.
    Idle,
    /// The loop is still running.
    Continuing,
    /// The loop ended without a kill.
    Terminated(TerminationReason),
    /// This attacker's strike defeated the target.
    Defeated(DefeatRecord),
}

/// Start an attack loop from `attacker` on `target`.
///
/// # Errors
///
/// - [`AgentError::AgentNotFound`] / [`AgentError::ActorDefeated`] for an
///   absent or defeated attacker
/// - [`AgentError::SelfTarget`] when both ids match
/// - [`AgentError::AlreadyAttacking`] when a loop is already running
/// - [`AgentError::TargetAlreadyDead`] when the target is not alive
pub fn begin_attack(
    roster: &mut AgentRoster,
    attacker: AgentId,
    target: AgentId,
) -> Result<(), AgentError> {
    if attacker == target {
        return Err(AgentError::SelfTarget(attacker));
    }
    let target_name = match roster.get(target) {
        Some(t) if t.is_alive() => t.name.clone(),
        Some(t) => return Err(AgentError::TargetAlreadyDead(t.name.clone())),
        None => return Err(AgentError::AgentNotFound(target)),
    };
    let agent = roster
        .get_mut(attacker)
        .ok_or(AgentError::AgentNotFound(attacker))?;
    if !agent.is_alive() {
        return Err(AgentError::ActorDefeated(attacker));
    }
    if agent.attack.is_some() {
        return Err(AgentError::AlreadyAttacking(attacker));
    }

    agent.target = Some(target);
    agent.attack = Some(AttackLoop {
        target,
        phase: AttackPhase::Seeking,
    });
    agent.record_action(format!("Attacked {target_name}"));
    tracing::info!(agent_id = %attacker, target_name = %target_name, "attack started");
    Ok(())
}

/// End the loop: clear target and attack state, reset the strike cue.
fn terminate(
    roster: &mut AgentRoster,
    engine: &mut dyn WorldEngine,
    attacker: AgentId,
    reason: TerminationReason,
) -> StrikeOutcome {
    if let Some(agent) = roster.get_mut(attacker) {
        agent.attack = None;
        agent.target = None;
    }
    engine.cue(attacker, AnimationCue::StrikeEnd);
    tracing::debug!(agent_id = %attacker, ?reason, "attack ended");
    StrikeOutcome::Terminated(reason)
}

/// Snapshot of the target taken at the top of each phase.
struct TargetView {
    position: Vec3,
}

fn validate_target(roster: &AgentRoster, target: AgentId) -> Result<TargetView, TerminationReason> {
    match roster.get(target) {
        None => Err(TerminationReason::TargetMissing),
        Some(t) if !t.is_alive() => Err(TerminationReason::TargetDefeated),
        Some(t) => Ok(TargetView {
            position: t.position,
        }),
    }
}

fn set_phase(roster: &mut AgentRoster, attacker: AgentId, phase: AttackPhase) {
    if let Some(attack) = roster.get_mut(attacker).and_then(|a| a.attack.as_mut()) {
        attack.phase = phase;
    }
}

/// Advance `attacker`'s attack loop to simulated time `now`.
///
/// Several phases may be crossed in one call when no time needs to pass
/// between them (for example Recovering into Engaging when the target is
/// still in range).
pub fn advance_attack(
    roster: &mut AgentRoster,
    engine: &mut dyn WorldEngine,
    attacker: AgentId,
    now: f64,
    config: &LifecycleConfig,
) -> StrikeOutcome {
    // Seeking -> Engaging -> Striking is the longest zero-time chain, and
    // Recovering -> Seeking -> Engaging -> Striking the longest overall.
    for _ in 0..4 {
        let Some(agent) = roster.get(attacker) else {
            return StrikeOutcome::Idle;
        };
        let Some(attack) = agent.attack else {
            return StrikeOutcome::Idle;
        };
        if agent.is_killed() {
            return terminate(roster, engine, attacker, TerminationReason::AttackerDefeated);
        }
        let stats = agent.stats;
        let position = agent.position;

        let view = match validate_target(roster, attack.target) {
            Ok(view) => view,
            Err(reason) => return terminate(roster, engine, attacker, reason),
        };

        let half_cycle = f64::from(stats.attack_speed) * 0.5;

        match attack.phase {
            AttackPhase::Seeking => {
                if position.distance(view.position) <= stats.attack_range {
                    set_phase(roster, attacker, AttackPhase::Engaging);
                    continue;
                }
                if engine.has_navigation(attacker) {
                    engine.move_to(attacker, view.position);
                }
                return StrikeOutcome::Continuing;
            }
            AttackPhase::Engaging => {
                engine.halt(attacker);
                engine.face(attacker, view.position);
                let playback_speed = if stats.attack_speed > 0.0 {
                    stats.attack_speed.recip()
                } else {
                    1.0
                };
                engine.cue(attacker, AnimationCue::Strike { playback_speed });
                set_phase(
                    roster,
                    attacker,
                    AttackPhase::Striking {
                        strike_at: now + half_cycle,
                    },
                );
                return StrikeOutcome::Continuing;
            }
            AttackPhase::Striking { strike_at } => {
                if now < strike_at {
                    return StrikeOutcome::Continuing;
                }
                let strike = Strike {
                    attacker,
                    target: attack.target,
                    strike_at,
                    half_cycle,
                    damage: stats.attack_damage,
                };
                return resolve_strike(roster, engine, &strike, now, config);
            }
            AttackPhase::Recovering { until } => {
                if now < until {
                    return StrikeOutcome::Continuing;
                }
                engine.cue(attacker, AnimationCue::StrikeEnd);
                set_phase(roster, attacker, AttackPhase::Seeking);
            }
        }
    }
    StrikeOutcome::Continuing
}

/// One strike reaching its damage instant.
struct Strike {
    attacker: AgentId,
    target: AgentId,
    strike_at: f64,
    half_cycle: f64,
    damage: f32,
}

/// Apply damage at the strike instant and decide what follows.
fn resolve_strike(
    roster: &mut AgentRoster,
    engine: &mut dyn WorldEngine,
    strike: &Strike,
    now: f64,
    config: &LifecycleConfig,
) -> StrikeOutcome {
    let Strike {
        attacker,
        target,
        strike_at,
        half_cycle,
        damage,
    } = *strike;
    let Some(victim) = roster.get_mut(target) else {
        return terminate(roster, engine, attacker, TerminationReason::TargetMissing);
    };
    if victim.is_killed() {
        return terminate(roster, engine, attacker, TerminationReason::TargetDefeated);
    }
    victim.health -= damage;
    let remaining = victim.health;
    tracing::info!(
        agent_id = %attacker,
        victim = %victim.name,
        damage,
        remaining,
        "strike landed"
    );

    if remaining <= 0.0 {
        let record = death::resolve_defeat(roster, engine, attacker, target, now, config);
        if let Some(agent) = roster.get_mut(attacker) {
            agent.attack = None;
            agent.target = None;
        }
        engine.cue(attacker, AnimationCue::StrikeEnd);
        return record.map_or(
            StrikeOutcome::Terminated(TerminationReason::TargetDefeated),
            StrikeOutcome::Defeated,
        );
    }

    set_phase(
        roster,
        attacker,
        AttackPhase::Recovering {
            until: strike_at + half_cycle,
        },
    );
    StrikeOutcome::Continuing
}

#[cfg(test)]
mod tests {
    use arena_types::{AgentStats, EvolutionTraits, Tag};

    use super::*;
    use crate::agent::{Agent, AgentBlueprint};
    use crate::engine::testing::RecordingEngine;

    fn blueprint(name: &str, x: f32, health: f32, damage: f32) -> AgentBlueprint {
        AgentBlueprint {
            name: name.to_owned(),
            faction: None,
            position: Vec3::new(x, 0.0, 0.0),
            stats: AgentStats {
                max_health: health,
                attack_damage: damage,
                attack_speed: 1.0,
                attack_range: 2.0,
                ..AgentStats::default()
            },
            evolution: EvolutionTraits::default(),
            strategy: String::new(),
            instructions: String::new(),
        }
    }

    fn insert(roster: &mut AgentRoster, bp: &AgentBlueprint) -> AgentId {
        roster
            .insert(Agent::from_blueprint(bp, 1000, 10))
            .unwrap_or_default()
    }

    fn health(roster: &AgentRoster, id: AgentId) -> f32 {
        roster.get(id).map_or(f32::NAN, |a| a.health)
    }

    #[test]
    fn self_target_rejected() {
        let mut roster = AgentRoster::new();
        let a = insert(&mut roster, &blueprint("A", 0.0, 10.0, 15.0));
        assert_eq!(begin_attack(&mut roster, a, a), Err(AgentError::SelfTarget(a)));
    }

    #[test]
    fn reentry_rejected() {
        let mut roster = AgentRoster::new();
        let a = insert(&mut roster, &blueprint("A", 0.0, 10.0, 15.0));
        let b = insert(&mut roster, &blueprint("B", 1.0, 10.0, 1.0));
        assert!(begin_attack(&mut roster, a, b).is_ok());
        assert_eq!(
            begin_attack(&mut roster, a, b),
            Err(AgentError::AlreadyAttacking(a))
        );
    }

    #[test]
    fn full_cycle_kills_in_range_target() {
        let mut roster = AgentRoster::new();
        let mut engine = RecordingEngine::default();
        let config = LifecycleConfig::default();
        let a = insert(&mut roster, &blueprint("A", 0.0, 10.0, 15.0));
        let b = insert(&mut roster, &blueprint("B", 1.0, 10.0, 1.0));
        assert!(begin_attack(&mut roster, a, b).is_ok());

        // Seeking -> Engaging -> Striking in one step.
        assert_eq!(
            advance_attack(&mut roster, &mut engine, a, 0.0, &config),
            StrikeOutcome::Continuing
        );
        assert!(engine.cues_for(a).contains(&AnimationCue::Strike { playback_speed: 1.0 }));
        assert!((health(&roster, b) - 10.0).abs() < f32::EPSILON);

        // Before the midpoint nothing lands.
        assert_eq!(
            advance_attack(&mut roster, &mut engine, a, 0.25, &config),
            StrikeOutcome::Continuing
        );
        assert!((health(&roster, b) - 10.0).abs() < f32::EPSILON);

        let outcome = advance_attack(&mut roster, &mut engine, a, 0.5, &config);
        let StrikeOutcome::Defeated(record) = outcome else {
            panic!("expected defeat, got {outcome:?}");
        };
        assert_eq!(record.victor, a);
        assert_eq!(record.victim, b);
        assert!(health(&roster, b) <= 0.0);
        assert!(roster.get(b).is_some_and(|v| v.is_killed() && v.tag == Tag::Dead));
        assert!(roster.get(a).is_some_and(|v| v.target.is_none() && v.attack.is_none()));
        assert!(engine.cues_for(b).contains(&AnimationCue::Death));
        assert!(!engine.has_navigation(b));
    }

    #[test]
    fn non_lethal_strike_recovers_then_strikes_again() {
        let mut roster = AgentRoster::new();
        let mut engine = RecordingEngine::default();
        let config = LifecycleConfig::default();
        let a = insert(&mut roster, &blueprint("A", 0.0, 10.0, 4.0));
        let b = insert(&mut roster, &blueprint("B", 1.0, 10.0, 1.0));
        assert!(begin_attack(&mut roster, a, b).is_ok());

        advance_attack(&mut roster, &mut engine, a, 0.0, &config);
        advance_attack(&mut roster, &mut engine, a, 0.5, &config);
        assert!((health(&roster, b) - 6.0).abs() < f32::EPSILON);
        assert!(matches!(
            roster.get(a).and_then(|x| x.attack).map(|l| l.phase),
            Some(AttackPhase::Recovering { .. })
        ));

        // Still recovering.
        advance_attack(&mut roster, &mut engine, a, 0.75, &config);
        assert!((health(&roster, b) - 6.0).abs() < f32::EPSILON);

        // Recovery done: next wind-up starts, lands half a cycle later.
        advance_attack(&mut roster, &mut engine, a, 1.0, &config);
        advance_attack(&mut roster, &mut engine, a, 1.5, &config);
        assert!((health(&roster, b) - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn out_of_range_target_is_pursued() {
        let mut roster = AgentRoster::new();
        let mut engine = RecordingEngine::default();
        let config = LifecycleConfig::default();
        let a = insert(&mut roster, &blueprint("A", 0.0, 10.0, 4.0));
        let b = insert(&mut roster, &blueprint("B", 20.0, 10.0, 1.0));
        assert!(begin_attack(&mut roster, a, b).is_ok());

        advance_attack(&mut roster, &mut engine, a, 0.0, &config);
        assert_eq!(engine.moves, vec![(a, Vec3::new(20.0, 0.0, 0.0))]);
        assert!(matches!(
            roster.get(a).and_then(|x| x.attack).map(|l| l.phase),
            Some(AttackPhase::Seeking)
        ));
    }

    #[test]
    fn missing_navigation_skips_movement() {
        let mut roster = AgentRoster::new();
        let mut engine = RecordingEngine::default();
        let config = LifecycleConfig::default();
        let a = insert(&mut roster, &blueprint("A", 0.0, 10.0, 4.0));
        let b = insert(&mut roster, &blueprint("B", 20.0, 10.0, 1.0));
        engine.set_navigation(a, false);
        assert!(begin_attack(&mut roster, a, b).is_ok());

        assert_eq!(
            advance_attack(&mut roster, &mut engine, a, 0.0, &config),
            StrikeOutcome::Continuing
        );
        assert!(engine.moves.is_empty());
    }

    #[test]
    fn dead_target_terminates_and_clears() {
        let mut roster = AgentRoster::new();
        let mut engine = RecordingEngine::default();
        let config = LifecycleConfig::default();
        let a = insert(&mut roster, &blueprint("A", 0.0, 10.0, 4.0));
        let b = insert(&mut roster, &blueprint("B", 20.0, 10.0, 1.0));
        assert!(begin_attack(&mut roster, a, b).is_ok());
        roster.kill(b);

        assert_eq!(
            advance_attack(&mut roster, &mut engine, a, 0.0, &config),
            StrikeOutcome::Terminated(TerminationReason::TargetDefeated)
        );
        assert!(roster.get(a).is_some_and(|x| x.target.is_none()));
        assert_eq!(engine.cues_for(a), vec![AnimationCue::StrikeEnd]);
    }

    #[test]
    fn simultaneous_strikes_credit_one_kill() {
        let mut roster = AgentRoster::new();
        let mut engine = RecordingEngine::default();
        let config = LifecycleConfig::default();
        let a = insert(&mut roster, &blueprint("A", 0.0, 10.0, 15.0));
        let c = insert(&mut roster, &blueprint("C", 2.0, 10.0, 15.0));
        let b = insert(&mut roster, &blueprint("B", 1.0, 10.0, 1.0));
        assert!(begin_attack(&mut roster, a, b).is_ok());
        assert!(begin_attack(&mut roster, c, b).is_ok());

        for id in [a, c] {
            advance_attack(&mut roster, &mut engine, id, 0.0, &config);
        }
        let outcomes: Vec<_> = [a, c]
            .into_iter()
            .map(|id| advance_attack(&mut roster, &mut engine, id, 0.5, &config))
            .collect();

        let defeats = outcomes
            .iter()
            .filter(|o| matches!(o, StrikeOutcome::Defeated(_)))
            .count();
        assert_eq!(defeats, 1);
        assert!(matches!(outcomes.first(), Some(StrikeOutcome::Defeated(r)) if r.victor == a));
        assert_eq!(
            outcomes.get(1),
            Some(&StrikeOutcome::Terminated(TerminationReason::TargetDefeated))
        );
        // The second strike never landed.
        assert!((health(&roster, b) + 5.0).abs() < f32::EPSILON);
    }

    #[test]
    fn killed_attacker_terminates() {
        let mut roster = AgentRoster::new();
        let mut engine = RecordingEngine::default();
        let config = LifecycleConfig::default();
        let a = insert(&mut roster, &blueprint("A", 0.0, 10.0, 4.0));
        let b = insert(&mut roster, &blueprint("B", 1.0, 10.0, 1.0));
        assert!(begin_attack(&mut roster, a, b).is_ok());
        roster.kill(a);
        // kill() already drops the loop.
        assert_eq!(
            advance_attack(&mut roster, &mut engine, a, 0.0, &config),
            StrikeOutcome::Idle
        );
        assert_eq!(
            begin_attack(&mut roster, a, b),
            Err(AgentError::ActorDefeated(a))
        );
    }
}
