//! Per-agent decision scheduling and action dispatch.
//!
//! Each living agent owns an [`AgentController`]. The controller issues a
//! decision request when its cooldown expires, keeps at most one request
//! outstanding, and re-arms the cooldown at issue time so a slow provider
//! never shortens the interval. Parsed actions are applied through
//! [`dispatch_action`].

use arena_agents::{AgentError, AgentRoster, SummaryRequest, begin_attack, messaging};
use arena_types::{Action, AgentId};
use tracing::{debug, info};

use crate::world::WorldQuery;

/// Where an agent is in its decision cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecisionPhase {
    /// Waiting for the cooldown to expire.
    Idle,
    /// A request is in flight.
    Requesting {
        /// Simulated time the request was issued.
        issued_at: f64,
    },
}

/// Decision cooldown and in-flight tracking for one agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentController {
    next_decision_at: f64,
    phase: DecisionPhase,
}

impl AgentController {
    /// A controller whose first decision is due at `first_at`.
    pub const fn new(first_at: f64) -> Self {
        Self {
            next_decision_at: first_at,
            phase: DecisionPhase::Idle,
        }
    }

    /// Current phase.
    pub const fn phase(&self) -> DecisionPhase {
        self.phase
    }

    /// Simulated time the next request may be issued.
    pub const fn next_decision_at(&self) -> f64 {
        self.next_decision_at
    }

    /// Whether a new request should be issued at `now`.
    pub fn is_due(&self, now: f64) -> bool {
        matches!(self.phase, DecisionPhase::Idle) && now >= self.next_decision_at
    }

    /// Mark a request as issued at `now` and schedule the next one.
    pub fn issue(&mut self, now: f64, interval: f64) {
        self.phase = DecisionPhase::Requesting { issued_at: now };
        self.next_decision_at = now + interval;
    }

    /// The outstanding request finished, successfully or not.
    pub const fn complete(&mut self) {
        self.phase = DecisionPhase::Idle;
    }
}

/// Apply a parsed action for `agent`.
///
/// Returns the summarizations the action triggered. Failures are logged
/// and, where the agent should learn from them, remembered as facts.
pub fn dispatch_action(roster: &mut AgentRoster, agent: AgentId, action: &Action) -> Vec<SummaryRequest> {
    match action {
        Action::None => {
            debug!(agent_id = %agent, "no action");
            Vec::new()
        }
        Action::Message { target_name, body } => {
            match messaging::send(roster, agent, target_name, body) {
                Ok(delivery) => delivery.summaries,
                Err(e) => {
                    debug!(agent_id = %agent, error = %e, "message dropped");
                    Vec::new()
                }
            }
        }
        Action::Attack { target_name } => {
            dispatch_attack(roster, agent, target_name);
            Vec::new()
        }
    }
}

fn dispatch_attack(roster: &mut AgentRoster, agent: AgentId, target_name: &str) {
    let world = WorldQuery::new(roster);
    let resolved = world
        .find_agent_by_name(target_name)
        .map(|target| (target.id, world.distance(agent, target.id)))
        .map_err(AgentError::from);
    let result = resolved.and_then(|(target, distance)| {
        begin_attack(roster, agent, target)?;
        debug!(agent_id = %agent, target_name, ?distance, "attack started");
        Ok(())
    });
    let fact = match result {
        Ok(()) => return,
        Err(AgentError::TargetNotFound(_)) => {
            format!("There is no one named {target_name} to attack.")
        }
        Err(AgentError::TargetAlreadyDead(_)) => format!("{target_name} is already dead."),
        Err(AgentError::SelfTarget(_)) => String::from("You cannot attack yourself."),
        Err(e) => {
            debug!(agent_id = %agent, target_name, error = %e, "attack not started");
            return;
        }
    };
    info!(agent_id = %agent, target_name, fact = %fact, "attack rejected");
    if let Some(a) = roster.get_mut(agent) {
        a.remember_fact(fact);
    }
}
