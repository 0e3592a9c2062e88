//! Agent state, combat, messaging and reproduction for the combat arena.
//!
//! This crate contains the logic layer for agents -- everything that operates
//! on agent state without touching I/O or the decision source. It sits
//! between `arena-types` (which defines the shared data structures) and
//! `arena-core` (which schedules agents and talks to the decision provider).
//!
//! # Modules
//!
//! - [`agent`] -- Agent records, the [`AgentRoster`] and the [`NameRegistry`]
//! - [`combat`] -- The attack state machine ([`AttackLoop`], [`advance_attack`])
//! - [`config`] -- Tunable lifecycle parameters ([`LifecycleConfig`])
//! - [`death`] -- Defeat handling and delayed removal ([`DefeatRecord`])
//! - [`engine`] -- The [`WorldEngine`] navigation and animation capability
//! - [`error`] -- Error types for all agent operations ([`AgentError`])
//! - [`messaging`] -- Chat histories, direct messages and broadcasts
//! - [`reproduction`] -- Offspring planning and Gaussian stat inheritance

pub mod agent;
pub mod combat;
pub mod config;
pub mod death;
pub mod engine;
pub mod error;
pub mod messaging;
pub mod reproduction;

// Re-export primary types at crate root for convenience.
pub use agent::{Agent, AgentBlueprint, AgentRoster, NameRegistry};
pub use combat::{
    AttackLoop, AttackPhase, StrikeOutcome, TerminationReason, advance_attack, begin_attack,
};
pub use config::LifecycleConfig;
pub use death::{DefeatRecord, remove_expired, resolve_defeat};
pub use engine::{AnimationCue, WorldEngine};
pub use error::AgentError;
pub use messaging::{AppendOutcome, ChatHistory, Delivery, SummaryRequest};
pub use reproduction::SpawnRequest;
