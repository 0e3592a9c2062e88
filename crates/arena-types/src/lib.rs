//! Shared type definitions for the combat arena simulation.
//!
//! This crate is the single source of truth for data that crosses crate
//! boundaries: identifiers, geometry, parsed actions, chat records and stat
//! blocks. It carries no behavior beyond small conversions.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for agents and pending spawns
//! - [`geometry`] -- [`Vec3`] positions and movement math
//! - [`actions`] -- The [`Action`] grammar result
//! - [`chat`] -- [`ChatEntry`] records and their rendering
//! - [`stats`] -- [`AgentStats`], [`EvolutionTraits`], [`Tag`], [`AgentSnapshot`]

pub mod actions;
pub mod chat;
pub mod geometry;
pub mod ids;
pub mod stats;

// Re-export all public types at crate root for convenience.
pub use actions::Action;
pub use chat::{
    BROADCAST_TARGET, ChatEntry, ChatKind, SUMMARY_PLACEHOLDER, SYSTEM_SENDER,
};
pub use geometry::Vec3;
pub use ids::{AgentId, SpawnId};
pub use stats::{AgentSnapshot, AgentStats, EvolutionTraits, Tag};
