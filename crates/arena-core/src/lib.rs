//! Clock, scheduling and decision plumbing for the combat arena.
//!
//! This crate owns the step cycle that drives the arena: it asks the
//! decision provider what each agent wants to do, parses the reply into an
//! action, and feeds actions, summaries and offspring back into the agent
//! logic from `arena-agents`.
//!
//! # Modules
//!
//! - [`clock`] -- Step counter and simulated time.
//! - [`config`] -- Configuration loading from `arena-config.yaml` into
//!   strongly-typed structs.
//! - [`controller`] -- Per-agent decision cooldown and action dispatch.
//! - [`decision`] -- [`DecisionProvider`] trait and the retrying
//!   [`DecisionClient`].
//! - [`nav`] -- [`FlatArena`], an obstacle-free world engine.
//! - [`parse`] -- The bracketed action grammar.
//! - [`prompt`] -- Prompt rendering with `minijinja`.
//! - [`runner`] -- The bounded real-time loop around [`Simulation`].
//! - [`tick`] -- The step cycle itself.
//! - [`world`] -- Read-only queries over the roster.
//!
//! [`DecisionProvider`]: decision::DecisionProvider
//! [`DecisionClient`]: decision::DecisionClient
//! [`FlatArena`]: nav::FlatArena
//! [`Simulation`]: tick::Simulation

pub mod clock;
pub mod config;
pub mod controller;
pub mod decision;
pub mod nav;
pub mod parse;
pub mod prompt;
pub mod runner;
pub mod tick;
pub mod world;
