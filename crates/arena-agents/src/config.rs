//! Tunable parameters for the agent lifecycle.
//!
//! The [`LifecycleConfig`] struct bundles every tunable so that callers
//! (the scheduler, tests) can override defaults. `arena-core` builds it
//! from `arena-config.yaml` at simulation start.

/// Configuration for combat, messaging and reproduction mechanics.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleConfig {
    /// Character budget of one agent's chat history (default: 1000).
    ///
    /// An append that pushes the rendered history past this budget
    /// collapses it into a summary entry plus the triggering record.
    pub chat_char_budget: usize,

    /// Simulated seconds between a kill and the victim's removal from
    /// the live set (default: 30).
    pub removal_delay_secs: f64,

    /// Number of most recent actions kept per agent (default: 50).
    pub action_history_limit: usize,

    /// Radius of the random offset around the victor used to pick an
    /// offspring spawn point (default: 50).
    pub spawn_radius: f32,

    /// Maximum distance the engine may search for valid ground around the
    /// sampled spawn point (default: 50).
    pub spawn_search_radius: f32,

    /// How many times a generated offspring name that is already held by
    /// a living agent is re-requested before falling back (default: 2).
    pub name_retry_limit: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            chat_char_budget: 1000,
            removal_delay_secs: 30.0,
            action_history_limit: 50,
            spawn_radius: 50.0,
            spawn_search_radius: 50.0,
            name_retry_limit: 2,
        }
    }
}
