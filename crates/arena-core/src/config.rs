//! Configuration loading and typed config structures for the arena.
//!
//! The canonical configuration lives in `arena-config.yaml` at the project
//! root. This module defines strongly-typed structs that mirror the YAML
//! structure, and provides a loader that reads and validates the file.
//! Every field has a default, so a file only needs a `roster`.

use std::collections::BTreeSet;
use std::path::Path;

use arena_agents::{AgentBlueprint, LifecycleConfig};
use arena_types::AgentStats;
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but breaks a rule.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `arena-config.yaml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// World-level settings (seed, timing, bounds).
    #[serde(default)]
    pub world: WorldConfig,

    /// Per-agent timing and memory settings.
    #[serde(default)]
    pub agents: AgentsConfig,

    /// Reproduction parameters.
    #[serde(default)]
    pub evolution: EvolutionConfig,

    /// Decision source parameters.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Seed agents present at start.
    #[serde(default)]
    pub roster: Vec<AgentBlueprint>,

    /// Template every offspring is copied from.
    #[serde(default = "default_template")]
    pub template: AgentBlueprint,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            world: WorldConfig::default(),
            agents: AgentsConfig::default(),
            evolution: EvolutionConfig::default(),
            llm: LlmConfig::default(),
            roster: Vec::new(),
            template: default_template(),
        }
    }
}

impl SimulationConfig {
    /// Load and validate configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the rules serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first broken rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.world.step_seconds <= 0.0 {
            return Err(invalid("world.step_seconds must be positive"));
        }
        if self.world.half_extent <= 0.0 {
            return Err(invalid("world.half_extent must be positive"));
        }
        if self.agents.decision_interval_secs <= 0.0 {
            return Err(invalid("agents.decision_interval_secs must be positive"));
        }
        if self.roster.is_empty() {
            return Err(invalid("roster must contain at least one agent"));
        }
        let mut names = BTreeSet::new();
        for blueprint in &self.roster {
            if blueprint.name.trim().is_empty() {
                return Err(invalid("roster names must not be empty"));
            }
            if !names.insert(blueprint.name.as_str()) {
                return Err(ConfigError::Invalid {
                    reason: format!("duplicate roster name: {}", blueprint.name),
                });
            }
            validate_stats(&blueprint.name, &blueprint.stats)?;
        }
        validate_stats(&self.template.name, &self.template.stats)?;
        Ok(())
    }

    /// Lifecycle parameters for the agent logic layer.
    pub const fn lifecycle(&self) -> LifecycleConfig {
        LifecycleConfig {
            chat_char_budget: self.agents.chat_char_budget,
            removal_delay_secs: self.agents.removal_delay_secs,
            action_history_limit: self.agents.action_history_limit,
            spawn_radius: self.evolution.spawn_radius,
            spawn_search_radius: self.evolution.spawn_search_radius,
            name_retry_limit: self.evolution.name_retry_limit,
        }
    }
}

fn invalid(reason: &str) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.to_owned(),
    }
}

fn validate_stats(name: &str, stats: &AgentStats) -> Result<(), ConfigError> {
    if stats.max_health <= 0.0 || stats.attack_speed <= 0.0 || stats.attack_range < 0.0 {
        return Err(ConfigError::Invalid {
            reason: format!(
                "{name}: max_health and attack_speed must be positive, attack_range non-negative"
            ),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// World-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorldConfig {
    /// Human-readable simulation name.
    #[serde(default = "default_world_name")]
    pub name: String,

    /// Random seed for spawn offsets and stat mutation.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Real-time milliseconds between steps.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Simulated seconds advanced per step.
    #[serde(default = "default_step_seconds")]
    pub step_seconds: f64,

    /// Half the side length of the square arena floor.
    #[serde(default = "default_half_extent")]
    pub half_extent: f32,

    /// Maximum number of steps (0 = unlimited).
    #[serde(default)]
    pub max_ticks: u64,

    /// Maximum wall-clock seconds (0 = unlimited).
    #[serde(default)]
    pub max_real_time_seconds: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: default_world_name(),
            seed: default_seed(),
            tick_interval_ms: default_tick_interval_ms(),
            step_seconds: default_step_seconds(),
            half_extent: default_half_extent(),
            max_ticks: 0,
            max_real_time_seconds: 0,
        }
    }
}

/// Per-agent timing and memory settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentsConfig {
    /// Simulated seconds between two decision requests of one agent.
    #[serde(default = "default_decision_interval_secs")]
    pub decision_interval_secs: f64,

    /// Chat history character budget.
    #[serde(default = "default_chat_char_budget")]
    pub chat_char_budget: usize,

    /// Simulated seconds between a kill and removal.
    #[serde(default = "default_removal_delay_secs")]
    pub removal_delay_secs: f64,

    /// Number of recent actions kept per agent.
    #[serde(default = "default_action_history_limit")]
    pub action_history_limit: usize,

    /// Whether prompts include full stats of visible agents.
    #[serde(default = "default_true")]
    pub reveal_stats: bool,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            decision_interval_secs: default_decision_interval_secs(),
            chat_char_budget: default_chat_char_budget(),
            removal_delay_secs: default_removal_delay_secs(),
            action_history_limit: default_action_history_limit(),
            reveal_stats: true,
        }
    }
}

/// Reproduction parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EvolutionConfig {
    /// Radius of the random spawn offset around the victor.
    #[serde(default = "default_spawn_radius")]
    pub spawn_radius: f32,

    /// Search radius for valid ground around the sampled point.
    #[serde(default = "default_spawn_radius")]
    pub spawn_search_radius: f32,

    /// Re-requests of a generated name already held by a living agent.
    #[serde(default = "default_name_retry_limit")]
    pub name_retry_limit: u32,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            spawn_radius: default_spawn_radius(),
            spawn_search_radius: default_spawn_radius(),
            name_retry_limit: default_name_retry_limit(),
        }
    }
}

/// Decision source parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LlmConfig {
    /// Model identifier sent with every request. The runner refuses to
    /// start while it is empty.
    #[serde(default)]
    pub model: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum retry attempts for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-attempt timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Linear backoff step between retries in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            temperature: default_temperature(),
            max_retries: default_max_retries(),
            request_timeout_ms: default_request_timeout_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_world_name() -> String {
    "Arena".to_owned()
}

const fn default_seed() -> u64 {
    42
}

const fn default_tick_interval_ms() -> u64 {
    100
}

const fn default_step_seconds() -> f64 {
    0.1
}

const fn default_half_extent() -> f32 {
    100.0
}

const fn default_decision_interval_secs() -> f64 {
    5.0
}

const fn default_chat_char_budget() -> usize {
    1000
}

const fn default_removal_delay_secs() -> f64 {
    30.0
}

const fn default_action_history_limit() -> usize {
    50
}

const fn default_true() -> bool {
    true
}

const fn default_spawn_radius() -> f32 {
    50.0
}

const fn default_name_retry_limit() -> u32 {
    2
}

const fn default_temperature() -> f32 {
    0.8
}

const fn default_max_retries() -> u32 {
    2
}

const fn default_request_timeout_ms() -> u64 {
    30_000
}

const fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_template() -> AgentBlueprint {
    AgentBlueprint {
        name: "Offspring".to_owned(),
        faction: None,
        position: arena_types::Vec3::ZERO,
        stats: AgentStats::default(),
        evolution: arena_types::EvolutionTraits::default(),
        strategy: String::new(),
        instructions: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = "roster:\n  - name: Alice\n  - name: Bob\n";

    #[test]
    fn minimal_file_gets_defaults() {
        let config = SimulationConfig::parse(MINIMAL);
        let Ok(config) = config else {
            panic!("parse failed: {config:?}");
        };
        assert_eq!(config.roster.len(), 2);
        assert_eq!(config.world.seed, 42);
        assert_eq!(config.agents.chat_char_budget, 1000);
        assert!(config.agents.reveal_stats);
        assert_eq!(config.evolution.name_retry_limit, 2);
        assert_eq!(config.template.name, "Offspring");
        assert_eq!(config.lifecycle(), LifecycleConfig::default());
    }

    #[test]
    fn full_sections_parse() {
        let yaml = r"
world:
  seed: 7
  step_seconds: 0.5
  max_ticks: 100
agents:
  decision_interval_secs: 2.0
  reveal_stats: false
evolution:
  spawn_radius: 10.0
llm:
  model: test-model
  max_retries: 0
roster:
  - name: Alice
    faction: Red
    position: { x: 1.0, y: 0.0, z: 2.0 }
    stats:
      max_health: 10.0
      attack_damage: 15.0
      attack_speed: 1.0
      attack_range: 2.0
      movement_speed: 3.5
    strategy: Be bold.
template:
  name: Spawn
  instructions: Fight.
";
        let config = SimulationConfig::parse(yaml);
        let Ok(config) = config else {
            panic!("parse failed: {config:?}");
        };
        assert_eq!(config.world.seed, 7);
        assert_eq!(config.world.max_ticks, 100);
        assert!(!config.agents.reveal_stats);
        assert_eq!(config.llm.model, "test-model");
        assert_eq!(config.llm.max_retries, 0);
        let alice = config.roster.first();
        assert_eq!(alice.and_then(|a| a.faction.as_deref()), Some("Red"));
        assert_eq!(config.template.instructions, "Fight.");
        assert!((config.lifecycle().spawn_radius - 10.0).abs() < f32::EPSILON);
    }

    #[test]
    fn empty_roster_rejected() {
        assert!(matches!(
            SimulationConfig::parse("world:\n  seed: 1\n"),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn duplicate_roster_names_rejected() {
        let yaml = "roster:\n  - name: Alice\n  - name: Alice\n";
        assert!(matches!(
            SimulationConfig::parse(yaml),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn non_positive_cooldown_rejected() {
        let yaml = "agents:\n  decision_interval_secs: 0.0\nroster:\n  - name: A\n";
        assert!(matches!(
            SimulationConfig::parse(yaml),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn malformed_yaml_is_yaml_error() {
        assert!(matches!(
            SimulationConfig::parse("roster: [unterminated"),
            Err(ConfigError::Yaml { .. })
        ));
    }

    #[test]
    fn bundled_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../arena-config.yaml");
        let Ok(config) = SimulationConfig::from_file(&path) else {
            panic!("bundled arena-config.yaml failed to load");
        };
        assert_eq!(config.roster.len(), 3);
        assert!(!config.llm.model.is_empty());
        assert!(config.roster.iter().any(|b| b.stats.regen));
    }
}
