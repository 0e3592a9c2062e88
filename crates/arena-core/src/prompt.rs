//! Prompt assembly via `minijinja`.
//!
//! Templates ship inside the crate and can be overridden from a directory
//! so operators can tune agent behavior without recompiling. Rendering is
//! pure: identical agent and world state produce identical text.
//!
//! | Template       | Used for |
//! |----------------|----------|
//! | `context.j2`   | An agent's view of itself and the arena |
//! | `actions.j2`   | The action grammar reminder appended to instructions |
//! | `summary.j2`   | Chat history summarization |
//! | `name.j2`      | Offspring name generation |
//! | `strategy.j2`  | Offspring strategy mutation |

use std::path::Path;

use arena_agents::{Agent, SpawnRequest};
use arena_types::{AgentSnapshot, AgentStats, ChatEntry};
use minijinja::Environment;
use serde::Serialize;

use crate::world::WorldQuery;

const TEMPLATES: [(&str, &str); 5] = [
    ("context.j2", include_str!("../templates/context.j2")),
    ("actions.j2", include_str!("../templates/actions.j2")),
    ("summary.j2", include_str!("../templates/summary.j2")),
    ("name.j2", include_str!("../templates/name.j2")),
    ("strategy.j2", include_str!("../templates/strategy.j2")),
];

const SUMMARY_SYSTEM: &str = "You condense chat logs into short, factual summaries.";
const NAME_SYSTEM: &str = "You name fighters. Answer with a single name and nothing else.";
const STRATEGY_SYSTEM: &str =
    "You write short strategies for fighters in an arena. Answer with the strategy only.";

/// Errors from template loading and rendering.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// A template override could not be read.
    #[error("failed to read template {path}: {source}")]
    Load {
        /// Path that failed.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A template failed to compile or render.
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),
}

/// Everything an agent is told about itself and the arena.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextBlock {
    /// Own name.
    pub name: String,
    /// Own faction.
    pub faction: Option<String>,
    /// Own generation.
    pub generation: u32,
    /// Own position, formatted.
    pub position: String,
    /// Own current health.
    pub health: f32,
    /// Own stats.
    pub stats: AgentStats,
    /// Name of the current target.
    pub target: Option<String>,
    /// Names of agents attacking this one.
    pub attackers: Vec<String>,
    /// Living agents in view, nearest first.
    pub visible: Vec<AgentSnapshot>,
    /// Whether full stats of visible agents are shown.
    pub reveal_stats: bool,
    /// Visible agents sharing this agent's faction. Empty without a faction.
    pub allies: Vec<String>,
    /// Visible agents of other or no factions. Empty without a faction.
    pub enemies: Vec<String>,
    /// Persistent facts, oldest first.
    pub facts: Vec<String>,
    /// Rendered chat history lines, oldest first.
    pub chat: Vec<String>,
}

/// A rendered decision request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionRequest {
    /// Persona text, sent as the system message.
    pub strategy_text: String,
    /// Instructions plus the action grammar.
    pub instruction_text: String,
    /// Rendered context.
    pub context_text: String,
}

/// System text plus ordered user messages, ready for a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPayload {
    /// System message.
    pub system: String,
    /// User messages in order.
    pub user: Vec<String>,
}

impl DecisionRequest {
    /// Context first, then instructions.
    pub fn into_payload(self) -> PromptPayload {
        PromptPayload {
            system: self.strategy_text,
            user: vec![self.context_text, self.instruction_text],
        }
    }
}

#[derive(Serialize)]
struct SummaryView<'a> {
    name: &'a str,
    entries: Vec<String>,
    visible: Vec<String>,
}

#[derive(Serialize)]
struct NameView<'a> {
    names: &'a [String],
}

#[derive(Serialize)]
struct StrategyView<'a> {
    parent: &'a str,
    defeated: &'a str,
    strategy: &'a str,
    instructions: &'a str,
    actions: &'a [String],
}

/// Builds prompt payloads from agent and world state.
#[derive(Debug)]
pub struct PromptAssembler {
    env: Environment<'static>,
    reveal_stats: bool,
}

impl PromptAssembler {
    /// Create an assembler with the built-in templates.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Template`] if a built-in template fails to
    /// compile.
    pub fn new(reveal_stats: bool) -> Result<Self, PromptError> {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        Ok(Self { env, reveal_stats })
    }

    /// Create an assembler, replacing built-in templates with any file of
    /// the same name found in `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Load`] if an override exists but cannot be
    /// read, or [`PromptError::Template`] if a template fails to compile.
    pub fn with_overrides(reveal_stats: bool, dir: &Path) -> Result<Self, PromptError> {
        let mut assembler = Self::new(reveal_stats)?;
        for (name, _) in TEMPLATES {
            let path = dir.join(name);
            if !path.is_file() {
                continue;
            }
            let source = std::fs::read_to_string(&path).map_err(|source| PromptError::Load {
                path: path.display().to_string(),
                source,
            })?;
            assembler.env.add_template_owned(name, source)?;
            tracing::info!(template = name, path = %path.display(), "template override loaded");
        }
        Ok(assembler)
    }

    /// Gather what `agent` knows into a [`ContextBlock`].
    pub fn build_context(&self, agent: &Agent, world: &WorldQuery<'_>) -> ContextBlock {
        let visible = world.visible_agents(agent.id);
        // Without a faction nobody is an ally.
        let (allies, enemies): (Vec<&AgentSnapshot>, Vec<&AgentSnapshot>) =
            visible.iter().partition(|s| {
                agent.faction.is_some() && s.faction.as_ref() == agent.faction.as_ref()
            });
        let allies = allies.into_iter().map(|s| s.name.clone()).collect();
        let enemies = enemies.into_iter().map(|s| s.name.clone()).collect();

        ContextBlock {
            name: agent.name.clone(),
            faction: agent.faction.clone(),
            generation: agent.generation,
            position: agent.position.to_string(),
            health: agent.health,
            stats: world.self_stats(agent.id).unwrap_or(agent.stats),
            target: world.target_name(agent),
            attackers: world
                .attackers_of(agent.id)
                .into_iter()
                .map(|a| a.name.clone())
                .collect(),
            visible,
            reveal_stats: self.reveal_stats,
            allies,
            enemies,
            facts: agent.facts().to_vec(),
            chat: agent.chat.entries().iter().map(ChatEntry::render).collect(),
        }
    }

    /// Render the decision request for `agent`.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Template`] if rendering fails.
    pub fn build_request(
        &self,
        agent: &Agent,
        context: &ContextBlock,
    ) -> Result<DecisionRequest, PromptError> {
        let context_text = self.env.get_template("context.j2")?.render(context)?;
        let grammar = self.env.get_template("actions.j2")?.render(())?;
        let instruction_text = if agent.instructions.trim().is_empty() {
            grammar
        } else {
            format!("{}\n\n{grammar}", agent.instructions.trim_end())
        };
        Ok(DecisionRequest {
            strategy_text: agent.strategy.clone(),
            instruction_text,
            context_text,
        })
    }

    /// Payload asking for a summary of `entries` on behalf of `agent_name`.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Template`] if rendering fails.
    pub fn summary_payload(
        &self,
        agent_name: &str,
        entries: &[ChatEntry],
        visible: &[String],
    ) -> Result<PromptPayload, PromptError> {
        let view = SummaryView {
            name: agent_name,
            entries: entries.iter().map(ChatEntry::render).collect(),
            visible: visible.to_vec(),
        };
        Ok(PromptPayload {
            system: SUMMARY_SYSTEM.to_owned(),
            user: vec![self.env.get_template("summary.j2")?.render(view)?],
        })
    }

    /// Payload asking for a new name distinct from `names`.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Template`] if rendering fails.
    pub fn name_payload(&self, names: &[String]) -> Result<PromptPayload, PromptError> {
        Ok(PromptPayload {
            system: NAME_SYSTEM.to_owned(),
            user: vec![self.env.get_template("name.j2")?.render(NameView { names })?],
        })
    }

    /// Payload asking for a mutated strategy seeded with the parent's
    /// lineage.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Template`] if rendering fails.
    pub fn strategy_payload(&self, request: &SpawnRequest) -> Result<PromptPayload, PromptError> {
        let view = StrategyView {
            parent: &request.parent_name,
            defeated: &request.defeated_name,
            strategy: &request.parent_strategy,
            instructions: &request.parent_instructions,
            actions: &request.parent_actions,
        };
        Ok(PromptPayload {
            system: STRATEGY_SYSTEM.to_owned(),
            user: vec![self.env.get_template("strategy.j2")?.render(view)?],
        })
    }
}

#[cfg(test)]
mod tests {
    use arena_agents::{AgentBlueprint, AgentRoster, begin_attack};
    use arena_types::{AgentId, EvolutionTraits, Vec3};

    use super::*;

    fn blueprint(name: &str, faction: Option<&str>, x: f32) -> AgentBlueprint {
        AgentBlueprint {
            name: name.to_owned(),
            faction: faction.map(str::to_owned),
            position: Vec3::new(x, 0.0, 0.0),
            stats: AgentStats::default(),
            evolution: EvolutionTraits::default(),
            strategy: String::from("Be cunning."),
            instructions: String::from("Survive."),
        }
    }

    fn insert(roster: &mut AgentRoster, bp: &AgentBlueprint) -> AgentId {
        roster
            .insert(Agent::from_blueprint(bp, 1000, 10))
            .unwrap_or_default()
    }

    fn assembler(reveal: bool) -> PromptAssembler {
        match PromptAssembler::new(reveal) {
            Ok(a) => a,
            Err(e) => panic!("built-in templates must compile: {e}"),
        }
    }

    #[test]
    fn context_lists_visible_and_attackers() {
        let mut roster = AgentRoster::new();
        let me = insert(&mut roster, &blueprint("Alice", None, 0.0));
        let bob = insert(&mut roster, &blueprint("Bob", None, 3.0));
        assert!(begin_attack(&mut roster, bob, me).is_ok());

        let world = WorldQuery::new(&roster);
        let assembler = assembler(true);
        let Some(agent) = roster.get(me) else {
            panic!("agent missing");
        };
        let context = assembler.build_context(agent, &world);
        assert_eq!(context.attackers, vec![String::from("Bob")]);
        assert_eq!(context.visible.len(), 1);
        assert!(context.allies.is_empty());
        assert_eq!(context.enemies, vec![String::from("Bob")]);

        let request = assembler.build_request(agent, &context);
        let Ok(request) = request else {
            panic!("render failed: {request:?}");
        };
        assert_eq!(request.strategy_text, "Be cunning.");
        assert!(request.context_text.contains("Bob"));
        assert!(request.context_text.contains("Attackers: Bob."));
        assert!(request.context_text.contains("damage 10"));
        assert!(request.instruction_text.starts_with("Survive."));
        assert!(request.instruction_text.contains("[attack <name>]"));
    }

    #[test]
    fn hidden_stats_are_not_rendered() {
        let mut roster = AgentRoster::new();
        let me = insert(&mut roster, &blueprint("Alice", None, 0.0));
        insert(&mut roster, &blueprint("Bob", None, 3.0));
        let world = WorldQuery::new(&roster);
        let assembler = assembler(false);
        let Some(agent) = roster.get(me) else {
            panic!("agent missing");
        };
        let context = assembler.build_context(agent, &world);
        let text = assembler
            .build_request(agent, &context)
            .map(|r| r.context_text)
            .unwrap_or_default();
        assert!(text.contains("Bob"));
        assert!(!text.contains("damage 10"));
    }

    #[test]
    fn faction_splits_allies_and_enemies() {
        let mut roster = AgentRoster::new();
        let me = insert(&mut roster, &blueprint("Alice", Some("Red"), 0.0));
        insert(&mut roster, &blueprint("Rita", Some("Red"), 1.0));
        insert(&mut roster, &blueprint("Bob", Some("Blue"), 2.0));
        insert(&mut roster, &blueprint("Nomad", None, 3.0));

        let world = WorldQuery::new(&roster);
        let Some(agent) = roster.get(me) else {
            panic!("agent missing");
        };
        let context = assembler(true).build_context(agent, &world);
        assert_eq!(context.allies, vec![String::from("Rita")]);
        assert_eq!(
            context.enemies,
            vec![String::from("Bob"), String::from("Nomad")]
        );
    }

    #[test]
    fn factionless_agent_sees_everyone_as_enemy() {
        let mut roster = AgentRoster::new();
        let me = insert(&mut roster, &blueprint("Alice", None, 0.0));
        insert(&mut roster, &blueprint("Rita", Some("Red"), 1.0));
        insert(&mut roster, &blueprint("Nomad", None, 2.0));

        let world = WorldQuery::new(&roster);
        let assembler = assembler(true);
        let Some(agent) = roster.get(me) else {
            panic!("agent missing");
        };
        let context = assembler.build_context(agent, &world);
        assert!(context.allies.is_empty());
        assert_eq!(
            context.enemies,
            vec![String::from("Rita"), String::from("Nomad")]
        );

        let text = assembler
            .build_request(agent, &context)
            .map(|r| r.context_text)
            .unwrap_or_default();
        assert!(text.contains("Allies: none."));
        assert!(text.contains("Enemies: Rita, Nomad."));
    }

    #[test]
    fn rendering_is_deterministic() {
        let mut roster = AgentRoster::new();
        let me = insert(&mut roster, &blueprint("Alice", None, 0.0));
        insert(&mut roster, &blueprint("Bob", None, 3.0));
        let world = WorldQuery::new(&roster);
        let assembler = assembler(true);
        let Some(agent) = roster.get(me) else {
            panic!("agent missing");
        };
        let first = assembler.build_request(agent, &assembler.build_context(agent, &world));
        let second = assembler.build_request(agent, &assembler.build_context(agent, &world));
        assert_eq!(first.ok(), second.ok());
    }

    #[test]
    fn name_payload_lists_existing_names() {
        let names = vec![String::from("Alice"), String::from("Bob")];
        let payload = assembler(true).name_payload(&names);
        let Ok(payload) = payload else {
            panic!("render failed");
        };
        let text = payload.user.concat();
        assert!(text.contains("- Alice") && text.contains("- Bob"));
    }

    #[test]
    fn overrides_replace_builtins() {
        let dir = std::env::temp_dir().join(format!(
            "arena_prompt_overrides_{}_{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        std::fs::create_dir_all(&dir).ok();
        std::fs::write(dir.join("actions.j2"), "CUSTOM GRAMMAR").ok();

        let assembler = PromptAssembler::with_overrides(true, &dir);
        let Ok(assembler) = assembler else {
            panic!("override load failed");
        };
        let mut roster = AgentRoster::new();
        let me = insert(&mut roster, &blueprint("Alice", None, 0.0));
        let world = WorldQuery::new(&roster);
        let Some(agent) = roster.get(me) else {
            panic!("agent missing");
        };
        let context = assembler.build_context(agent, &world);
        let text = assembler
            .build_request(agent, &context)
            .map(|r| r.instruction_text)
            .unwrap_or_default();
        assert!(text.ends_with("CUSTOM GRAMMAR"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
