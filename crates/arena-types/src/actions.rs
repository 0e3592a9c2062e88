//! The action an agent chose, as parsed from decision-source text.
//!
//! Actions are ephemeral: they are produced by the grammar parser, dispatched
//! once by the controller, and never persisted.

use serde::{Deserialize, Serialize};

/// A parsed decision.
///
/// Targets are carried as display names because that is what the decision
/// source speaks. The controller resolves them to ids before acting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Send a chat message to another agent.
    Message {
        /// Display name of the recipient.
        target_name: String,
        /// Message text.
        body: String,
    },
    /// Pursue and attack another agent.
    Attack {
        /// Display name of the victim.
        target_name: String,
    },
    /// No recognized pattern, or the decision call failed.
    None,
}

impl Action {
    /// Short label for logging.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::Attack { .. } => "attack",
            Self::None => "none",
        }
    }

    /// Whether this is [`Action::None`].
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        assert_eq!(Action::None.label(), "none");
        assert_eq!(
            Action::Attack {
                target_name: "Bob".to_owned()
            }
            .label(),
            "attack"
        );
    }

    #[test]
    fn serializes_with_kind_tag() {
        let action = Action::Message {
            target_name: "Bob".to_owned(),
            body: "hi".to_owned(),
        };
        let json = serde_json::to_value(&action).unwrap_or_default();
        assert_eq!(json.get("kind").and_then(|v| v.as_str()), Some("message"));
    }
}
