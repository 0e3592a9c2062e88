//! Chat records exchanged between agents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sender name used for system-authored broadcasts.
pub const SYSTEM_SENDER: &str = "System";

/// Target name used for broadcasts addressed to everyone.
pub const BROADCAST_TARGET: &str = "All";

/// Placeholder text of a summary entry whose summarization has not
/// produced a result (yet, or ever).
pub const SUMMARY_PLACEHOLDER: &str = "[SUMMARY OF PREVIOUS CONVERSATIONS]";

/// What kind of record a [`ChatEntry`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    /// Agent-to-agent message.
    Direct,
    /// System-authored broadcast.
    Broadcast,
    /// Lossy summary replacing everything that came before it.
    Summary,
}

/// One timestamped line of an agent's chat history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    /// Wall-clock time the entry was recorded.
    pub sent_at: DateTime<Utc>,
    /// Display name of the author.
    pub sender: String,
    /// Display name of the addressee.
    pub target: String,
    /// Text of the message or summary.
    pub body: String,
    /// Record kind.
    pub kind: ChatKind,
}

impl ChatEntry {
    /// A direct message from `sender` to `target`.
    pub fn direct(sender: &str, target: &str, body: &str) -> Self {
        Self {
            sent_at: Utc::now(),
            sender: sender.to_owned(),
            target: target.to_owned(),
            body: body.to_owned(),
            kind: ChatKind::Direct,
        }
    }

    /// A system broadcast to all agents.
    pub fn broadcast(body: &str) -> Self {
        Self {
            sent_at: Utc::now(),
            sender: SYSTEM_SENDER.to_owned(),
            target: BROADCAST_TARGET.to_owned(),
            body: body.to_owned(),
            kind: ChatKind::Broadcast,
        }
    }

    /// A summary entry holding the placeholder text.
    pub fn pending_summary() -> Self {
        Self {
            sent_at: Utc::now(),
            sender: SYSTEM_SENDER.to_owned(),
            target: String::new(),
            body: SUMMARY_PLACEHOLDER.to_owned(),
            kind: ChatKind::Summary,
        }
    }

    /// Render the entry as a single prompt line.
    pub fn render(&self) -> String {
        match self.kind {
            ChatKind::Summary => format!("(Summary) {}", self.body),
            ChatKind::Direct | ChatKind::Broadcast => format!(
                "[{}] {} -> {}: {}",
                self.sent_at.format("%H:%M:%S"),
                self.sender,
                self.target,
                self.body
            ),
        }
    }

    /// Length of the rendered line in characters, including its newline.
    pub fn rendered_len(&self) -> usize {
        self.render().chars().count().saturating_add(1)
    }
}
