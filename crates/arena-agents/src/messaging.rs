//! Point-to-point and broadcast chat with bounded history.
//!
//! Each agent keeps a [`ChatHistory`] capped by a character budget. When an
//! append pushes the rendered history past the budget, everything except
//! the new entry collapses into a single summary entry holding the
//! placeholder text. The caller receives a [`SummaryRequest`] carrying the
//! collapsed entries and is expected to run a summarization in the
//! background and hand the result back through [`apply_summary`].

use arena_types::{AgentId, ChatEntry, ChatKind};

use crate::agent::AgentRoster;
use crate::error::AgentError;

// ---------------------------------------------------------------------------
// ChatHistory
// ---------------------------------------------------------------------------

/// Ordered chat records of one agent.
#[derive(Debug, Clone)]
pub struct ChatHistory {
    entries: Vec<ChatEntry>,
    char_budget: usize,
    summary_in_flight: bool,
}

/// What happened on an append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The entry fit within the budget.
    Appended,
    /// The history was collapsed to `[summary, entry]`.
    Collapsed {
        /// Entries that were replaced, oldest first.
        replaced: Vec<ChatEntry>,
        /// Whether the caller should start a summarization. `false` when
        /// one is already running for this history.
        start_summary: bool,
    },
}

impl ChatHistory {
    /// Create an empty history with the given character budget.
    pub const fn new(char_budget: usize) -> Self {
        Self {
            entries: Vec::new(),
            char_budget,
            summary_in_flight: false,
        }
    }

    /// Entries, oldest first.
    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the history has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total rendered length in characters.
    pub fn rendered_len(&self) -> usize {
        self.entries
            .iter()
            .fold(0_usize, |acc, e| acc.saturating_add(e.rendered_len()))
    }

    /// Every entry rendered on its own line.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(ChatEntry::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Whether a summarization for this history is running.
    pub const fn summary_in_flight(&self) -> bool {
        self.summary_in_flight
    }

    /// Append an entry, collapsing the history if it overflows the budget.
    pub fn append(&mut self, entry: ChatEntry) -> AppendOutcome {
        self.entries.push(entry);
        if self.rendered_len() <= self.char_budget {
            return AppendOutcome::Appended;
        }

        let mut replaced = std::mem::take(&mut self.entries);
        let trigger = replaced.pop();
        self.entries.push(ChatEntry::pending_summary());
        self.entries.extend(trigger);

        let start_summary = !self.summary_in_flight;
        self.summary_in_flight = true;
        AppendOutcome::Collapsed {
            replaced,
            start_summary,
        }
    }

    /// Write a finished summary into the current summary entry and clear
    /// the in-flight flag. Returns `false` if the history holds no
    /// summary entry (it was cleared in the meantime).
    pub fn apply_summary(&mut self, text: &str) -> bool {
        self.summary_in_flight = false;
        let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.kind == ChatKind::Summary)
        else {
            return false;
        };
        text.clone_into(&mut entry.body);
        true
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.summary_in_flight = false;
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// A history collapse that needs a background summarization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRequest {
    /// Agent whose history collapsed.
    pub agent: AgentId,
    /// Collapsed entries to summarize.
    pub entries: Vec<ChatEntry>,
}

/// Result of a successful [`send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Recipient.
    pub recipient: AgentId,
    /// The recorded message.
    pub record: ChatEntry,
    /// Summarizations to start, sender's first.
    pub summaries: Vec<SummaryRequest>,
}

/// Append `record` to one agent's history.
fn append_to(roster: &mut AgentRoster, agent: AgentId, record: ChatEntry) -> Option<SummaryRequest> {
    let target = roster.get_mut(agent)?;
    match target.chat.append(record) {
        AppendOutcome::Appended => None,
        AppendOutcome::Collapsed {
            replaced,
            start_summary,
        } => {
            tracing::debug!(
                agent_id = %agent,
                replaced = replaced.len(),
                start_summary,
                "chat history collapsed"
            );
            start_summary.then_some(SummaryRequest {
                agent,
                entries: replaced,
            })
        }
    }
}

/// Send a direct message from `sender` to the agent named `target_name`.
///
/// A missing or dead recipient is recorded as a persistent fact on the
/// sender and returned as an error; nothing is appended in that case.
pub fn send(
    roster: &mut AgentRoster,
    sender: AgentId,
    target_name: &str,
    body: &str,
) -> Result<Delivery, AgentError> {
    let sender_name = match roster.get(sender) {
        Some(agent) if agent.is_alive() => agent.name.clone(),
        Some(_) => return Err(AgentError::ActorDefeated(sender)),
        None => return Err(AgentError::AgentNotFound(sender)),
    };

    let recipient = match roster.resolve_name(target_name) {
        Ok(id) => id,
        Err(err) => {
            let fact = match &err {
                AgentError::TargetAlreadyDead(name) => {
                    format!("{name} is dead; messages to {name} go nowhere.")
                }
                _ => format!("There is no one named {target_name} to talk to."),
            };
            if let Some(agent) = roster.get_mut(sender) {
                agent.remember_fact(fact);
            }
            tracing::debug!(
                agent_id = %sender,
                target_name,
                error = %err,
                "message not sent"
            );
            return Err(err);
        }
    };

    let record = ChatEntry::direct(&sender_name, target_name, body);
    tracing::info!(
        agent_id = %sender,
        from = %sender_name,
        to = target_name,
        body,
        "message"
    );

    let mut summaries = Vec::new();
    summaries.extend(append_to(roster, sender, record.clone()));
    if recipient != sender {
        summaries.extend(receive(roster, recipient, record.clone()));
    }
    if let Some(agent) = roster.get_mut(sender) {
        agent.record_action(format!("Messaged {target_name}: {body}"));
    }

    Ok(Delivery {
        recipient,
        record,
        summaries,
    })
}

/// Append an incoming record to `recipient`'s history.
pub fn receive(
    roster: &mut AgentRoster,
    recipient: AgentId,
    record: ChatEntry,
) -> Option<SummaryRequest> {
    append_to(roster, recipient, record)
}

/// Deliver a system-authored message to every living agent.
pub fn broadcast(roster: &mut AgentRoster, body: &str) -> Vec<SummaryRequest> {
    tracing::info!(body, "broadcast");
    let record = ChatEntry::broadcast(body);
    roster
        .living_ids()
        .into_iter()
        .filter_map(|id| receive(roster, id, record.clone()))
        .collect()
}

/// Hand a finished summarization back to its agent.
///
/// Returns `false` when the agent is gone or killed; the result is then
/// discarded.
pub fn apply_summary(roster: &mut AgentRoster, agent: AgentId, text: &str) -> bool {
    match roster.get_mut(agent) {
        Some(a) if !a.is_killed() => a.chat.apply_summary(text),
        _ => false,
    }
}
