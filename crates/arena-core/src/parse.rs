//! Action grammar parsing.
//!
//! The decision source answers in free text. Two bracketed forms are
//! recognized anywhere in that text:
//!
//! - `[message <name>: <text>]`
//! - `[attack <name>]`
//!
//! Matching is case-sensitive. The message form is tried first across the
//! whole text, then the attack form, so a reply containing both yields the
//! message. Names may not contain `:` or `]`; a message body runs to the
//! next `]` and must not be empty. Surrounding whitespace is trimmed.
//! Anything else is [`Action::None`].

use arena_types::Action;
use tracing::warn;

const MESSAGE_OPEN: &str = "[message ";
const ATTACK_OPEN: &str = "[attack ";

/// Parse decision-source text into an [`Action`].
pub fn parse_action(raw: &str) -> Action {
    if let Some(action) = find_message(raw).or_else(|| find_attack(raw)) {
        return action;
    }
    warn!(raw_response = raw, "no action pattern in response");
    Action::None
}

/// Leftmost well-formed `[message name: body]`.
fn find_message(raw: &str) -> Option<Action> {
    raw.match_indices(MESSAGE_OPEN).find_map(|(start, open)| {
        let rest = raw.get(start.saturating_add(open.len())..)?;
        let colon = rest.find([':', ']'])?;
        if !rest.get(colon..)?.starts_with(':') {
            return None;
        }
        let name = valid_name(rest.get(..colon)?)?;
        let after = rest.get(colon.saturating_add(1)..)?;
        let close = after.find(']')?;
        let body = after.get(..close)?.trim();
        if body.is_empty() {
            return None;
        }
        Some(Action::Message {
            target_name: name.to_owned(),
            body: body.to_owned(),
        })
    })
}

/// Leftmost well-formed `[attack name]`.
fn find_attack(raw: &str) -> Option<Action> {
    raw.match_indices(ATTACK_OPEN).find_map(|(start, open)| {
        let rest = raw.get(start.saturating_add(open.len())..)?;
        let close = rest.find(']')?;
        let name = valid_name(rest.get(..close)?)?;
        Some(Action::Attack {
            target_name: name.to_owned(),
        })
    })
}

fn valid_name(candidate: &str) -> Option<&str> {
    let name = candidate.trim();
    if name.is_empty() || name.contains(':') || name.contains(']') {
        return None;
    }
    Some(name)
}
