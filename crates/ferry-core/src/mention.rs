//! Mention resolution for multi-party threads.

use crate::config::{ConversationKind, MentionPolicy};
use crate::message::Message;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Whether a message is eligible for a reply from the persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Addressal {
    /// Directed at the persona and eligible for a reply.
    Addressed,
    /// Not directed at the persona.
    NotAddressed,
    /// Directed at the persona, but a later addressal made it obsolete.
    Superseded,
}

/// Decides which messages address the persona.
#[derive(Debug, Clone)]
pub struct MentionResolver {
    persona: String,
    kind: ConversationKind,
    policy: MentionPolicy,
}

impl MentionResolver {
    pub fn new(persona: impl Into<String>, kind: ConversationKind, policy: MentionPolicy) -> Self {
        Self {
            persona: persona.into(),
            kind,
            policy,
        }
    }

    /// Whether `message` on its own is directed at the persona.
    ///
    /// One-to-one messages always are. In a group the mention list must name
    /// the persona, or the text must contain `@<persona>`.
    pub fn addresses_persona(&self, message: &Message) -> bool {
        if message.is_from_self() {
            return false;
        }
        if self.kind == ConversationKind::Direct {
            return true;
        }
        let mentioned = message
            .mentions()
            .iter()
            .any(|m| m.trim().eq_ignore_ascii_case(&self.persona));
        mentioned || message.text_content().contains(&format!("@{}", self.persona))
    }

    /// Resolves `message` given the messages that arrived after it in the same
    /// cycle, in chronological order.
    ///
    /// Under [`MentionPolicy::LatestOnly`] an addressal is superseded by any later
    /// addressal that is not separated from it by a reply of the persona.
    pub fn resolve(&self, message: &Message, later: &[&Message]) -> Addressal {
        if !self.addresses_persona(message) {
            return Addressal::NotAddressed;
        }
        if self.policy == MentionPolicy::Each {
            return Addressal::Addressed;
        }

        let superseded = later
            .iter()
            .take_while(|m| !m.is_from_self())
            .any(|m| self.addresses_persona(m));
        if superseded {
            Addressal::Superseded
        } else {
            Addressal::Addressed
        }
    }
}
