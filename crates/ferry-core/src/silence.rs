//! The final gate between a drafted reply and the chat.

use crate::config::ConversationKind;
use crate::duplicate::Exhaustion;
use crate::mention::Addressal;
use crate::style::StyledReply;
use crate::topic::TopicShift;
use serde::{Deserialize, Serialize};
use strum::Display;

/// An emitted reply: the final lines and their style class.
pub type Response = StyledReply;

/// Why the persona stayed silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SuppressReason {
    /// The persona's own message, seen again.
    OwnMessage,
    /// Already in the window, or older than everything a full window holds.
    Stale,
    /// The conversation is disabled in the persona configuration.
    Muted,
    /// A later message in the same cycle addressed the persona again.
    Superseded,
    /// Unprompted group message unrelated to the current topic.
    LowRelevance,
    EmptyBody,
    /// Unprompted participation is rate limited.
    Throttled,
    /// The generator chose silence.
    ModelDeclined,
    GenerationFailed,
    GenerationTimedOut,
    /// The question was already answered in every allowed phrasing.
    RepeatExhausted,
    /// A rephrase was needed but none was acceptable.
    NoAlternate,
    /// Nothing printable survived style enforcement.
    StyleUnsatisfiable,
    /// A chorus phrase the persona already joined.
    Duplicate,
}

impl From<Exhaustion> for SuppressReason {
    fn from(exhaustion: Exhaustion) -> Self {
        match exhaustion {
            Exhaustion::VariantsUsed => SuppressReason::RepeatExhausted,
            Exhaustion::NoAlternate => SuppressReason::NoAlternate,
            Exhaustion::Unprintable => SuppressReason::StyleUnsatisfiable,
        }
    }
}

/// The outcome for one inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Emit(Response),
    Suppress { reason: SuppressReason },
}

impl Decision {
    pub fn suppress(reason: SuppressReason) -> Self {
        Decision::Suppress { reason }
    }

    pub fn is_emit(&self) -> bool {
        matches!(self, Decision::Emit(_))
    }

    pub fn response(&self) -> Option<&Response> {
        match self {
            Decision::Emit(response) => Some(response),
            Decision::Suppress { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<SuppressReason> {
        match self {
            Decision::Emit(_) => None,
            Decision::Suppress { reason } => Some(*reason),
        }
    }
}

/// What the earlier stages found out about an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signals {
    pub from_self: bool,
    /// The window did not take the message.
    pub stale: bool,
    /// The persona is disabled for this conversation.
    pub muted: bool,
    pub kind: ConversationKind,
    pub addressal: Addressal,
    pub shift: TopicShift,
    pub empty_body: bool,
    /// The message completes a chorus the persona may join.
    pub chorus: bool,
    pub throttled: bool,
}

impl Signals {
    /// A group message nobody asked the persona about.
    pub fn is_unprompted(&self) -> bool {
        self.kind == ConversationKind::Group && self.addressal == Addressal::NotAddressed
    }
}

/// Decides between emitting and staying silent.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilenceDecider;

impl SilenceDecider {
    pub fn new() -> Self {
        Self
    }

    /// Rules that can be applied before anything is generated.
    pub fn screen(&self, signals: &Signals) -> Option<SuppressReason> {
        if signals.from_self {
            return Some(SuppressReason::OwnMessage);
        }
        if signals.stale {
            return Some(SuppressReason::Stale);
        }
        if signals.muted {
            return Some(SuppressReason::Muted);
        }
        if signals.addressal == Addressal::Superseded {
            return Some(SuppressReason::Superseded);
        }
        if signals.empty_body {
            return Some(SuppressReason::EmptyBody);
        }
        if signals.throttled {
            return Some(SuppressReason::Throttled);
        }
        if signals.is_unprompted() && !signals.chorus && signals.shift == TopicShift::NewTopic {
            return Some(SuppressReason::LowRelevance);
        }
        None
    }

    /// Applies every rule to the outcome of the pipeline.
    pub fn finalize(&self, signals: &Signals, outcome: Result<Response, SuppressReason>) -> Decision {
        if let Some(reason) = self.screen(signals) {
            return Decision::suppress(reason);
        }
        match outcome {
            Ok(response) if response.lines.iter().any(|line| !line.trim().is_empty()) => {
                Decision::Emit(response)
            }
            Ok(_) => Decision::suppress(SuppressReason::StyleUnsatisfiable),
            Err(reason) => Decision::suppress(reason),
        }
    }
}
