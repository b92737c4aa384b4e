//! The seam between the policy engine and a text-generation model.

use crate::config::{ConversationKind, PersonaConfig};
use crate::error::Result;
use crate::message::Message;
use crate::style::StyleClass;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One line of conversation context as the model sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextLine {
    pub sender: String,
    pub text: String,
    pub from_self: bool,
}

impl From<&Message> for ContextLine {
    fn from(message: &Message) -> Self {
        Self {
            sender: message.sender().to_string(),
            text: message.text_content(),
            from_self: message.is_from_self(),
        }
    }
}

/// Everything a generator needs to draft one reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub persona: String,
    pub partner: String,
    pub kind: ConversationKind,
    pub style: StyleClass,
    pub tone: String,
    pub meme_injection: bool,
    pub idioms: Vec<String>,
    /// Relevance-filtered context, oldest first, without the incoming message.
    pub context: Vec<ContextLine>,
    pub sender: String,
    pub incoming: String,
    /// Recent responses the model should not repeat.
    pub avoid: Vec<String>,
}

impl GenerationRequest {
    /// Builds a request for `incoming` under `config`.
    pub fn new(config: &PersonaConfig, style: StyleClass, incoming: &Message) -> Self {
        Self {
            persona: config.persona.name.clone(),
            partner: config.persona.partner.label().to_string(),
            kind: config.kind(),
            style,
            tone: config.persona.tone.clone(),
            meme_injection: config.rules.meme_injection,
            idioms: config.rules.idioms.clone(),
            context: Vec::new(),
            sender: incoming.sender().to_string(),
            incoming: incoming.text_content(),
            avoid: Vec::new(),
        }
    }

    pub fn with_context<'a>(mut self, context: impl IntoIterator<Item = &'a Message>) -> Self {
        self.context = context.into_iter().map(ContextLine::from).collect();
        self
    }

    pub fn with_avoid(mut self, avoid: Vec<String>) -> Self {
        self.avoid = avoid;
        self
    }
}

/// A drafted reply plus optional alternate phrasings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Draft {
    pub text: String,
    #[serde(default)]
    pub alternates: Vec<String>,
}

impl Draft {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            alternates: Vec::new(),
        }
    }

    pub fn with_alternates<I, S>(mut self, alternates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alternates = alternates.into_iter().map(Into::into).collect();
        self
    }
}

/// Produces reply drafts.
///
/// Implementations talk to a model (or replay canned text). `Ok(None)` means
/// the model decided the persona should stay silent.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Option<Draft>>;

    /// Short name used in logs.
    fn name(&self) -> &str {
        "generator"
    }
}
