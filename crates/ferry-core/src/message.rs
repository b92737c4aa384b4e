//! Conversation message types.
//!
//! Messages are immutable once created: fields are private and only exposed
//! through accessors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier of a message (UUID format).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Creates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageBody {
    /// Plain text.
    Text { text: String },
    /// A shared image, described upstream, plus what others said about it.
    Image {
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        commentary: Vec<String>,
    },
}

impl MessageBody {
    /// Flattens the body into the text the policy reasons over.
    ///
    /// An image without a description contributes only its commentary.
    pub fn text(&self) -> String {
        match self {
            MessageBody::Text { text } => text.clone(),
            MessageBody::Image {
                description,
                commentary,
            } => {
                let mut parts: Vec<&str> = Vec::new();
                if let Some(description) = description.as_deref() {
                    let description = description.trim();
                    if !description.is_empty() {
                        parts.push(description);
                    }
                }
                parts.extend(
                    commentary
                        .iter()
                        .map(|c| c.trim())
                        .filter(|c| !c.is_empty()),
                );
                parts.join(" ")
            }
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, MessageBody::Image { .. })
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    id: MessageId,
    sender: String,
    body: MessageBody,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    mentions: Vec<String>,
    #[serde(default)]
    from_self: bool,
}

impl Message {
    /// Creates an inbound text message stamped with the current time.
    pub fn text(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(
            sender,
            MessageBody::Text { text: text.into() },
            Utc::now(),
        )
    }

    /// Creates an inbound image message.
    pub fn image(
        sender: impl Into<String>,
        description: Option<String>,
        commentary: Vec<String>,
    ) -> Self {
        Self::new(
            sender,
            MessageBody::Image {
                description,
                commentary,
            },
            Utc::now(),
        )
    }

    /// Creates an inbound message with an explicit body and timestamp.
    pub fn new(sender: impl Into<String>, body: MessageBody, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: MessageId::new(),
            sender: sender.into(),
            body,
            timestamp,
            mentions: Vec::new(),
            from_self: false,
        }
    }

    /// Creates a message authored by the persona itself.
    pub fn from_persona(
        persona: impl Into<String>,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            sender: persona.into(),
            body: MessageBody::Text { text: text.into() },
            timestamp,
            mentions: Vec::new(),
            from_self: true,
        }
    }

    /// Sets the addressed recipients.
    pub fn with_mentions<I, S>(mut self, mentions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mentions = mentions.into_iter().map(Into::into).collect();
        self
    }

    /// Overrides the timestamp.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Overrides the identifier.
    pub fn with_id(mut self, id: impl Into<MessageId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn id(&self) -> &MessageId {
        &self.id
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn body(&self) -> &MessageBody {
        &self.body
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn mentions(&self) -> &[String] {
        &self.mentions
    }

    pub fn is_from_self(&self) -> bool {
        self.from_self
    }

    /// The flattened body text.
    pub fn text_content(&self) -> String {
        self.body.text()
    }
}
