//! Persona configuration.
//!
//! The declarative rule set is loaded once from TOML and handed to the engine
//! at construction. Nothing in here changes for the lifetime of a conversation.

use crate::error::{FerryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;
use strum::{Display, EnumString};

/// Whether the persona talks to one contact or inside a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConversationKind {
    Direct,
    Group,
}

/// The conversation partner of a persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatPartner {
    /// A single contact (one-to-one chat).
    Contact { label: String },
    /// A group chat.
    Group { label: String },
}

impl ChatPartner {
    pub fn label(&self) -> &str {
        match self {
            ChatPartner::Contact { label } | ChatPartner::Group { label } => label,
        }
    }

    pub fn kind(&self) -> ConversationKind {
        match self {
            ChatPartner::Contact { .. } => ConversationKind::Direct,
            ChatPartner::Group { .. } => ConversationKind::Group,
        }
    }
}

/// How competing addressals inside one cycle are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MentionPolicy {
    /// Only the most recent unanswered addressal is eligible.
    #[default]
    LatestOnly,
    /// Every addressal is answered on its own.
    Each,
}

/// Persona identity section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaSection {
    /// Display name of the persona
    pub name: String,
    /// Free-form tone passed to the generation prompt
    #[serde(default = "default_tone")]
    pub tone: String,
    /// Who the persona is talking to
    pub partner: ChatPartner,
}

fn default_tone() -> String {
    "upbeat".to_string()
}

/// Declarative response rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    /// Conversation window capacity, in turns (one turn per message)
    pub window_size: usize,
    /// Printable length cap of a casual line
    pub casual_line_length: usize,
    /// Maximum lines of a casual reply (1 or 2)
    pub casual_max_lines: usize,
    /// How many emitted responses are remembered for duplicate detection
    pub recent_response_depth: usize,
    /// Distinct phrasings allowed for one repeated question
    pub max_phrasing_variants: usize,
    /// Whether idioms and memes may stand in for a blocked phrasing
    pub meme_injection: bool,
    /// Idioms the persona likes to use
    pub idioms: Vec<String>,
    /// Substrings that mark a message as technical
    pub technical_signals: Vec<String>,
    pub mention_policy: MentionPolicy,
    /// Upper bound for one generation call
    pub generation_timeout_secs: u64,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            window_size: 3,
            casual_line_length: 10,
            casual_max_lines: 2,
            recent_response_depth: 5,
            max_phrasing_variants: 2,
            meme_injection: true,
            idioms: ["绝了", "好家伙", "蚌埠住了", "笑死"]
                .into_iter()
                .map(String::from)
                .collect(),
            technical_signals: [
                "how", "why", "error", "code", "design", "bug", "怎么", "为什么", "报错", "代码",
                "设计", "如何", "实现", "原理",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            mention_policy: MentionPolicy::LatestOnly,
            generation_timeout_secs: 30,
        }
    }
}

impl RuleSet {
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }
}

/// Thresholds of the similarity measures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Token Jaccard at which two questions share an intent
    pub intent_threshold: f64,
    /// Token coverage at which a message continues the current topic
    pub topic_threshold: f64,
    /// Key-bigram Jaccard at which two phrasings are near-identical
    pub phrasing_threshold: f64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            intent_threshold: 0.6,
            topic_threshold: 0.15,
            phrasing_threshold: 0.8,
        }
    }
}

/// Rate limit for unprompted group participation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CadenceConfig {
    /// Minimum seconds between two unprompted attempts
    pub min_interval_secs: u64,
    /// Messages to let pass between two unprompted attempts
    pub max_ignored: usize,
}

/// Joining in when others repeat the same phrase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChorusConfig {
    pub enabled: bool,
    /// Identical messages needed before joining
    pub repeat_count: usize,
    /// Longest phrase worth echoing, in printable characters
    pub max_length: usize,
}

impl Default for ChorusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            repeat_count: 2,
            max_length: 10,
        }
    }
}

/// Settings for one conversation, matched by partner label.
///
/// Unset fields keep the value from `[rules]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationOverride {
    pub label: String,
    /// `false` mutes the persona in this conversation
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub casual_line_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub casual_max_lines: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meme_injection: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idioms: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mention_policy: Option<MentionPolicy>,
}

fn default_enabled() -> bool {
    true
}

impl ConversationOverride {
    /// An override for `label` that changes nothing yet.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            enabled: true,
            tone: None,
            casual_line_length: None,
            casual_max_lines: None,
            meme_injection: None,
            idioms: None,
            mention_policy: None,
        }
    }

    fn apply_rules(&self, rules: &mut RuleSet) {
        if let Some(length) = self.casual_line_length {
            rules.casual_line_length = length;
        }
        if let Some(lines) = self.casual_max_lines {
            rules.casual_max_lines = lines;
        }
        if let Some(meme_injection) = self.meme_injection {
            rules.meme_injection = meme_injection;
        }
        if let Some(idioms) = &self.idioms {
            rules.idioms = idioms.clone();
        }
        if let Some(policy) = self.mention_policy {
            rules.mention_policy = policy;
        }
    }
}

/// Complete persona configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaConfig {
    pub persona: PersonaSection,
    #[serde(default)]
    pub rules: RuleSet,
    #[serde(default)]
    pub similarity: SimilarityConfig,
    #[serde(default)]
    pub cadence: CadenceConfig,
    #[serde(default)]
    pub chorus: ChorusConfig,
    /// Per-conversation settings (`[[conversations]]`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conversations: Vec<ConversationOverride>,
}

impl PersonaConfig {
    /// Creates a configuration with default rules.
    pub fn new(name: impl Into<String>, partner: ChatPartner) -> Self {
        Self {
            persona: PersonaSection {
                name: name.into(),
                tone: default_tone(),
                partner,
            },
            rules: RuleSet::default(),
            similarity: SimilarityConfig::default(),
            cadence: CadenceConfig::default(),
            chorus: ChorusConfig::default(),
            conversations: Vec::new(),
        }
    }

    /// The configuration for a conversation with `partner`.
    ///
    /// The partner replaces the template's own, and the matching
    /// `[[conversations]]` entry, if any, is applied on top of `[rules]`.
    pub fn for_partner(&self, partner: ChatPartner) -> Self {
        let mut config = self.clone();
        config.persona.partner = partner;
        if let Some(entry) = self.conversation(config.persona.partner.label()) {
            if let Some(tone) = &entry.tone {
                config.persona.tone = tone.clone();
            }
            entry.apply_rules(&mut config.rules);
        }
        config
    }

    /// The `[[conversations]]` entry for `label`.
    pub fn conversation(&self, label: &str) -> Option<&ConversationOverride> {
        self.conversations.iter().find(|entry| entry.label == label)
    }

    /// Whether the persona may speak in its own conversation.
    pub fn is_enabled(&self) -> bool {
        self.conversation(self.persona.partner.label())
            .is_none_or(|entry| entry.enabled)
    }

    /// Loads and validates a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            FerryError::io(format!(
                "Failed to read persona configuration at {}: {}",
                path.display(),
                e
            ))
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), persona = %config.name(), "Loaded persona configuration");
        Ok(config)
    }

    /// Parses and validates TOML content.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the effective configuration.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn name(&self) -> &str {
        &self.persona.name
    }

    pub fn kind(&self) -> ConversationKind {
        self.persona.partner.kind()
    }

    /// Checks the invariants the policy components rely on.
    pub fn validate(&self) -> Result<()> {
        if self.persona.name.trim().is_empty() {
            return Err(FerryError::config("persona.name must not be empty"));
        }
        if self.persona.partner.label().trim().is_empty() {
            return Err(FerryError::config("persona.partner.label must not be empty"));
        }

        let rules = &self.rules;
        if rules.window_size == 0 {
            return Err(FerryError::config("rules.window_size must be at least 1"));
        }
        check_casual_shape("rules", rules)?;
        if rules.recent_response_depth == 0 {
            return Err(FerryError::config(
                "rules.recent_response_depth must be at least 1",
            ));
        }
        if rules.max_phrasing_variants == 0 {
            return Err(FerryError::config(
                "rules.max_phrasing_variants must be at least 1",
            ));
        }
        if rules.generation_timeout_secs == 0 {
            return Err(FerryError::config(
                "rules.generation_timeout_secs must be at least 1",
            ));
        }

        let thresholds = [
            ("similarity.intent_threshold", self.similarity.intent_threshold),
            ("similarity.topic_threshold", self.similarity.topic_threshold),
            (
                "similarity.phrasing_threshold",
                self.similarity.phrasing_threshold,
            ),
        ];
        for (field, value) in thresholds {
            if !(value > 0.0 && value <= 1.0) {
                return Err(FerryError::config(format!(
                    "{field} must be in (0, 1], got {value}"
                )));
            }
        }

        if self.chorus.enabled {
            if self.chorus.repeat_count < 2 || self.chorus.repeat_count > rules.window_size {
                return Err(FerryError::config(format!(
                    "chorus.repeat_count must be between 2 and rules.window_size ({})",
                    rules.window_size
                )));
            }
            if self.chorus.max_length == 0 {
                return Err(FerryError::config("chorus.max_length must be at least 1"));
            }
        }

        let mut labels = HashSet::new();
        for entry in &self.conversations {
            if entry.label.trim().is_empty() {
                return Err(FerryError::config("conversations.label must not be empty"));
            }
            if !labels.insert(entry.label.as_str()) {
                return Err(FerryError::config(format!(
                    "conversations.label \"{}\" appears more than once",
                    entry.label
                )));
            }
            let mut merged = self.rules.clone();
            entry.apply_rules(&mut merged);
            check_casual_shape(&format!("conversations.{}", entry.label), &merged)?;
        }

        Ok(())
    }
}

fn check_casual_shape(scope: &str, rules: &RuleSet) -> Result<()> {
    if rules.casual_line_length == 0 {
        return Err(FerryError::config(format!(
            "{scope}.casual_line_length must be at least 1"
        )));
    }
    if !(1..=2).contains(&rules.casual_max_lines) {
        return Err(FerryError::config(format!(
            "{scope}.casual_max_lines must be 1 or 2"
        )));
    }
    Ok(())
}
