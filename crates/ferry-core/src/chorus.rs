//! Joining in when the group repeats a phrase.

use crate::config::ChorusConfig;
use crate::message::Message;
use crate::text;

/// Detects a run of identical messages worth echoing.
#[derive(Debug, Clone)]
pub struct ChorusDetector {
    config: ChorusConfig,
}

impl ChorusDetector {
    pub fn new(config: ChorusConfig) -> Self {
        Self { config }
    }

    /// Returns the phrase to echo when the last `repeat_count` entries of
    /// `context` come from others and say the same thing.
    ///
    /// Punctuation, emoticons, case and whitespace are ignored when comparing;
    /// the most recent wording is returned.
    pub fn detect(&self, context: &[&Message]) -> Option<String> {
        if !self.config.enabled || self.config.repeat_count < 2 {
            return None;
        }
        if context.len() < self.config.repeat_count {
            return None;
        }

        let tail = &context[context.len() - self.config.repeat_count..];
        if tail.iter().any(|m| m.is_from_self()) {
            return None;
        }

        let keys: Vec<String> = tail.iter().map(|m| text::normalize(&m.text_content())).collect();
        let first = keys.first()?;
        if first.is_empty() || keys.iter().any(|key| key != first) {
            return None;
        }

        let phrase = tail.last()?.text_content().trim().to_string();
        if text::printable_len(&phrase) > self.config.max_length {
            return None;
        }
        Some(phrase)
    }
}
