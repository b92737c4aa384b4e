//! Response candidates produced within one decision cycle.

use crate::style::StyleClass;
use crate::text;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized form of a response used for duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimilarityKey(String);

impl SimilarityKey {
    pub fn of(text: &str) -> Self {
        Self(text::normalize(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Phrasing similarity in `[0, 1]` based on character bigrams.
    pub fn similarity(&self, other: &SimilarityKey) -> f64 {
        if self.0 == other.0 {
            return if self.0.is_empty() { 0.0 } else { 1.0 };
        }
        text::jaccard(&text::key_bigrams(&self.0), &text::key_bigrams(&other.0))
    }
}

impl fmt::Display for SimilarityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A drafted reply together with its style class and similarity key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseCandidate {
    text: String,
    class: StyleClass,
    key: SimilarityKey,
}

impl ResponseCandidate {
    pub fn new(text: impl Into<String>, class: StyleClass) -> Self {
        let text = text.into();
        let key = SimilarityKey::of(&text);
        Self { text, class, key }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn class(&self) -> StyleClass {
        self.class
    }

    pub fn key(&self) -> &SimilarityKey {
        &self.key
    }

    /// Same class, different text.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self::new(text, self.class)
    }
}
