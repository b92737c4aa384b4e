//! Duplicate response detection.
//!
//! `RecentSelfResponses` remembers what the persona said lately, and
//! `DuplicateResponseGuard` uses it to keep the persona from answering the same
//! question with the same words twice.

use crate::candidate::{ResponseCandidate, SimilarityKey};
use crate::config::SimilarityConfig;
use crate::message::Message;
use crate::style::StyledReply;
use crate::text::{self, TokenSet};
use serde::{Deserialize, Serialize};
use strum::Display;

/// One remembered response.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedResponse {
    pub key: SimilarityKey,
    /// Tokens of the message this response answered.
    pub intent: TokenSet,
    pub text: String,
}

/// Bounded arena of the persona's last K responses in one conversation.
///
/// Slots are overwritten in ring order, so eviction is a cursor move and never
/// shifts entries.
#[derive(Debug, Clone)]
pub struct RecentSelfResponses {
    slots: Vec<Option<RecordedResponse>>,
    cursor: usize,
}

impl RecentSelfResponses {
    /// Creates an empty arena. A zero depth is raised to one.
    pub fn new(depth: usize) -> Self {
        Self {
            slots: vec![None; depth.max(1)],
            cursor: 0,
        }
    }

    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records an emitted response, evicting the oldest when full.
    pub fn record(&mut self, response: &ResponseCandidate, intent: TokenSet) {
        self.slots[self.cursor] = Some(RecordedResponse {
            key: response.key().clone(),
            intent,
            text: response.text().to_string(),
        });
        self.cursor = (self.cursor + 1) % self.slots.len();
    }

    /// Remembered responses, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &RecordedResponse> {
        let (newer, older) = self.slots.split_at(self.cursor);
        older.iter().chain(newer.iter()).filter_map(Option::as_ref)
    }

    /// Whether a response with exactly this key is remembered.
    pub fn contains_key(&self, key: &SimilarityKey) -> bool {
        self.iter().any(|entry| &entry.key == key)
    }
}

/// Why the guard could not produce an acceptable candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Exhaustion {
    /// The question was already answered with every allowed phrasing.
    VariantsUsed,
    /// A rephrase was required but none of the alternates was acceptable.
    NoAlternate,
    /// Nothing printable is left of the candidate once it is shaped.
    Unprintable,
}

/// Outcome of a guard review. Accepted replies are already shaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardVerdict {
    /// The candidate passes.
    Pass(StyledReply),
    /// The candidate was replaced by a different phrasing.
    Rephrased(StyledReply),
    /// Nothing acceptable is left to say.
    Exhausted(Exhaustion),
}

/// Everything the guard looks at for one candidate.
#[derive(Debug, Clone, Copy)]
pub struct GuardInput<'a> {
    /// Relevance-filtered context, ending with the incoming message.
    pub view: &'a [&'a Message],
    pub candidate: &'a ResponseCandidate,
    /// Alternate phrasings offered by the generator.
    pub alternates: &'a [String],
    /// Persona idioms usable as a last-resort restatement.
    pub idioms: &'a [String],
}

/// Blocks or reshapes responses that would repeat earlier phrasing.
#[derive(Debug, Clone)]
pub struct DuplicateResponseGuard {
    similarity: SimilarityConfig,
    max_variants: usize,
}

impl DuplicateResponseGuard {
    pub fn new(similarity: SimilarityConfig, max_variants: usize) -> Self {
        Self {
            similarity,
            max_variants: max_variants.max(1),
        }
    }

    /// Whether the last message of `view` repeats an earlier question that the
    /// persona already answered inside `view`.
    pub fn is_repeat_question(&self, view: &[&Message]) -> bool {
        let Some((incoming, prior)) = view.split_last() else {
            return false;
        };
        let intent = text::tokens(&incoming.text_content());
        if intent.is_empty() {
            return false;
        }

        prior.iter().enumerate().any(|(index, message)| {
            !message.is_from_self()
                && text::jaccard(&intent, &text::tokens(&message.text_content()))
                    >= self.similarity.intent_threshold
                && prior[index + 1..].iter().any(|m| m.is_from_self())
        })
    }

    /// Number of remembered responses that answered the same intent.
    pub fn answers_for(&self, intent: &TokenSet, recent: &RecentSelfResponses) -> usize {
        recent
            .iter()
            .filter(|entry| text::jaccard(intent, &entry.intent) >= self.similarity.intent_threshold)
            .count()
    }

    /// Reviews a candidate against the remembered responses.
    ///
    /// `shape` turns a phrasing into the reply that would actually be sent
    /// (style enforcement). Collisions are judged on the shaped text, since
    /// truncation can bring a reply closer to an earlier one. A phrasing
    /// that shapes to nothing is skipped; if that happens to the candidate
    /// itself the review ends with [`Exhaustion::Unprintable`].
    pub fn review<F>(&self, input: GuardInput<'_>, recent: &RecentSelfResponses, shape: F) -> GuardVerdict
    where
        F: Fn(&ResponseCandidate) -> Option<StyledReply>,
    {
        let repeat = self.is_repeat_question(input.view);

        if repeat {
            let intent = input
                .view
                .last()
                .map(|m| text::tokens(&m.text_content()))
                .unwrap_or_default();
            if self.answers_for(&intent, recent) >= self.max_variants {
                return GuardVerdict::Exhausted(Exhaustion::VariantsUsed);
            }
        }

        let Some(shaped) = shape(input.candidate) else {
            return GuardVerdict::Exhausted(Exhaustion::Unprintable);
        };
        let original = SimilarityKey::of(&shaped.text());
        if !self.collides(&original, repeat, recent) {
            return GuardVerdict::Pass(shaped);
        }

        let replacement = input
            .alternates
            .iter()
            .cloned()
            .chain(shorter_restatements(input.candidate.text()))
            .chain(input.idioms.iter().cloned())
            .filter_map(|text| shape(&input.candidate.with_text(text.trim())))
            .find(|reply| {
                let key = SimilarityKey::of(&reply.text());
                !key.is_empty() && key != original && !self.collides(&key, repeat, recent)
            });

        match replacement {
            Some(reply) => GuardVerdict::Rephrased(reply),
            None => GuardVerdict::Exhausted(Exhaustion::NoAlternate),
        }
    }

    /// For a repeated question any near-identical phrasing collides; otherwise
    /// only an exact key match does.
    fn collides(&self, key: &SimilarityKey, repeat: bool, recent: &RecentSelfResponses) -> bool {
        if repeat {
            recent
                .iter()
                .any(|entry| entry.key.similarity(key) >= self.similarity.phrasing_threshold)
        } else {
            recent.contains_key(key)
        }
    }
}

/// Shorter ways of saying the same thing, derived without the generator:
/// each line of a multi-line reply, then the first clause of the first line.
fn shorter_restatements(text: &str) -> Vec<String> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let mut restatements: Vec<String> = Vec::new();
    if lines.len() > 1 {
        restatements.extend(lines.iter().map(|line| line.to_string()));
    }
    if let Some(first) = lines.first() {
        let clause = first
            .split(|c: char| text::is_punctuation(c) || c.is_whitespace())
            .map(str::trim)
            .find(|part| !part.is_empty());
        if let Some(clause) = clause {
            if clause != *first {
                restatements.push(clause.to_string());
            }
        }
    }
    restatements
}
