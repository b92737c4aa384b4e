//! Style classification and enforcement.
//!
//! Every reply falls into exactly one regime:
//!
//! - `casual`: one or two short lines, no terminal punctuation
//! - `technical`: one unbroken line of any length
//!
//! Emoji and emoticons are removed in both.

use crate::candidate::ResponseCandidate;
use crate::config::RuleSet;
use crate::message::Message;
use crate::text;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Binary style regime of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StyleClass {
    Casual,
    Technical,
}

/// A reply that satisfies its style constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyledReply {
    pub class: StyleClass,
    pub lines: Vec<String>,
}

impl StyledReply {
    /// The reply as one string, lines separated by `\n`.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Applies the formatting rules of a persona.
#[derive(Debug, Clone)]
pub struct StyleConstraintEnforcer {
    signals: Vec<String>,
    line_length: usize,
    max_lines: usize,
}

impl StyleConstraintEnforcer {
    pub fn new(rules: &RuleSet) -> Self {
        Self {
            signals: rules
                .technical_signals
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            line_length: rules.casual_line_length.max(1),
            max_lines: rules.casual_max_lines.clamp(1, 2),
        }
    }

    /// `Technical` when the message carries a technical-intent signal.
    pub fn classify(&self, message: &Message) -> StyleClass {
        self.classify_text(&message.text_content())
    }

    pub fn classify_text(&self, text: &str) -> StyleClass {
        let lowered = text.to_lowercase();
        if self.signals.iter().any(|signal| lowered.contains(signal)) {
            StyleClass::Technical
        } else {
            StyleClass::Casual
        }
    }

    /// Enforces the candidate's class. `None` when nothing printable is left.
    pub fn enforce(&self, candidate: &ResponseCandidate) -> Option<StyledReply> {
        let cleaned = text::strip_emoji(candidate.text());
        let lines = match candidate.class() {
            StyleClass::Casual => self.casual_lines(&cleaned),
            StyleClass::Technical => technical_line(&cleaned).into_iter().collect(),
        };
        if lines.is_empty() {
            return None;
        }
        Some(StyledReply {
            class: candidate.class(),
            lines,
        })
    }

    fn casual_lines(&self, text: &str) -> Vec<String> {
        text.lines()
            .map(collapse_whitespace)
            .map(|line| self.fit_line(&line))
            .filter(|line| !line.is_empty())
            .take(self.max_lines)
            .collect()
    }

    /// Drops terminal punctuation and cuts the line to the length cap.
    fn fit_line(&self, line: &str) -> String {
        let trimmed = text::trim_terminal_punctuation(line);
        if text::printable_len(trimmed) <= self.line_length {
            return trimmed.to_string();
        }
        let cut = truncate_at_boundary(trimmed, self.line_length);
        text::trim_terminal_punctuation(&cut).to_string()
    }
}

fn collapse_whitespace(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn technical_line(text: &str) -> Option<String> {
    let line = collapse_whitespace(text);
    if line.is_empty() { None } else { Some(line) }
}

/// Cuts `line` to at most `limit` printable characters at a word boundary.
///
/// ASCII words are kept whole; every CJK character is its own boundary. A
/// single word longer than the limit is cut at the limit.
fn truncate_at_boundary(line: &str, limit: usize) -> String {
    let mut out = String::new();
    let mut used = 0;

    for piece in pieces(line) {
        let len = text::printable_len(piece);
        if used + len > limit {
            if out.trim().is_empty() {
                return piece.chars().take(limit).collect();
            }
            break;
        }
        out.push_str(piece);
        used += len;
    }
    out.trim_end().to_string()
}

/// Splits a line into words, single CJK characters, and the separators
/// between them.
fn pieces(line: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut in_word = false;

    for (index, c) in line.char_indices() {
        let wordish = c.is_alphanumeric() && !text::is_cjk(c);
        if in_word && !wordish {
            pieces.push(&line[start..index]);
            start = index;
        }
        if !wordish {
            let end = index + c.len_utf8();
            pieces.push(&line[index..end]);
            start = end;
            in_word = false;
        } else {
            in_word = true;
        }
    }
    if start < line.len() {
        pieces.push(&line[start..]);
    }
    pieces
}
