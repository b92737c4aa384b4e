//! Post-processing of raw model output.

use ferry_core::Draft;
use ferry_core::text;
use once_cell::sync::Lazy;
use regex::Regex;

/// What the model says when it decides to stay quiet.
pub const SILENCE_MARKER: &str = "本轮不发言";

/// Everything up to and including the first closing reasoning tag.
static THINK_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)\A.*?</think\s*>").expect("valid regex"));
const ALTERNATE_PREFIXES: [&str; 2] = ["备选:", "备选："];

/// Turns raw model output into a draft. `None` when the model chose silence
/// or said nothing.
///
/// A reasoning block ending in `</think>` is dropped, an echoed `persona:`
/// prefix is removed from every line, and lines starting with `备选:` become
/// alternates.
pub fn parse_reply(raw: &str, persona: &str) -> Option<Draft> {
    let answer = match THINK_BLOCK.find(raw) {
        Some(block) => &raw[block.end()..],
        None => raw,
    };
    if answer.contains(SILENCE_MARKER) {
        return None;
    }

    let mut lines = Vec::new();
    let mut alternates = Vec::new();
    for line in answer.lines() {
        let line = text::strip_speaker_prefix(line.trim(), persona).trim();
        if line.is_empty() {
            continue;
        }
        match ALTERNATE_PREFIXES
            .iter()
            .find_map(|prefix| line.strip_prefix(*prefix))
        {
            Some(alternate) if !alternate.trim().is_empty() => {
                alternates.push(alternate.trim().to_string())
            }
            Some(_) => {}
            None => lines.push(line.to_string()),
        }
    }

    if lines.is_empty() {
        if alternates.is_empty() {
            return None;
        }
        lines.push(alternates.remove(0));
    }
    Some(Draft::new(lines.join("\n")).with_alternates(alternates))
}
