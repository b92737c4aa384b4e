//! Text utilities shared by the policy components.
//!
//! Everything here is deterministic: tokens are collected in ordered sets so
//! that similarity scores never depend on input order.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

/// Token set used for intent and topic comparisons.
pub type TokenSet = BTreeSet<String>;

/// WeChat-style bracket emoticons such as `[微笑]` or `[Doge]`.
static BRACKET_EMOTICON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(?:\p{Han}{1,6}|[A-Z][A-Za-z]{1,9})\]").expect("valid regex"));

/// ASCII faces like `:)` or `;-P`.
///
/// A face may not follow an ASCII letter, digit or `/`, and may not run into
/// an ASCII letter or digit, so ratios (`1:3`), URLs and `key:Data` survive.
/// The neighbouring characters are captured and put back on replacement.
static ASCII_EMOTICON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<pre>^|[^0-9A-Za-z/])(?:[:;=]['\-o]?[)(\]\[DPp3|]+)+(?P<post>$|[^0-9A-Za-z])")
        .expect("valid regex")
});

/// Kaomoji and letter faces.
static KAOMOJI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\^_*\^|T_T|QAQ|>_<|=_=|-_-").expect("valid regex"));

/// Emoji glyphs, keycap sequences and the joiners and selectors that glue
/// emoji sequences together.
static EMOJI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"[0-9#*]\x{FE0F}?\x{20E3}|[\p{Extended_Pictographic}\p{Emoji_Presentation}\x{200D}\x{20E3}\x{FE00}-\x{FE0F}\x{E0020}-\x{E007F}]",
    )
    .expect("valid regex")
});

/// Returns true for emoji glyphs and the joiners/selectors that glue them.
pub fn is_emoji(c: char) -> bool {
    EMOJI.is_match(c.encode_utf8(&mut [0; 4]))
}

/// Removes emoji glyphs and emoticons.
pub fn strip_emoji(text: &str) -> String {
    let without_glyphs = EMOJI.replace_all(text, "");
    let without_brackets = BRACKET_EMOTICON.replace_all(&without_glyphs, "");
    let without_faces = ASCII_EMOTICON.replace_all(&without_brackets, "${pre}${post}");
    KAOMOJI.replace_all(&without_faces, "").into_owned()
}

/// Full-width and CJK punctuation not covered by `char::is_ascii_punctuation`.
const CJK_PUNCTUATION: &str = "，。！？；：、（）《》【】“”‘’—…～·「」『』〈〉〔〕";

/// Punctuation of any script.
pub fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation() || CJK_PUNCTUATION.contains(c)
}

/// Characters that may not end a casual line.
pub fn is_terminal_punctuation(c: char) -> bool {
    is_punctuation(c)
}

/// Strips trailing punctuation and whitespace.
pub fn trim_terminal_punctuation(line: &str) -> &str {
    line.trim_end_matches(|c: char| is_terminal_punctuation(c) || c.is_whitespace())
}

/// Number of printable characters.
pub fn printable_len(text: &str) -> usize {
    text.chars().filter(|c| !c.is_control()).count()
}

/// Whether `c` belongs to a CJK ideograph block.
pub fn is_cjk(c: char) -> bool {
    matches!(
        c as u32,
        0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xF900..=0xFAFF | 0x20000..=0x2FA1F
    )
}

/// Normalized comparison key: lowercase, no emoji, no punctuation, no whitespace.
pub fn normalize(text: &str) -> String {
    strip_emoji(text)
        .chars()
        .filter(|c| !is_punctuation(*c) && !c.is_whitespace() && !c.is_control())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Tokenizes text into lowercase ASCII words and CJK character bigrams.
///
/// A CJK run of a single character yields that character as a unigram.
pub fn tokens(text: &str) -> TokenSet {
    let mut set = TokenSet::new();
    let mut word = String::new();
    let mut run: Vec<char> = Vec::new();

    let flush_word = |word: &mut String, set: &mut TokenSet| {
        if !word.is_empty() {
            set.insert(std::mem::take(word));
        }
    };
    let flush_run = |run: &mut Vec<char>, set: &mut TokenSet| {
        match run.len() {
            0 => {}
            1 => {
                set.insert(run[0].to_string());
            }
            _ => {
                for pair in run.windows(2) {
                    set.insert(pair.iter().collect());
                }
            }
        }
        run.clear();
    };

    for c in strip_emoji(text).chars() {
        if is_cjk(c) {
            flush_word(&mut word, &mut set);
            run.push(c);
        } else if c.is_alphanumeric() {
            flush_run(&mut run, &mut set);
            word.extend(c.to_lowercase());
        } else {
            flush_word(&mut word, &mut set);
            flush_run(&mut run, &mut set);
        }
    }
    flush_word(&mut word, &mut set);
    flush_run(&mut run, &mut set);
    set
}

/// Jaccard similarity of two token sets; two empty sets score 0.
pub fn jaccard(a: &TokenSet, b: &TokenSet) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Fraction of `subject` tokens present in `reference`.
pub fn coverage(subject: &TokenSet, reference: &TokenSet) -> f64 {
    if subject.is_empty() {
        return 0.0;
    }
    subject.intersection(reference).count() as f64 / subject.len() as f64
}

/// Character bigrams of a normalized key, for phrasing comparisons.
pub fn key_bigrams(key: &str) -> TokenSet {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() < 2 {
        return chars.iter().map(|c| c.to_string()).collect();
    }
    chars.windows(2).map(|pair| pair.iter().collect()).collect()
}

/// Strips a leading `name:` or `name：` prefix that models like to echo back.
pub fn strip_speaker_prefix<'a>(line: &'a str, name: &str) -> &'a str {
    let trimmed = line.trim_start();
    if let Some(rest) = trimmed.strip_prefix(name) {
        let rest = rest.trim_start();
        if let Some(rest) = rest.strip_prefix(':').or_else(|| rest.strip_prefix('：')) {
            return rest.trim_start();
        }
    }
    trimmed
}
