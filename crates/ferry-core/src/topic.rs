//! Topic relevance filtering.
//!
//! When the latest message has nothing to do with what came before, earlier
//! entries are left out of the context the other components see. The
//! canonical window is never touched; the filter only derives a sub-window.

use crate::message::Message;
use crate::text::{self, TokenSet};
use serde::{Deserialize, Serialize};
use strum::Display;

/// Upper bound on the preceding entries the incoming message is compared
/// against. A window only holds `capacity - 1` of them, so the default window
/// of 3 compares against 2.
pub const TOPIC_LOOKBACK: usize = 3;

/// Relation of the incoming message to the recent conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TopicShift {
    /// There is no earlier context to compare against.
    Opening,
    /// The message continues the current subject.
    Continuing,
    /// The message starts a new subject.
    NewTopic,
}

/// Result of a relevance assessment.
#[derive(Debug, Clone)]
pub struct TopicVerdict<'a> {
    pub shift: TopicShift,
    /// Fraction of the incoming tokens found in the preceding entries.
    pub score: f64,
    /// Context to use downstream, ending with the incoming message.
    pub view: Vec<&'a Message>,
}

impl TopicVerdict<'_> {
    /// Entries of the view before the incoming message.
    pub fn prior(&self) -> &[&Message] {
        match self.view.split_last() {
            Some((_, prior)) => prior,
            None => &[],
        }
    }
}

/// Keyword-overlap relevance test.
#[derive(Debug, Clone)]
pub struct TopicRelevanceFilter {
    threshold: f64,
    lookback: usize,
}

impl TopicRelevanceFilter {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            lookback: TOPIC_LOOKBACK,
        }
    }

    /// A filter whose lookback fits a window of `capacity` entries.
    pub fn for_window(threshold: f64, capacity: usize) -> Self {
        Self {
            threshold,
            lookback: TOPIC_LOOKBACK.min(capacity.saturating_sub(1)),
        }
    }

    /// Number of preceding entries compared.
    pub fn lookback(&self) -> usize {
        self.lookback
    }

    /// Assesses `context`, whose last entry is the incoming message.
    ///
    /// The score is the share of the incoming message's tokens that appear in
    /// the union of the up to [`lookback`](Self::lookback) preceding entries.
    /// Using a set union keeps the score independent of the order of those
    /// entries.
    pub fn assess<'a>(&self, context: &[&'a Message]) -> TopicVerdict<'a> {
        let Some((incoming, prior)) = context.split_last() else {
            return TopicVerdict {
                shift: TopicShift::Opening,
                score: 0.0,
                view: Vec::new(),
            };
        };

        let skip = prior.len().saturating_sub(self.lookback);
        let compared = &prior[skip..];
        if compared.is_empty() {
            return TopicVerdict {
                shift: TopicShift::Opening,
                score: 0.0,
                view: vec![*incoming],
            };
        }

        let reference: TokenSet = compared
            .iter()
            .flat_map(|m| text::tokens(&m.text_content()))
            .collect();
        let score = text::coverage(&text::tokens(&incoming.text_content()), &reference);

        if score >= self.threshold {
            let mut view: Vec<&'a Message> = compared.to_vec();
            view.push(*incoming);
            TopicVerdict {
                shift: TopicShift::Continuing,
                score,
                view,
            }
        } else {
            TopicVerdict {
                shift: TopicShift::NewTopic,
                score,
                view: vec![*incoming],
            }
        }
    }
}
