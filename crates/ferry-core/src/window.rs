//! Bounded conversation window.

use crate::message::{Message, MessageId};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// Ordered buffer of the most recent messages of one conversation.
///
/// Entries are kept in chronological order and message ids are unique.
/// Appending beyond capacity evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct ConversationWindow {
    capacity: usize,
    entries: VecDeque<Message>,
}

impl ConversationWindow {
    /// Creates an empty window. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends a message, keeping chronological order.
    ///
    /// A message that arrives out of order is placed at its timestamp position
    /// (after entries with the same timestamp). Returns `false` when the message
    /// was not stored: its id is already present, or the window is full and the
    /// message is older than everything in it.
    pub fn append(&mut self, message: Message) -> bool {
        if self.contains(message.id()) {
            return false;
        }

        let position = self
            .entries
            .iter()
            .rposition(|entry| entry.timestamp() <= message.timestamp())
            .map(|index| index + 1)
            .unwrap_or(0);

        if self.entries.len() == self.capacity {
            if position == 0 {
                return false;
            }
            self.entries.pop_front();
            self.entries.insert(position - 1, message);
        } else {
            self.entries.insert(position, message);
        }
        true
    }

    /// The last `n` messages, most recent last.
    pub fn recent(&self, n: usize) -> Vec<&Message> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).collect()
    }

    /// Entries up to and including the message with `id`.
    ///
    /// Empty when the message is not (or no longer) in the window.
    pub fn context_for(&self, id: &MessageId) -> Vec<&Message> {
        match self.entries.iter().position(|entry| entry.id() == id) {
            Some(index) => self.entries.iter().take(index + 1).collect(),
            None => Vec::new(),
        }
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.entries.iter().any(|entry| entry.id() == id)
    }

    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.entries.back().map(Message::timestamp)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter()
    }
}
