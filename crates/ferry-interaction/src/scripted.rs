//! Offline generator that replays canned replies.

use crate::reply::parse_reply;
use async_trait::async_trait;
use ferry_core::{Draft, FerryError, GenerationRequest, ResponseGenerator, Result};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use tokio::sync::Mutex;

/// Replies from a fixed list, in order.
///
/// Each entry is post-processed like real model output, so `本轮不发言` and
/// `备选:` lines behave as they would with a live backend. Once the list is
/// used up the generator stays silent.
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
        }
    }

    /// Loads a script file. Entries are separated by blank lines so that one
    /// entry may span several lines.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            FerryError::io(format!("Failed to read script at {}: {}", path.display(), e))
        })?;
        Ok(Self::new(parse_script(&content)))
    }

    pub async fn remaining(&self) -> usize {
        self.replies.lock().await.len()
    }
}

fn parse_script(content: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                entries.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim());
        }
    }
    if !current.is_empty() {
        entries.push(current.join("\n"));
    }
    entries
}

#[async_trait]
impl ResponseGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Option<Draft>> {
        let next = self.replies.lock().await.pop_front();
        Ok(next.and_then(|raw| parse_reply(&raw, &request.persona)))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
