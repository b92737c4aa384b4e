//! Rate limiting of unprompted group participation.

use crate::config::CadenceConfig;
use chrono::{DateTime, Utc};

/// Tracks when the persona last chimed in without being asked.
///
/// Time is taken from message timestamps so that replays behave the same as
/// live traffic.
#[derive(Debug, Clone)]
pub struct CadenceTracker {
    config: CadenceConfig,
    last_attempt: Option<DateTime<Utc>>,
    ignored: usize,
}

impl CadenceTracker {
    pub fn new(config: CadenceConfig) -> Self {
        Self {
            config,
            last_attempt: None,
            ignored: 0,
        }
    }

    /// Returns `true` when an unprompted attempt at `at` is allowed.
    ///
    /// An allowed attempt resets the counters; a refused one counts as ignored.
    pub fn admit(&mut self, at: DateTime<Utc>) -> bool {
        if let Some(last) = self.last_attempt {
            let elapsed = (at - last).num_seconds();
            let min_interval = i64::try_from(self.config.min_interval_secs).unwrap_or(i64::MAX);
            let too_soon = elapsed < min_interval;
            if too_soon || self.ignored < self.config.max_ignored {
                self.ignored += 1;
                return false;
            }
        }
        self.last_attempt = Some(at);
        self.ignored = 0;
        true
    }

    pub fn ignored(&self) -> usize {
        self.ignored
    }
}
