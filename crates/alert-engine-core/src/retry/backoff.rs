//! Delay schedule for retry sessions

use std::time::Duration;

use crate::error::{Error, Result};

/// Cursor over a fixed, non-decreasing list of delays.
///
/// Once the cursor reaches the last entry it stays there, so the final delay
/// repeats indefinitely. A schedule is stateful: build a fresh one for every
/// independent retry session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffSchedule {
    delays: Vec<Duration>,
    position: usize,
}

impl BackoffSchedule {
    /// Default delays: 100ms, 250ms, 500ms, 1s, then 2s forever
    pub const DEFAULT_MILLIS: [u64; 5] = [100, 250, 500, 1_000, 2_000];

    /// Create a schedule from an explicit list of delays
    pub fn new(delays: Vec<Duration>) -> Result<Self> {
        if delays.is_empty() {
            return Err(Error::validation("backoff schedule must not be empty"));
        }
        Ok(Self { delays, position: 0 })
    }

    /// Create a schedule from delays expressed in milliseconds
    pub fn from_millis(millis: &[u64]) -> Result<Self> {
        Self::new(millis.iter().copied().map(Duration::from_millis).collect())
    }

    /// Return the delay at the cursor and move the cursor forward,
    /// saturating at the last entry.
    pub fn advance(&mut self) -> Duration {
        let delay = self.delays[self.position];
        if self.position + 1 < self.delays.len() {
            self.position += 1;
        }
        delay
    }

    /// The configured delays
    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self {
            delays: Self::DEFAULT_MILLIS
                .iter()
                .copied()
                .map(Duration::from_millis)
                .collect(),
            position: 0,
        }
    }
}
