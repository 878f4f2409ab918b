//! # Fibonacci Backoff
//!
//! Spaces repeated failures of the same object on the unclassified error
//! path. The sequence is expressed in minutes (1, 1, 2, 3, 5, 8, 10) and
//! grows more slowly than an exponential backoff.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Fibonacci backoff calculator.
///
/// Each value is the sum of the previous two, capped at `max_minutes`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_minutes: u64,
    prev_minutes: u64,
    current_minutes: u64,
    max_minutes: u64,
}

impl FibonacciBackoff {
    /// Create a backoff whose sequence starts at `min_minutes` and is
    /// capped at `max_minutes`.
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            min_minutes,
            prev_minutes: 0,
            current_minutes: min_minutes,
            max_minutes,
        }
    }

    /// Return the current delay and advance the sequence.
    pub fn next_backoff(&mut self) -> Duration {
        let delay = Duration::from_secs(self.current_minutes * 60);

        let next_minutes = self.prev_minutes + self.current_minutes;
        self.prev_minutes = self.current_minutes;
        self.current_minutes = next_minutes.min(self.max_minutes);

        delay
    }

    /// Restart the sequence from the minimum.
    pub fn reset(&mut self) {
        self.prev_minutes = 0;
        self.current_minutes = self.min_minutes;
    }
}

impl Default for FibonacciBackoff {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

/// Backoff state per object, keyed by `namespace/name` and kind.
#[derive(Debug, Default)]
pub struct BackoffTracker {
    states: Mutex<HashMap<String, FibonacciBackoff>>,
}

impl BackoffTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Next delay for `key`, advancing its sequence.
    pub fn next(&self, key: &str) -> Duration {
        let mut states = self.states.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        states.entry(key.to_string()).or_default().next_backoff()
    }

    /// Forget the failures recorded for `key`.
    pub fn reset(&self, key: &str) {
        let mut states = self.states.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        states.remove(key);
    }
}
