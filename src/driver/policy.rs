// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Poll backoff policy

use std::time::Duration;

/// Exponential backoff between status polls
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Delay after the first poll
    pub initial_interval: Duration,
    /// Upper bound for any single delay
    pub max_interval: Duration,
    /// Growth factor per attempt (values below 1.0 are treated as 1.0)
    pub multiplier: f64,
}

impl PollPolicy {
    /// Fixed delay between polls
    pub fn fixed(interval: Duration) -> Self {
        Self {
            initial_interval: interval,
            max_interval: interval,
            multiplier: 1.0,
        }
    }

    /// Delay to wait after poll number `attempt` (zero-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let floor = Duration::from_millis(1);
        let factor = self.multiplier.max(1.0).powi(attempt.min(64) as i32);
        let scaled = self.initial_interval.as_secs_f64() * factor;

        let delay = if scaled.is_finite() && scaled < self.max_interval.as_secs_f64() {
            Duration::from_secs_f64(scaled)
        } else {
            self.max_interval
        };

        delay.max(floor)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}
