//! Retry policy for per-recipient delivery.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Backoff {
    /// Waits `step_secs * (i + 1)` after failed attempt `i`.
    Linear {
        /// Increment per attempt, in seconds.
        step_secs: u64,
    },
    /// Waits `base_secs * 2^i` after failed attempt `i`, capped at `max_secs`.
    Exponential {
        /// Delay after the first failure, in seconds.
        base_secs: u64,
        /// Upper bound for any single delay, in seconds.
        max_secs: u64,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Linear { step_secs: 5 }
    }
}

impl Backoff {
    /// Delay after the failed attempt with zero-based index `attempt`.
    #[must_use]
    pub fn delay(self, attempt: u32) -> Duration {
        let secs = match self {
            Self::Linear { step_secs } => step_secs.saturating_mul(u64::from(attempt) + 1),
            Self::Exponential {
                base_secs,
                max_secs,
            } => {
                let factor = 1_u64.checked_shl(attempt).unwrap_or(u64::MAX);
                base_secs.saturating_mul(factor).min(max_secs)
            }
        };
        Duration::from_secs(secs)
    }
}

/// How many times a recipient is tried and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per recipient, including the first one.
    ///
    /// Default: 3. Zero is treated as one.
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Delay schedule.
    ///
    /// Default: linear, 5 second steps.
    #[serde(default)]
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            backoff: Backoff::default(),
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the attempt limit.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Overrides the delay schedule.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Attempts actually made, never less than one.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        if self.max_attempts == 0 {
            1
        } else {
            self.max_attempts
        }
    }

    /// Check if this is the final attempt.
    #[must_use]
    pub const fn is_final_attempt(&self, attempt: u32) -> bool {
        attempt + 1 >= self.attempts()
    }

    /// Delay after the failed attempt with zero-based index `attempt`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}

mod defaults {
    pub const fn max_attempts() -> u32 {
        3
    }
}
