//! Exponential backoff schedule for export retries.
//!
//! The schedule doubles from `initial_delay` and is capped at `max_delay`.
//! The first delay that reaches the cap ends the retry sequence: no request
//! is ever sent at the capped delay.

use crate::exporter::ExporterBuildError;
use std::time::Duration;

/// Ceiling of the backoff schedule, in seconds. Reaching it stops retrying.
pub const MAX_RETRY_TIMEOUT: u64 = 64;

/// Backoff configuration for the delivery loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    initial_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(MAX_RETRY_TIMEOUT),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy doubling from `initial_delay` up to `max_delay`.
    ///
    /// A zero `initial_delay` never grows and is rejected.
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Result<Self, ExporterBuildError> {
        if initial_delay.is_zero() {
            return Err(ExporterBuildError::InvalidConfig {
                name: "retry_policy".to_string(),
                reason: "initial delay must be greater than zero".to_string(),
            });
        }
        Ok(RetryPolicy {
            initial_delay,
            max_delay,
        })
    }

    /// The first backoff delay.
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// The ceiling that terminates the schedule.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Delay for the given zero-based attempt: `initial_delay * 2^attempt`,
    /// capped at `max_delay`.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.initial_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Returns `true` once `delay` has reached the ceiling.
    pub(crate) fn is_saturated(&self, delay: Duration) -> bool {
        delay == self.max_delay
    }

    /// The delays at which requests are attempted, in order. Ends before the
    /// first saturated delay.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..)
            .map(|attempt| self.next_delay(attempt))
            .take_while(|delay| !self.is_saturated(*delay))
    }
}
