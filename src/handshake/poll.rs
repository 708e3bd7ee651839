//! Bounded poll-with-backoff for the inviter's connection list.

use std::time::Duration;

/// How long and how often to look for the incoming connection request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay before the second snapshot
    pub initial_interval: Duration,
    /// Upper bound for any single delay
    pub max_interval: Duration,
    /// Delay multiplier per attempt (1 = fixed interval)
    pub backoff_factor: u32,
    /// Total wait budget, measured from the first snapshot
    pub max_wait: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(250),
            max_interval: Duration::from_secs(2),
            backoff_factor: 2,
            max_wait: Duration::from_secs(30),
        }
    }
}

impl PollPolicy {
    /// Fixed-interval policy, mostly for tests.
    pub fn fixed(interval: Duration, max_wait: Duration) -> Self {
        Self {
            initial_interval: interval,
            max_interval: interval,
            backoff_factor: 1,
            max_wait,
        }
    }

    /// Delay after the `attempt`-th empty snapshot (0-based):
    /// `initial_interval * backoff_factor^attempt`, capped at `max_interval`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.max(1).saturating_pow(attempt);
        self.initial_interval
            .saturating_mul(factor)
            .min(self.max_interval)
    }

    /// `delay_for(attempt)` clipped so the next snapshot lands no later than
    /// the deadline. `None` once the budget is spent.
    pub fn next_delay(&self, attempt: u32, elapsed: Duration) -> Option<Duration> {
        let remaining = self.max_wait.checked_sub(elapsed)?;
        if remaining.is_zero() {
            return None;
        }
        Some(self.delay_for(attempt).min(remaining))
    }
}
