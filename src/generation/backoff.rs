use std::num::NonZeroU32;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: NonZeroU32 = match NonZeroU32::new(5) {
    Some(n) => n,
    None => unreachable!(),
};

pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Immutable retry settings, fixed at client construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total requests allowed per call, the first one included.
    pub max_attempts: NonZeroU32,
    /// Wait after the first transient failure; doubles after each subsequent one.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn start_with(&self, max_attempts: NonZeroU32) -> RetryState {
        RetryState {
            attempt: 0,
            delay: self.base_delay,
            max_attempts: max_attempts.get(),
        }
    }
}

/// Per-call retry bookkeeping. Created fresh for every call, never shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    attempt: u32,
    delay: Duration,
    max_attempts: u32,
}

impl RetryState {
    /// 0-based index of the attempt about to be (or being) made.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// True while making the final permitted attempt.
    pub fn is_last_attempt(&self) -> bool {
        self.attempt + 1 >= self.max_attempts
    }

    /// Record a transient failure: returns the wait to observe before the next
    /// attempt, then doubles the delay and bumps the attempt counter.
    ///
    /// Growth is uncapped; only arithmetic overflow saturates.
    pub fn advance(&mut self) -> Duration {
        let wait = self.delay;
        self.delay = self.delay.checked_mul(2).unwrap_or(Duration::MAX);
        self.attempt += 1;
        wait
    }
}
