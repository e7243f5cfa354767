//! Retry policy for failed long polls.
//!
//! A failed `connect` is retried after an exponentially growing delay with
//! jitter. A successful poll resets the schedule. When a bound on consecutive
//! failures is configured and exceeded, the poll loop gives up.

use std::time::Duration;

use rand::Rng;

/// How the poll loop reacts to transport failures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Give up after this many consecutive failures. `None` retries forever.
    pub max_consecutive_failures: Option<u32>,
    /// Delay after the first failure.
    pub base_delay: Duration,
    /// Upper bound on the delay.
    pub max_delay: Duration,
    /// Randomization factor in `[0.0, 1.0]`, applied as ±jitter.
    pub jitter: f64,
}

impl RetryPolicy {
    /// Default bound on consecutive failures.
    pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 10;

    /// Retry forever with the default delays.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            max_consecutive_failures: None,
            ..Self::default()
        }
    }

    /// Give up after `max` consecutive failures.
    #[must_use]
    pub fn with_max_consecutive_failures(mut self, max: Option<u32>) -> Self {
        self.max_consecutive_failures = max;
        self
    }

    /// Set the base and maximum delay. `max_delay` is raised to `base_delay`
    /// if smaller.
    #[must_use]
    pub fn with_delays(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay.max(base_delay);
        self
    }

    /// Set the jitter factor, clamped to `[0.0, 1.0]`.
    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = if jitter.is_finite() {
            jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }
}

impl Default for RetryPolicy {
    /// At most 10 consecutive failures, 250 ms doubling up to 10 s, ±20%.
    fn default() -> Self {
        Self {
            max_consecutive_failures: Some(Self::DEFAULT_MAX_CONSECUTIVE_FAILURES),
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
            jitter: 0.2,
        }
    }
}

/// What to do after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the given delay, then poll again.
    RetryAfter(Duration),
    /// The failure bound was exceeded.
    GiveUp,
}

/// Failure counter and delay schedule driven by a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    consecutive_failures: u32,
}

impl Backoff {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            consecutive_failures: 0,
        }
    }

    /// Number of failures since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Record a successful poll.
    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Record a failure and decide whether to retry.
    pub fn on_failure(&mut self, rng: &mut impl Rng) -> RetryDecision {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if let Some(max) = self.policy.max_consecutive_failures {
            if self.consecutive_failures > max {
                return RetryDecision::GiveUp;
            }
        }
        RetryDecision::RetryAfter(self.delay(rng))
    }

    /// `min(base * 2^(failures - 1), max)`, scaled by a factor drawn from
    /// `[1 - jitter, 1 + jitter]`.
    fn delay(&self, rng: &mut impl Rng) -> Duration {
        let exponent = self.consecutive_failures.saturating_sub(1).min(31);
        let delay = self
            .policy
            .base_delay
            .saturating_mul(1_u32 << exponent)
            .min(self.policy.max_delay);

        let jitter = self.policy.jitter;
        if jitter <= 0.0 {
            return delay;
        }
        delay.mul_f64(rng.gen_range(1.0 - jitter..=1.0 + jitter))
    }
}
