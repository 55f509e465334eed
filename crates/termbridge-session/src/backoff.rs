//! Reconnection pacing: exponential backoff with jitter.
//!
//! A [`BackoffPolicy`] is a pure calculator: it performs no I/O and owns
//! no timers. The proxy asks it two questions after every disconnect:
//! "should I try again?" and "how long should I wait?", and tells it two
//! things: "an attempt happened" and "we're connected again, start over".
//!
//! Jitter spreads reconnect storms out: when many sessions drop at the
//! same instant (say, a backend restart), identical delays would have them
//! all redial in lockstep. A random additive offset desynchronizes them.

use std::time::Duration;

use rand::Rng;

// ---------------------------------------------------------------------------
// BackoffConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`BackoffPolicy`]. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Delay before the first retry. Doubles on every recorded attempt.
    ///
    /// Default: 1 second.
    pub initial_delay: Duration,

    /// Upper bound on the computed (unjittered) delay.
    ///
    /// Default: 30 seconds.
    pub max_delay: Duration,

    /// Additive random range on top of the computed delay: every delay
    /// gets `uniform(0..=jitter)` added. Zero disables jitter.
    ///
    /// Default: 1 second.
    pub jitter: Duration,

    /// How many attempts to allow before giving up. `None` retries
    /// forever.
    ///
    /// Default: `None`.
    pub max_attempts: Option<u32>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            jitter: Duration::from_millis(1000),
            max_attempts: None,
        }
    }
}

// ---------------------------------------------------------------------------
// BackoffPolicy
// ---------------------------------------------------------------------------

/// Exponential-backoff calculator for one session's reconnection lifecycle.
///
/// Created when the session is, reset on every successful reattachment.
///
/// ```
/// use termbridge_session::{BackoffConfig, BackoffPolicy};
/// use std::time::Duration;
///
/// let mut policy = BackoffPolicy::new(BackoffConfig {
///     jitter: Duration::ZERO,
///     ..BackoffConfig::default()
/// });
///
/// assert_eq!(policy.next_delay(), Duration::from_secs(1));
/// policy.record_attempt();
/// assert_eq!(policy.next_delay(), Duration::from_secs(2));
/// policy.reset();
/// assert_eq!(policy.next_delay(), Duration::from_secs(1));
/// ```
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    config: BackoffConfig,
    attempts: u32,
}

impl BackoffPolicy {
    /// Creates a policy with the given configuration and zero attempts.
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    /// The delay to wait before the next reconnection attempt:
    /// `min(max_delay, initial_delay * 2^attempts) + uniform(0..=jitter)`.
    ///
    /// Never returns less than the unjittered base for the current attempt
    /// count. Deterministic aside from the jitter term.
    pub fn next_delay(&self) -> Duration {
        let base = self.base_delay_ms();
        let jitter_range = self.config.jitter.as_millis() as u64;
        let jitter = if jitter_range == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_range)
        };
        Duration::from_millis(base.saturating_add(jitter))
    }

    /// The unjittered delay in milliseconds for the current attempt count.
    ///
    /// The exponent math saturates and the result is capped by `max_delay`;
    /// the attempt counter itself is never clamped.
    fn base_delay_ms(&self) -> u64 {
        let initial = self.config.initial_delay.as_millis() as u64;
        let max = self.config.max_delay.as_millis() as u64;
        let factor = 1u64.checked_shl(self.attempts).unwrap_or(u64::MAX);
        initial.saturating_mul(factor).min(max)
    }

    /// Records that a reconnection attempt happened.
    pub fn record_attempt(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }

    /// Forgets all recorded attempts. Called after a successful
    /// reattachment so the next disconnect starts from `initial_delay`.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Whether another attempt is allowed: `attempts < max_attempts`, or
    /// always `true` when no limit is configured.
    pub fn should_retry(&self) -> bool {
        match self.config.max_attempts {
            Some(max) => self.attempts < max,
            None => true,
        }
    }

    /// Number of attempts recorded since creation or the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

// =========================================================================
// Tests
// =========================================================================
