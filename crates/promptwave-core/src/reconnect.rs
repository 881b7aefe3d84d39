//! Reconnect policy and retry bookkeeping.
//!
//! [`ReconnectPolicy`] is a pure decision: given how many retries already
//! happened, either retry after `2^retry_count * base_delay` or give up.
//! [`ReconnectState`] is the mutable counter the session actor owns; it also
//! makes sure only one retry is outstanding at a time.

use std::time::Duration;

/// Outcome of asking the policy about the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Try again after `delay`. `attempt` is 1-based.
    Retry {
        /// 1-based attempt number.
        attempt: u32,
        /// Backoff before the attempt starts.
        delay: Duration,
    },
    /// No attempts left.
    Exhausted,
}

/// Exponential backoff policy.
///
/// # Example
///
/// ```rust
/// use promptwave_core::{ReconnectDecision, ReconnectPolicy};
/// use std::time::Duration;
///
/// let policy = ReconnectPolicy::default();
/// assert_eq!(
///     policy.decide(3),
///     ReconnectDecision::Retry { attempt: 4, delay: Duration::from_secs(8) }
/// );
/// assert_eq!(policy.decide(5), ReconnectDecision::Exhausted);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    max_retries: u32,
    base_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_RETRIES, Self::DEFAULT_BASE_DELAY)
    }
}

impl ReconnectPolicy {
    /// Default number of retries before falling back.
    pub const DEFAULT_MAX_RETRIES: u32 = 5;
    /// Default base delay.
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

    /// Create a policy.
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Maximum number of retries.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before the first retry.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Backoff for the retry following `retry_count` earlier retries.
    ///
    /// Saturates instead of overflowing for absurd counts.
    pub fn backoff(&self, retry_count: u32) -> Duration {
        let factor = 1u32.checked_shl(retry_count).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Decide whether another attempt is allowed.
    pub fn decide(&self, retry_count: u32) -> ReconnectDecision {
        if retry_count < self.max_retries {
            ReconnectDecision::Retry {
                attempt: retry_count + 1,
                delay: self.backoff(retry_count),
            }
        } else {
            ReconnectDecision::Exhausted
        }
    }
}

/// Retry counter and in-flight flag.
///
/// `retry_count` stays within `[0, max_retries]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconnectState {
    retry_count: u32,
    is_reconnecting: bool,
}

impl ReconnectState {
    /// Fresh state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Retries performed since the last healthy connection.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Whether a retry is scheduled or in flight.
    pub fn is_reconnecting(&self) -> bool {
        self.is_reconnecting
    }

    /// Register a failure and consult the policy.
    ///
    /// Returns `None` while a retry is already outstanding, so a second
    /// failure never schedules a duplicate attempt. On `Retry` the counter
    /// is incremented and the state becomes reconnecting.
    pub fn begin_retry(&mut self, policy: &ReconnectPolicy) -> Option<ReconnectDecision> {
        if self.is_reconnecting {
            return None;
        }
        let decision = policy.decide(self.retry_count);
        if let ReconnectDecision::Retry { .. } = decision {
            self.retry_count += 1;
            self.is_reconnecting = true;
        }
        Some(decision)
    }

    /// The outstanding attempt failed; the next failure may schedule again.
    pub fn attempt_failed(&mut self) {
        self.is_reconnecting = false;
    }

    /// A healthy session was confirmed.
    pub fn succeed(&mut self) {
        *self = Self::default();
    }

    /// Drop any outstanding retry without touching the counter.
    pub fn cancel(&mut self) {
        self.is_reconnecting = false;
    }

    /// Forget everything (explicit stop).
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
