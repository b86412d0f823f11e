//! Per-tile retry budget.

use std::time::Duration;

use super::types::AttemptError;

/// Requests per tile, counting the first.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Wait after the first failed attempt; doubles on each further failure.
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 100;

/// Ceiling on a single back-off wait.
pub const MAX_BACKOFF_SECS: u64 = 30;

/// How often a tile is requested before its failure ends the fetch.
///
/// Only failures [`AttemptError::is_retryable`] accepts spend the budget;
/// anything else is final on the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_ATTEMPTS)
    }
}

impl RetryPolicy {
    /// `attempts` requests in total, at least one.
    pub fn new(attempts: u32) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
        }
    }

    /// One request, never retried.
    pub fn single() -> Self {
        Self::new(1)
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Wait before the next request after attempt `attempt` (1-based)
    /// failed with `error`, or `None` when that failure is final.
    pub fn retry_after(&self, attempt: u32, error: &AttemptError) -> Option<Duration> {
        if !error.is_retryable() || attempt >= self.attempts {
            return None;
        }
        let doublings = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1 << doublings);
        Some(delay.min(Duration::from_secs(MAX_BACKOFF_SECS)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_error() -> AttemptError {
        AttemptError::Status(503)
    }

    #[test]
    fn test_default_budget() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts(), 3);
        assert_eq!(policy.retry_after(1, &server_error()), Some(Duration::from_millis(100)));
        assert_eq!(policy.retry_after(2, &server_error()), Some(Duration::from_millis(200)));
        assert_eq!(policy.retry_after(3, &server_error()), None);
    }

    #[test]
    fn test_final_failures_are_not_retried() {
        let policy = RetryPolicy::new(5);
        assert_eq!(policy.retry_after(1, &AttemptError::Status(403)), None);
        assert!(policy
            .retry_after(1, &AttemptError::Timeout(Duration::from_secs(60)))
            .is_some());
    }

    #[test]
    fn test_single_attempt() {
        let policy = RetryPolicy::single();
        assert_eq!(policy.attempts(), 1);
        assert_eq!(policy.retry_after(1, &server_error()), None);
        assert_eq!(RetryPolicy::new(0), policy);
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::new(40).with_base_delay(Duration::from_secs(1));
        assert_eq!(policy.retry_after(3, &server_error()), Some(Duration::from_secs(4)));
        assert_eq!(policy.retry_after(6, &server_error()), Some(Duration::from_secs(30)));
        assert_eq!(policy.retry_after(39, &server_error()), Some(Duration::from_secs(30)));
    }
}
