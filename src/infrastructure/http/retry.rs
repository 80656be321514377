use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::time::Duration;

use crate::domain::models::RetryConfig;

/// Retry budget and backoff schedule for transient failures
///
/// Delays double with each retry starting at `initial_backoff`, capped at
/// `max_backoff`, optionally randomized by `jitter` (0 disables jitter).
/// Retry decisions themselves belong to the caller; this type only answers
/// "how many" and "how long".
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
    jitter: f64,
}

impl RetryPolicy {
    /// Create a new retry policy without jitter
    ///
    /// # Example
    /// ```
    /// use ledgerbridge::infrastructure::http::RetryPolicy;
    ///
    /// let policy = RetryPolicy::new(3, 500, 10_000);
    /// assert_eq!(policy.max_retries(), 3);
    /// ```
    pub const fn new(max_retries: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff: Duration::from_millis(max_backoff_ms),
            jitter: 0.0,
        }
    }

    /// Randomize each delay by up to `factor` of its nominal value
    #[must_use]
    pub fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter = factor.clamp(0.0, 0.99);
        self
    }

    /// Maximum retries after the first failed attempt
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Whether another retry is allowed after `retries_done` retries
    pub const fn allows_retry(&self, retries_done: u32) -> bool {
        retries_done < self.max_retries
    }

    /// Nominal delay before retry number `retry` (0-indexed), without jitter
    ///
    /// Formula: min(initial_backoff * 2^retry, max_backoff)
    pub fn nominal_backoff(&self, retry: u32) -> Duration {
        let initial_ms = u64::try_from(self.initial_backoff.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(self.max_backoff.as_millis()).unwrap_or(u64::MAX);
        let backoff_ms = initial_ms
            .saturating_mul(2_u64.saturating_pow(retry))
            .min(max_ms);

        Duration::from_millis(backoff_ms)
    }

    /// Fresh delay sequence for one fetch
    pub fn schedule(&self) -> BackoffSchedule {
        let inner = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_backoff)
            .with_multiplier(2.0)
            .with_randomization_factor(self.jitter)
            .with_max_interval(self.max_backoff)
            .with_max_elapsed_time(None)
            .build();

        BackoffSchedule {
            inner,
            fallback: self.max_backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            config.initial_backoff_ms,
            config.max_backoff_ms,
        )
        .with_jitter(config.jitter)
    }
}

/// Successive backoff delays of a single fetch
pub struct BackoffSchedule {
    inner: ExponentialBackoff,
    fallback: Duration,
}

impl std::fmt::Debug for BackoffSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackoffSchedule")
            .field("current_interval", &self.inner.current_interval)
            .finish_non_exhaustive()
    }
}

impl BackoffSchedule {
    /// Delay before the next retry
    pub fn next_delay(&mut self) -> Duration {
        self.inner.next_backoff().unwrap_or(self.fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close_to(actual: Duration, expected: Duration) -> bool {
        actual.abs_diff(expected) < Duration::from_micros(1)
    }

    #[test]
    fn test_nominal_backoff() {
        let policy = RetryPolicy::new(5, 1000, 60000);

        assert_eq!(policy.nominal_backoff(0), Duration::from_millis(1000));
        assert_eq!(policy.nominal_backoff(1), Duration::from_millis(2000));
        assert_eq!(policy.nominal_backoff(2), Duration::from_millis(4000));
        assert_eq!(policy.nominal_backoff(5), Duration::from_millis(32000));
        assert_eq!(policy.nominal_backoff(6), Duration::from_millis(60000));
        assert_eq!(policy.nominal_backoff(63), Duration::from_millis(60000));
    }

    #[test]
    fn test_schedule_without_jitter_follows_nominal_backoff() {
        let policy = RetryPolicy::new(5, 100, 1000);
        let mut schedule = policy.schedule();

        for retry in 0..6 {
            let delay = schedule.next_delay();
            assert!(
                close_to(delay, policy.nominal_backoff(retry)),
                "retry {retry}: got {delay:?}, expected {:?}",
                policy.nominal_backoff(retry)
            );
        }
    }

    #[test]
    fn test_schedule_with_jitter_stays_in_band() {
        let policy = RetryPolicy::new(3, 1000, 60000).with_jitter(0.5);
        let mut schedule = policy.schedule();

        let first = schedule.next_delay();
        assert!(first >= Duration::from_millis(500));
        assert!(first <= Duration::from_millis(1501));
    }

    #[test]
    fn test_allows_retry() {
        let policy = RetryPolicy::new(2, 100, 1000);
        assert!(policy.allows_retry(0));
        assert!(policy.allows_retry(1));
        assert!(!policy.allows_retry(2));
    }

    #[test]
    fn test_from_config() {
        let policy = RetryPolicy::from(&RetryConfig::default());
        assert_eq!(policy.max_retries(), 3);
        assert_eq!(policy.nominal_backoff(0), Duration::from_millis(500));
        assert_eq!(policy.nominal_backoff(10), Duration::from_millis(10_000));
    }
}
