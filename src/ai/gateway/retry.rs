//! Retry policy and sleeping seam for the completion gateway

use async_trait::async_trait;
use backon::{BackoffBuilder, ExponentialBuilder};
use std::time::Duration;

use crate::constants::gateway as gateway_constants;
use crate::types::{ErrorCategory, LlmError};

// =============================================================================
// Sleeper
// =============================================================================

/// Waits between attempts. Tests substitute a recorder.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

// =============================================================================
// Retry Policy
// =============================================================================

/// Exponential backoff: `base_delay`, then doubling, for `max_retries` retries.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: usize,
    base_delay: Duration,
    factor: f32,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: gateway_constants::MAX_RETRIES,
            base_delay: Duration::from_secs(gateway_constants::BASE_DELAY_SECS),
            factor: gateway_constants::BACKOFF_FACTOR,
            max_delay: Duration::from_secs(gateway_constants::MAX_DELAY_SECS),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Total attempts including the first one
    pub fn max_attempts(&self) -> usize {
        self.max_retries + 1
    }

    /// Computed waits, one per retry; exhausted once no retries remain
    pub fn backoff(&self) -> impl Iterator<Item = Duration> + Send + use<> {
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_factor(self.factor)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
            .build()
    }

    /// Wait before retrying after `err`. A rate-limit hint replaces the
    /// computed delay.
    pub fn wait_for(&self, err: &LlmError, computed: Duration) -> Duration {
        match (err.category, err.retry_after) {
            (ErrorCategory::RateLimit, Some(hint)) => hint,
            _ => computed,
        }
    }
}

/// Parse a `Retry-After` header carrying whole seconds
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backoff_doubles() {
        let delays: Vec<_> = RetryPolicy::default().backoff().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
    }

    #[test]
    fn test_fourth_retry_waits_eight_seconds() {
        let delays: Vec<_> = RetryPolicy::default()
            .with_max_retries(4)
            .backoff()
            .collect();
        assert_eq!(delays.last(), Some(&Duration::from_secs(8)));
        assert_eq!(RetryPolicy::default().max_attempts(), 4);
    }

    #[test]
    fn test_no_retries() {
        let policy = RetryPolicy::default().with_max_retries(0);
        assert_eq!(policy.backoff().count(), 0);
    }

    #[test]
    fn test_rate_limit_hint_overrides() {
        let policy = RetryPolicy::default();
        let computed = Duration::from_secs(1);

        let limited = LlmError::from_status(429, "slow down").retry_after(Duration::from_secs(7));
        assert_eq!(policy.wait_for(&limited, computed), Duration::from_secs(7));

        let server = LlmError::from_status(503, "busy");
        assert_eq!(policy.wait_for(&server, computed), computed);
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after(" 3 "), Some(Duration::from_secs(3)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(parse_retry_after("-1"), None);
    }
}
