//! Bounded retry with exponential backoff
//!
//! Only errors that report [`SubmitError::is_retryable`] are retried. The
//! delay before attempt `n + 1` is `base * 2^n`, capped at `max_delay`; a
//! rate limit's `retry_after` wins when it asks for longer.

use std::time::Duration;

use crate::adapter::{Result, SubmitError};
use crate::config::RetryConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// A policy that makes a single attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32, error: &SubmitError) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        let backoff = self.base_delay.saturating_mul(factor).min(self.max_delay);
        match error {
            SubmitError::RateLimited { retry_after_secs } => {
                backoff.max(Duration::from_secs(*retry_after_secs).min(self.max_delay))
            }
            _ => backoff,
        }
    }

    /// Run `op`, retrying retryable failures with `std::thread::sleep`.
    pub fn run<T>(&self, operation: &str, op: impl FnMut(u32) -> Result<T>) -> Result<T> {
        self.run_with_sleep(operation, op, std::thread::sleep)
    }

    /// Like [`run`](Self::run) with an injectable sleep.
    pub fn run_with_sleep<T>(
        &self,
        operation: &str,
        mut op: impl FnMut(u32) -> Result<T>,
        mut sleep: impl FnMut(Duration),
    ) -> Result<T> {
        let mut attempt = 0;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt + 1 < self.max_attempts => {
                    let delay = self.delay_for(attempt, &e);
                    tracing::warn!(
                        operation,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after retryable failure"
                    );
                    sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1_000),
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = policy();
        let e = SubmitError::Transient("x".into());
        assert_eq!(p.delay_for(0, &e), Duration::from_millis(100));
        assert_eq!(p.delay_for(1, &e), Duration::from_millis(200));
        assert_eq!(p.delay_for(2, &e), Duration::from_millis(400));
        assert_eq!(p.delay_for(10, &e), Duration::from_millis(1_000));
    }

    #[test]
    fn retry_after_is_honoured_up_to_the_cap() {
        let mut p = policy();
        p.max_delay = Duration::from_secs(60);
        let e = SubmitError::RateLimited { retry_after_secs: 7 };
        assert_eq!(p.delay_for(0, &e), Duration::from_secs(7));
        let e = SubmitError::RateLimited { retry_after_secs: 600 };
        assert_eq!(p.delay_for(0, &e), Duration::from_secs(60));
    }

    #[test]
    fn transient_failures_are_retried_until_success() {
        let mut sleeps = Vec::new();
        let result = policy().run_with_sleep(
            "commit",
            |attempt| {
                if attempt < 2 {
                    Err(SubmitError::Transient("503".into()))
                } else {
                    Ok(attempt)
                }
            },
            |d| sleeps.push(d),
        );
        assert_eq!(result.unwrap(), 2);
        assert_eq!(sleeps, vec![Duration::from_millis(100), Duration::from_millis(200)]);
    }

    #[test]
    fn attempts_are_bounded() {
        let mut calls = 0;
        let result: Result<()> = policy().run_with_sleep(
            "commit",
            |_| {
                calls += 1;
                Err(SubmitError::Transient("down".into()))
            },
            |_| {},
        );
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[test]
    fn validation_failures_are_not_retried() {
        let mut calls = 0;
        let result: Result<()> = policy().run_with_sleep(
            "commit",
            |_| {
                calls += 1;
                Err(SubmitError::Validation("bad path".into()))
            },
            |_| panic!("must not sleep"),
        );
        assert!(matches!(result, Err(SubmitError::Validation(_))));
        assert_eq!(calls, 1);
    }
}
