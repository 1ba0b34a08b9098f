//! Fixed-budget retries with exponential backoff

use std::fmt::Display;
use std::time::Duration;

use crate::core::config::CollaboratorConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

/// Result of a retried call together with how many attempts it took
#[derive(Debug)]
pub struct Attempted<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
        }
    }

    pub fn from_config(config: &CollaboratorConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.backoff_base_ms))
    }

    /// No sleeping between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// Delay after the `attempt`-th failure (1-based): base * 2^(attempt-1)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor)
    }

    /// Call `op` until it succeeds or the budget is spent
    pub fn run<T, E, F>(&self, label: &str, mut op: F) -> Attempted<T, E>
    where
        E: Display,
        F: FnMut() -> Result<T, E>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op() {
                Ok(value) => {
                    return Attempted {
                        result: Ok(value),
                        attempts: attempt,
                    }
                }
                Err(e) if attempt >= self.max_attempts => {
                    tracing::warn!("{} failed after {} attempts: {}", label, attempt, e);
                    return Attempted {
                        result: Err(e),
                        attempts: attempt,
                    };
                }
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    tracing::debug!("{} attempt {} failed ({}), retrying in {:?}", label, attempt, e, delay);
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&CollaboratorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn test_succeeds_after_transient_failures() {
        let policy = RetryPolicy::immediate(3);
        let mut calls = 0;
        let outcome = policy.run("test", || {
            calls += 1;
            if calls < 3 {
                Err("flaky")
            } else {
                Ok(calls)
            }
        });
        assert_eq!(outcome.result, Ok(3));
        assert_eq!(outcome.attempts, 3);
    }

    #[test]
    fn test_gives_up_after_budget() {
        let policy = RetryPolicy::immediate(3);
        let mut calls = 0;
        let outcome: Attempted<(), &str> = policy.run("test", || {
            calls += 1;
            Err("down")
        });
        assert!(outcome.result.is_err());
        assert_eq!(calls, 3);
        assert_eq!(outcome.attempts, 3);
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        let policy = RetryPolicy::immediate(0);
        let outcome: Attempted<(), &str> = policy.run("test", || Err("down"));
        assert_eq!(outcome.attempts, 1);
    }
}
