//! Exponential backoff
//!
//! Used by the order-number transaction (blocking, bounded) and by the push
//! feed when its initial load fails (async, until unsubscribed).

use std::time::Duration;

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first)
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Multiplier applied after each failed attempt
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(500),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Reconnection policy for push subscriptions
    pub fn reconnect() -> Self {
        Self {
            max_attempts: u32::MAX,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32) as i32;
        let millis = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exp);
        Duration::from_millis(millis as u64).min(self.max_delay)
    }
}

/// Errors that may go away on retry
pub trait IsTransient {
    fn is_transient(&self) -> bool;
}

/// Outcome of a failed retry loop
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt failed with a transient error
    Exhausted { attempts: u32, last: E },
    /// Non-transient error, not retried
    Permanent(E),
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out
///
/// Sleeps the current thread between attempts; callers are synchronous
/// storage paths.
pub fn retry_blocking<T, E, F>(config: &RetryConfig, mut operation: F) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Result<T, E>,
    E: std::fmt::Display + IsTransient,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation(attempt) {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) if !error.is_transient() => {
                return Err(RetryError::Permanent(error));
            }
            Err(error) => {
                if attempt >= config.max_attempts {
                    tracing::error!(attempt, error = %error, "Operation failed after all retries");
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: error,
                    });
                }

                let delay = config.delay_for(attempt);
                tracing::warn!(
                    attempt,
                    error = %error,
                    delay_ms = delay.as_millis() as u64,
                    "Transient failure, retrying after delay"
                );
                std::thread::sleep(delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Flaky(bool);

    impl std::fmt::Display for Flaky {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "flaky(transient={})", self.0)
        }
    }

    impl IsTransient for Flaky {
        fn is_transient(&self) -> bool {
            self.0
        }
    }

    fn fast(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            multiplier: 2.0,
        }
    }

    #[test]
    fn test_retry_succeeds_eventually() {
        let mut calls = 0;
        let result = retry_blocking(&fast(3), |_| {
            calls += 1;
            if calls < 3 { Err(Flaky(true)) } else { Ok("ok") }
        });
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_retry_exhausted() {
        let result: Result<(), _> = retry_blocking(&fast(2), |_| Err(Flaky(true)));
        match result {
            Err(RetryError::Exhausted { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_permanent_error_not_retried() {
        let mut calls = 0;
        let result: Result<(), _> = retry_blocking(&fast(5), |_| {
            calls += 1;
            Err(Flaky(false))
        });
        assert!(matches!(result, Err(RetryError::Permanent(_))));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let config = RetryConfig {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            multiplier: 2.0,
        };
        assert_eq!(config.delay_for(1), Duration::from_millis(100));
        assert_eq!(config.delay_for(2), Duration::from_millis(200));
        assert_eq!(config.delay_for(3), Duration::from_millis(350));
        assert_eq!(config.delay_for(40), Duration::from_millis(350));
    }
}
