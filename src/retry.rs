//! Retry with exponential backoff for session operations.

use futures::future::BoxFuture;
use std::time::Duration;

use crate::constants::{INITIAL_RETRY_DELAY_MS, MAX_RETRY_DELAY_SECS};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(INITIAL_RETRY_DELAY_MS),
            max_delay: Duration::from_secs(MAX_RETRY_DELAY_SECS),
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
        }
    }

    /// Default delays with a custom attempt budget.
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }
}

/// Run `operation` against `ctx`, retrying with exponentially increasing
/// delays (capped at `config.max_delay`) up to `config.max_retries` times.
///
/// The context is lent to each attempt, so the operation can borrow it
/// mutably, e.g. a session that has to reconnect:
///
/// ```ignore
/// with_retry(&config, &mut session, |s| s.connect()).await?;
/// ```
///
/// Returns the first success, or the last error once retries are exhausted.
pub async fn with_retry<C, F, T, E>(
    config: &RetryConfig,
    ctx: &mut C,
    mut operation: F,
) -> Result<T, E>
where
    C: ?Sized,
    F: for<'c> FnMut(&'c mut C) -> BoxFuture<'c, Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempts = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation(&mut *ctx).await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempts += 1;
                if attempts > config.max_retries {
                    return Err(e);
                }

                tracing::warn!(
                    "Operation failed (attempt {}/{}): {:#}. Retrying in {:?}...",
                    attempts,
                    config.max_retries + 1,
                    e,
                    delay
                );

                tokio::time::sleep(delay).await;

                delay = (delay * 2).min(config.max_delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    /// Fails until it has been called `succeed_on` times.
    struct Flaky {
        calls: u32,
        succeed_on: u32,
    }

    impl Flaky {
        fn new(succeed_on: u32) -> Self {
            Self {
                calls: 0,
                succeed_on,
            }
        }

        fn attempt(&mut self) -> BoxFuture<'_, Result<i32, String>> {
            async move {
                self.calls += 1;
                if self.calls >= self.succeed_on {
                    Ok(42)
                } else {
                    Err(format!("failure {}", self.calls))
                }
            }
            .boxed()
        }
    }

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig::new(max_retries, Duration::from_millis(1), Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_retry_success_first_attempt() {
        let mut flaky = Flaky::new(1);
        let result = with_retry(&fast_config(3), &mut flaky, |f| f.attempt()).await;

        assert_eq!(result, Ok(42));
        assert_eq!(flaky.calls, 1);
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let mut flaky = Flaky::new(3);
        let result = with_retry(&fast_config(3), &mut flaky, |f| f.attempt()).await;

        assert_eq!(result, Ok(42));
        assert_eq!(flaky.calls, 3);
    }

    #[tokio::test]
    async fn test_retry_exhausted() {
        let mut flaky = Flaky::new(u32::MAX);
        let result = with_retry(&fast_config(2), &mut flaky, |f| f.attempt()).await;

        assert_eq!(result, Err("failure 3".to_string()));
        assert_eq!(flaky.calls, 3); // 1 initial + 2 retries
    }

    #[tokio::test]
    async fn test_zero_retries_tries_once() {
        let mut flaky = Flaky::new(2);
        let result = with_retry(&fast_config(0), &mut flaky, |f| f.attempt()).await;

        assert!(result.is_err());
        assert_eq!(flaky.calls, 1);
    }
}
