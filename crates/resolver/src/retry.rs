//! Retry logic with exponential backoff

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
    /// Whether the operation should be attempted again.
    fn is_retryable(&self) -> bool;
}

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Base for exponential backoff calculation
    pub exponential_base: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            exponential_base: 2.0,
        }
    }
}

/// Execute an async operation with retry logic
///
/// Only errors reporting [`Retryable::is_retryable`] are retried. Before
/// each wait `on_retry` gets the failed attempt number, its error and the
/// delay before the next attempt.
///
/// # Errors
///
/// Returns the first non-retryable error, or the last error once all
/// attempts are spent
pub async fn with_retry<T, E, F, Fut, N>(
    config: &RetryConfig,
    mut operation: F,
    mut on_retry: N,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
    N: FnMut(u32, &E, Duration),
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_retryable() || attempt >= config.max_attempts => return Err(e),
            Err(e) => {
                tracing::warn!(
                    "Operation failed (attempt {}/{}): {}. Retrying in {:?}",
                    attempt,
                    config.max_attempts,
                    e,
                    delay
                );
                on_retry(attempt, &e, delay);

                tokio::time::sleep(delay).await;

                let next_delay = delay.mul_f32(config.exponential_base);
                delay = next_delay.min(config.max_delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct Flaky(bool);

    impl Display for Flaky {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "flaky")
        }
    }

    impl Retryable for Flaky {
        fn is_retryable(&self) -> bool {
            self.0
        }
    }

    fn ignore(_: u32, _: &Flaky, _: Duration) {}

    fn fast() -> RetryConfig {
        RetryConfig {
            initial_delay: Duration::from_millis(1),
            ..RetryConfig::default()
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = &AtomicU32::new(0);
        let result: Result<u32, Flaky> = with_retry(
            &fast(),
            move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 { Err(Flaky(true)) } else { Ok(n) }
            },
            ignore,
        )
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), Flaky> = with_retry(
            &fast(),
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Flaky(true))
            },
            ignore,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), Flaky> = with_retry(
            &fast(),
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Flaky(false))
            },
            ignore,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_on_retry_sees_each_failure() {
        let calls = &AtomicU32::new(0);
        let mut seen = Vec::new();
        let result: Result<(), Flaky> = with_retry(
            &fast(),
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Flaky(true))
            },
            |attempt, e, delay| seen.push((attempt, e.to_string(), delay)),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(
            seen,
            vec![
                (1, "flaky".to_string(), Duration::from_millis(1)),
                (2, "flaky".to_string(), Duration::from_millis(2)),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_is_capped() {
        let config = RetryConfig {
            max_attempts: 6,
            initial_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(5),
            exponential_base: 2.0,
        };
        let start = tokio::time::Instant::now();
        let _: Result<(), Flaky> = with_retry(&config, || async { Err(Flaky(true)) }, ignore).await;
        // 4s, then four capped waits of 5s
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(24), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(25), "{elapsed:?}");
    }
}
