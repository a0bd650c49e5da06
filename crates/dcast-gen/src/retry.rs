//! Bounded retry with exponential backoff for generation calls.

use std::time::Duration;

use tracing::warn;

use crate::error::{GenError, GenResult};

/// Retry policy: `base * 2^attempt`, capped at `max_delay_ms`.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            base_delay_ms: 500,
            max_delay_ms: 2000,
        }
    }
}

impl RetryConfig {
    pub fn with_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(exp.min(self.max_delay_ms))
    }
}

/// Run `op`, retrying transient failures up to `config.max_retries` times.
/// Non-transient errors are returned immediately.
pub async fn retry_async<T, F, Fut>(config: &RetryConfig, operation: &str, op: F) -> GenResult<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = GenResult<T>>,
{
    let mut last_error = None;

    for attempt in 0..=config.max_retries {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < config.max_retries => {
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    operation,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| GenError::request_failed(format!("{operation} failed"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_is_capped() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(config.delay_for_attempt(5), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 2,
        };

        let result = retry_async(&config, "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(GenError::request_failed("503 unavailable"))
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fatal_error_fails_fast() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::with_retries(3);

        let result: GenResult<()> = retry_async(&config, "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(GenError::validation("bad input"))
        })
        .await;

        assert!(matches!(result, Err(GenError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausts_retries_and_returns_last_error() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 1,
        };

        let result: GenResult<()> = retry_async(&config, "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(GenError::request_failed("rate limit hit"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
