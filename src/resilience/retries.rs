//! Retry logic.
//!
//! # Responsibilities
//! - Determine if an error is retryable (status set or code/message marker)
//! - Execute retries with exponential backoff + jitter
//! - Report every retry and every terminal failure
//!
//! # Design Decisions
//! - Non-retryable errors stop the loop on first occurrence
//! - The caller always receives the last underlying error, never a wrapper
//! - Only idempotent operations should be handed to the retry loop

use std::future::Future;

use crate::config::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::error::Classify;

/// Return true if the error's status is in `retryable_statuses`, or its
/// code or message contains one of `retryable_errors`.
pub fn is_retryable<E: Classify + ?Sized>(error: &E, config: &RetryConfig) -> bool {
    if let Some(status) = error.status() {
        if config.retryable_statuses.contains(&status) {
            return true;
        }
    }

    let code = error.code().unwrap_or_default();
    let message = error.to_string();
    config
        .retryable_errors
        .iter()
        .filter(|marker| !marker.is_empty())
        .any(|marker| code.contains(marker.as_str()) || message.contains(marker.as_str()))
}

/// Run `operation` with retries, without a retry hook.
pub async fn retry_with_backoff<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify,
{
    retry_with_notify(config, operation, |_, _| {}).await
}

/// Run `operation` up to `max_retries + 1` times.
///
/// `on_retry` is called with the 1-based retry number and the error that
/// triggered it, before the backoff sleep.
pub async fn retry_with_notify<F, Fut, T, E, N>(
    config: &RetryConfig,
    mut operation: F,
    mut on_retry: N,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify,
    N: FnMut(u32, &E),
{
    let max_attempts = config.max_retries.saturating_add(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !is_retryable(&error, config) {
            tracing::debug!(
                attempt,
                error = %error,
                status = ?error.status(),
                "Non-retryable error, giving up"
            );
            return Err(error);
        }

        if attempt >= max_attempts {
            tracing::error!(
                attempts = attempt,
                max_retries = config.max_retries,
                error = %error,
                status = ?error.status(),
                "Retries exhausted"
            );
            metrics::record_retry_exhausted();
            return Err(error);
        }

        let delay = calculate_backoff(attempt - 1, config);
        tracing::warn!(
            attempt,
            max_retries = config.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            status = ?error.status(),
            code = ?error.code(),
            "Retrying after retryable error"
        );
        metrics::record_retry(attempt);
        on_retry(attempt, &error);

        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::error::{BackendError, CircuitError};
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    #[test]
    fn test_status_classification() {
        let config = RetryConfig::default();
        assert!(is_retryable(&BackendError::http(503, "unavailable"), &config));
        assert!(!is_retryable(&BackendError::http(404, "not found"), &config));
        assert!(!is_retryable(&BackendError::http(401, "unauthorized"), &config));
    }

    #[test]
    fn test_marker_classification() {
        let config = RetryConfig::default();
        assert!(is_retryable(&BackendError::transport("ECONNRESET", "socket hang up"), &config));
        assert!(is_retryable(&BackendError::transport("EIO", "upstream NETWORK_ERROR"), &config));
        assert!(is_retryable(&BackendError::Timeout { after: Duration::from_secs(5) }, &config));
        assert!(!is_retryable(&BackendError::transport("EPROTO", "bad frame"), &config));
    }

    #[test]
    fn test_circuit_open_not_retryable() {
        let err: CircuitError<BackendError> = CircuitError::Open {
            dependency: "backend".into(),
            rejected_at: Utc::now(),
        };
        assert!(!is_retryable(&err, &RetryConfig::default()));

        let err: CircuitError<BackendError> = CircuitError::Inner(BackendError::http(502, "bad gateway"));
        assert!(is_retryable(&err, &RetryConfig::default()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fails_twice_then_succeeds() {
        let config = RetryConfig { max_retries: 3, ..RetryConfig::default() };
        let calls = Arc::new(AtomicU32::new(0));
        let mut retries = Vec::new();

        let result = retry_with_notify(
            &config,
            || {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(BackendError::http(503, "unavailable"))
                    } else {
                        Ok("done")
                    }
                }
            },
            |attempt, _err| retries.push(attempt),
        )
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(retries, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_stops_immediately() {
        let config = RetryConfig::default();
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let result: Result<(), _> = retry_with_backoff(&config, || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(BackendError::http(400, "bad request"))
            }
        })
        .await;

        assert_eq!(result, Err(BackendError::http(400, "bad request")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let config = RetryConfig { max_retries: 2, ..RetryConfig::default() };
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let result: Result<(), _> = retry_with_backoff(&config, || {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(BackendError::transport("ECONNRESET", format!("attempt {n}")))
            }
        })
        .await;

        assert_eq!(result, Err(BackendError::transport("ECONNRESET", "attempt 2")));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1000 + 2000 ms of base delay, plus under 1000 ms jitter per sleep
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(3_000));
        assert!(elapsed < Duration::from_millis(5_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_is_single_attempt() {
        let config = RetryConfig { max_retries: 0, ..RetryConfig::default() };
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = retry_with_backoff(&config, || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(BackendError::http(503, "unavailable"))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
