//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: backend assumed down, requests fail fast
//! - Half-Open: testing if backend recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failures >= failure_threshold
//! Open → Half-Open: reset_timeout elapsed since the last failure
//! Half-Open → Closed: successes >= success_threshold
//! Half-Open → Open: any trial call fails
//! ```
//!
//! # Design Decisions
//! - Per-dependency circuit breaker (see registry.rs), not global
//! - Fail fast in Open state (no waiting for timeout)
//! - Bookkeeping runs under one mutex that is never held across an await

use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;
use crate::resilience::error::CircuitError;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Calls pass through.
    #[default]
    Closed,
    /// Calls are rejected without contacting the dependency.
    Open,
    /// Trial calls are let through to test recovery.
    HalfOpen,
}

impl CircuitState {
    /// Gauge encoding: 0 closed, 1 half-open, 2 open.
    pub fn as_gauge(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    /// Failures since the last reset-to-zero event.
    pub failures: u32,
    /// Successes within the current HALF_OPEN window.
    pub successes: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub total_requests: u64,
    pub total_failures: u64,
}

#[derive(Debug, Default)]
struct BreakerInner {
    state: CircuitState,
    failures: u32,
    successes: u32,
    /// Monotonic instant of the last failure, drives the reset timeout.
    last_failure: Option<Instant>,
    last_failure_time: Option<DateTime<Utc>>,
    total_requests: u64,
    total_failures: u64,
}

/// A circuit breaker guarding one dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
    state_tx: watch::Sender<CircuitState>,
}

impl CircuitBreaker {
    /// Create a new breaker in the CLOSED state.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let (state_tx, _) = watch::channel(CircuitState::Closed);
        let name = name.into();
        metrics::record_circuit_state(&name, CircuitState::Closed);
        Self {
            name,
            config,
            inner: Mutex::new(BreakerInner::default()),
            state_tx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Run `operation` under breaker protection.
    ///
    /// Returns [`CircuitError::Open`] without invoking `operation` when the
    /// circuit is open, otherwise the operation's own result with any error
    /// wrapped unchanged in [`CircuitError::Inner`].
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let admitted = {
            let mut inner = self.lock();
            inner.total_requests += 1;
            self.evaluate(&mut inner);
            inner.state != CircuitState::Open
        };

        if !admitted {
            let rejected_at = Utc::now();
            tracing::debug!(
                dependency = %self.name,
                rejected_at = %rejected_at,
                "Circuit open, rejecting call"
            );
            metrics::record_circuit_rejection(&self.name);
            return Err(CircuitError::Open {
                dependency: self.name.clone(),
                rejected_at,
            });
        }

        match operation().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(error) => {
                self.on_failure(&error);
                Err(CircuitError::Inner(error))
            }
        }
    }

    /// Current state, without evaluating time-based transitions.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Snapshot of the breaker's counters.
    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self.lock();
        CircuitBreakerStats {
            state: inner.state,
            failures: inner.failures,
            successes: inner.successes,
            last_failure_time: inner.last_failure_time,
            total_requests: inner.total_requests,
            total_failures: inner.total_failures,
        }
    }

    /// Receiver that observes every state transition.
    pub fn subscribe_state(&self) -> watch::Receiver<CircuitState> {
        self.state_tx.subscribe()
    }

    /// Force the breaker CLOSED and zero every counter.
    pub fn reset(&self) {
        let mut inner = self.lock();
        let from = inner.state;
        *inner = BreakerInner::default();
        if from != CircuitState::Closed {
            self.publish(from, CircuitState::Closed, &inner);
        }
        tracing::info!(dependency = %self.name, previous_state = %from, "Circuit breaker manually reset");
    }

    fn on_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::HalfOpen => inner.successes += 1,
            CircuitState::Closed => inner.failures = 0,
            CircuitState::Open => {}
        }
        self.evaluate(&mut inner);
    }

    fn on_failure<E: fmt::Display>(&self, error: &E) {
        let mut inner = self.lock();
        inner.total_failures += 1;
        inner.failures = inner.failures.saturating_add(1);
        inner.last_failure = Some(Instant::now());
        inner.last_failure_time = Some(Utc::now());
        inner.successes = 0;

        tracing::debug!(
            dependency = %self.name,
            state = %inner.state,
            failures = inner.failures,
            failure_threshold = self.config.failure_threshold,
            error = %error,
            "Guarded call failed"
        );

        if inner.state == CircuitState::HalfOpen {
            self.transition(&mut inner, CircuitState::Open);
        } else {
            self.evaluate(&mut inner);
        }
    }

    /// Apply at most one time/counter driven transition.
    fn evaluate(&self, inner: &mut BreakerInner) {
        match inner.state {
            CircuitState::Closed if inner.failures >= self.config.failure_threshold => {
                inner.last_failure = Some(Instant::now());
                inner.last_failure_time = Some(Utc::now());
                self.transition(inner, CircuitState::Open);
            }
            CircuitState::Open => {
                let elapsed = inner.last_failure.map(|at| at.elapsed());
                if elapsed.map_or(true, |e| e >= self.config.reset_timeout()) {
                    inner.successes = 0;
                    self.transition(inner, CircuitState::HalfOpen);
                }
            }
            CircuitState::HalfOpen if inner.successes >= self.config.success_threshold => {
                inner.failures = 0;
                self.transition(inner, CircuitState::Closed);
            }
            _ => {}
        }
    }

    fn transition(&self, inner: &mut BreakerInner, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        self.publish(from, to, inner);
    }

    fn publish(&self, from: CircuitState, to: CircuitState, inner: &BreakerInner) {
        let message = match to {
            CircuitState::Open => "Circuit breaker opened",
            CircuitState::HalfOpen => "Circuit breaker half-open, allowing trial calls",
            CircuitState::Closed => "Circuit breaker closed",
        };
        if to == CircuitState::Open {
            tracing::warn!(
                dependency = %self.name,
                from = %from,
                to = %to,
                failures = inner.failures,
                failure_threshold = self.config.failure_threshold,
                reset_timeout_ms = self.config.reset_timeout_ms,
                last_failure_time = ?inner.last_failure_time,
                "{}",
                message
            );
        } else {
            tracing::info!(
                dependency = %self.name,
                from = %from,
                to = %to,
                failures = inner.failures,
                successes = inner.successes,
                success_threshold = self.config.success_threshold,
                "{}",
                message
            );
        }

        metrics::record_circuit_transition(&self.name, from, to);
        metrics::record_circuit_state(&self.name, to);
        self.state_tx.send_replace(to);
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::error::BackendError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn breaker(failure_threshold: u32, success_threshold: u32, reset_timeout_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold,
                success_threshold,
                timeout_ms: 1_000,
                reset_timeout_ms,
            },
        )
    }

    async fn fail(cb: &CircuitBreaker) -> Result<(), CircuitError<BackendError>> {
        cb.execute(|| async { Err(BackendError::http(500, "boom")) }).await
    }

    async fn succeed(cb: &CircuitBreaker) -> Result<(), CircuitError<BackendError>> {
        cb.execute(|| async { Ok::<_, BackendError>(()) }).await
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_and_short_circuits() {
        let cb = breaker(5, 2, 30_000);
        for _ in 0..5 {
            let err = fail(&cb).await.unwrap_err();
            assert!(!err.is_open(), "dependency errors pass through unchanged");
        }
        assert_eq!(cb.state(), CircuitState::Open);

        let invoked = AtomicU32::new(0);
        let result = cb
            .execute(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok::<_, BackendError>(())
            })
            .await;

        assert!(result.unwrap_err().is_open());
        assert_eq!(invoked.load(Ordering::SeqCst), 0);

        let stats = cb.stats();
        assert_eq!(stats.total_requests, 6);
        assert_eq!(stats.total_failures, 5);
        assert!(stats.last_failure_time.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_reset_timeout() {
        let cb = breaker(5, 2, 30_000);
        for _ in 0..5 {
            let _ = fail(&cb).await;
        }

        tokio::time::advance(Duration::from_millis(29_999)).await;
        assert!(succeed(&cb).await.unwrap_err().is_open());
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(1)).await;
        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert_eq!(cb.stats().successes, 1);

        succeed(&cb).await.unwrap();
        let stats = cb.stats();
        assert_eq!(stats.state, CircuitState::Closed);
        assert_eq!(stats.failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_success_recovery_scenario() {
        let cb = breaker(3, 1, 1_000);
        for _ in 0..3 {
            let _ = fail(&cb).await;
        }
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(1_001)).await;
        succeed(&cb).await.unwrap();

        let stats = cb.stats();
        assert_eq!(stats.state, CircuitState::Closed);
        assert_eq!(stats.failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens() {
        let cb = breaker(2, 2, 1_000);
        let _ = fail(&cb).await;
        let _ = fail(&cb).await;
        tokio::time::advance(Duration::from_millis(1_000)).await;

        let err = fail(&cb).await.unwrap_err();
        assert!(!err.is_open());
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.stats().successes, 0);

        // The reset timeout restarts from the failed trial.
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(succeed(&cb).await.unwrap_err().is_open());
    }

    #[tokio::test]
    async fn test_success_clears_failures_in_closed() {
        let cb = breaker(3, 1, 1_000);
        let _ = fail(&cb).await;
        let _ = fail(&cb).await;
        assert_eq!(cb.stats().failures, 2);

        succeed(&cb).await.unwrap();
        assert_eq!(cb.stats().failures, 0);

        let _ = fail(&cb).await;
        let _ = fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_reset_zeroes_everything() {
        let cb = breaker(1, 1, 60_000);
        let _ = fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Open);

        cb.reset();
        let stats = cb.stats();
        assert_eq!(stats.state, CircuitState::Closed);
        assert_eq!(stats.failures, 0);
        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.total_failures, 0);
        assert!(stats.last_failure_time.is_none());
        succeed(&cb).await.unwrap();
    }

    #[tokio::test]
    async fn test_state_subscription_sees_transitions() {
        let cb = breaker(1, 1, 60_000);
        let mut rx = cb.subscribe_state();
        assert_eq!(*rx.borrow(), CircuitState::Closed);

        let _ = fail(&cb).await;
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), CircuitState::Open);

        cb.reset();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_concurrent_calls_keep_counters_consistent() {
        let cb = std::sync::Arc::new(breaker(1_000, 1, 1_000));
        let mut handles = Vec::new();
        for i in 0..50 {
            let cb = cb.clone();
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    let _ = fail(&cb).await;
                } else {
                    let _ = succeed(&cb).await;
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let stats = cb.stats();
        assert_eq!(stats.total_requests, 50);
        assert_eq!(stats.total_failures, 25);
        assert!(stats.total_failures <= stats.total_requests);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(CircuitState::HalfOpen.to_string(), "HALF_OPEN");
        assert_eq!(serde_json::to_string(&CircuitState::HalfOpen).unwrap(), "\"HALF_OPEN\"");
    }
}
