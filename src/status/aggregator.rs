//! Status aggregation.
//!
//! Composes the breaker's state and the probe's latest result into one
//! [`AggregatedStatus`], published over a `watch` channel so consumers see
//! every change.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::health::{HealthProbe, HealthStatus, Subscription};
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::resilience::error::Classify;
use crate::status::banner::BannerState;

/// Most recent error reported by any caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastError {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub status: Option<u16>,
}

/// Unified, consumer-facing view of the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregatedStatus {
    /// Latest probe result; `None` before the first probe.
    pub health: Option<HealthStatus>,
    pub circuit_state: CircuitState,
    pub is_degraded: bool,
    pub last_error: Option<LastError>,
}

impl AggregatedStatus {
    pub fn banner(&self) -> BannerState {
        BannerState::from_status(self)
    }
}

struct AggregatorState {
    breaker: Arc<CircuitBreaker>,
    tx: watch::Sender<AggregatedStatus>,
    degraded_threshold_ms: u64,
}

impl AggregatorState {
    fn update_health(&self, status: HealthStatus) {
        let is_degraded = status.is_degraded(self.degraded_threshold_ms);
        self.tx.send_modify(|current| {
            // Read under the channel's write lock so a concurrent follower
            // update cannot be overwritten with an older state.
            let circuit_state = self.breaker.state();
            if current.is_degraded != is_degraded {
                tracing::info!(
                    dependency = %self.breaker.name(),
                    is_degraded,
                    response_time_ms = status.response_time_ms,
                    healthy = status.healthy,
                    "Degraded mode changed"
                );
            }
            current.health = Some(status);
            current.is_degraded = is_degraded;
            current.circuit_state = circuit_state;
        });
    }

    fn set_circuit_state(&self, state: CircuitState) {
        self.tx.send_if_modified(|current| {
            if current.circuit_state == state {
                return false;
            }
            current.circuit_state = state;
            true
        });
    }
}

struct Monitoring {
    subscription: Subscription,
    follower: JoinHandle<()>,
}

/// Owns the monitoring lifecycle for one dependency.
pub struct StatusAggregator {
    state: Arc<AggregatorState>,
    probe: Arc<HealthProbe>,
    interval: Duration,
    monitoring: Mutex<Option<Monitoring>>,
}

impl StatusAggregator {
    pub fn new(
        breaker: Arc<CircuitBreaker>,
        probe: Arc<HealthProbe>,
        interval: Duration,
        degraded_threshold_ms: u64,
    ) -> Self {
        let initial = AggregatedStatus {
            circuit_state: breaker.state(),
            ..AggregatedStatus::default()
        };
        let (tx, _) = watch::channel(initial);
        Self {
            state: Arc::new(AggregatorState {
                breaker,
                tx,
                degraded_threshold_ms,
            }),
            probe,
            interval,
            monitoring: Mutex::new(None),
        }
    }

    /// Subscribe to the probe, start periodic checks, and follow the
    /// breaker. Does nothing if monitoring is already running.
    pub fn start_monitoring(&self) {
        let mut monitoring = self.lock();
        if monitoring.is_some() {
            tracing::debug!("Monitoring already running");
            return;
        }

        let weak: Weak<AggregatorState> = Arc::downgrade(&self.state);
        let subscription = self.probe.subscribe(move |status| {
            if let Some(state) = weak.upgrade() {
                state.update_health(status.clone());
            }
        });

        self.probe.start_periodic_check(self.interval);

        let state = Arc::clone(&self.state);
        let mut states = state.breaker.subscribe_state();
        state.set_circuit_state(*states.borrow_and_update());
        let follower = tokio::spawn(async move {
            while states.changed().await.is_ok() {
                let next = *states.borrow_and_update();
                state.set_circuit_state(next);
            }
        });

        *monitoring = Some(Monitoring { subscription, follower });
        tracing::info!(
            dependency = %self.state.breaker.name(),
            interval_ms = self.interval.as_millis() as u64,
            "Status monitoring started"
        );
    }

    /// Tear down the subscription, timer and breaker follower. Held state
    /// is kept as is.
    pub fn stop_monitoring(&self) {
        if let Some(monitoring) = self.lock().take() {
            monitoring.subscription.unsubscribe();
            monitoring.follower.abort();
            self.probe.stop_periodic_check();
            tracing::info!(dependency = %self.state.breaker.name(), "Status monitoring stopped");
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.lock().is_some()
    }

    /// Store a probe result and refresh the circuit state in the same update.
    pub fn update_health(&self, status: HealthStatus) {
        self.state.update_health(status);
    }

    /// Remember an error a caller saw. Does not touch health or degraded state.
    pub fn record_error<E: Classify + ?Sized>(&self, error: &E) {
        let last = LastError {
            message: error.to_string(),
            timestamp: Utc::now(),
            status: error.status(),
        };
        self.state.tx.send_modify(|current| current.last_error = Some(last));
    }

    /// Receiver that observes every change.
    pub fn subscribe(&self) -> watch::Receiver<AggregatedStatus> {
        self.state.tx.subscribe()
    }

    pub fn current(&self) -> AggregatedStatus {
        self.state.tx.borrow().clone()
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.state.breaker
    }

    pub fn probe(&self) -> &Arc<HealthProbe> {
        &self.probe
    }

    fn lock(&self) -> MutexGuard<'_, Option<Monitoring>> {
        self.monitoring.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for StatusAggregator {
    fn drop(&mut self) {
        self.stop_monitoring();
    }
}
