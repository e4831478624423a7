//! Active health probing.
//!
//! # Responsibilities
//! - Periodically probe the backend with a hard per-call timeout
//! - Keep the last known status
//! - Notify subscribers of every result, in registration order

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::health::status::HealthStatus;
use crate::health::target::ProbeTarget;
use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;

/// Callback invoked with every probe result.
pub type Listener = Arc<dyn Fn(&HealthStatus) + Send + Sync>;

type Listeners = Mutex<Vec<(u64, Listener)>>;

/// Handle returned by [`HealthProbe::subscribe`].
///
/// Dropping the handle keeps the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: u64,
    listeners: Weak<Listeners>,
}

impl Subscription {
    /// Remove the listener. Calling this more than once is a no-op.
    pub fn unsubscribe(&self) {
        if let Some(listeners) = self.listeners.upgrade() {
            lock(&*listeners).retain(|(id, _)| *id != self.id);
        }
    }
}

struct PeriodicTask {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Periodic reachability prober for one dependency.
pub struct HealthProbe {
    name: String,
    target: Arc<dyn ProbeTarget>,
    timeout: Duration,
    last_status: ArcSwapOption<HealthStatus>,
    listeners: Arc<Listeners>,
    /// Serializes storing a result with delivering it, so every listener
    /// sees results in the order they were stored.
    delivery: Mutex<()>,
    next_id: AtomicU64,
    periodic: Mutex<Option<PeriodicTask>>,
}

impl HealthProbe {
    pub fn new(name: impl Into<String>, target: Arc<dyn ProbeTarget>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            target,
            timeout,
            last_status: ArcSwapOption::empty(),
            listeners: Arc::new(Mutex::new(Vec::new())),
            delivery: Mutex::new(()),
            next_id: AtomicU64::new(0),
            periodic: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The most recent probe result, if any check has completed.
    pub fn last_status(&self) -> Option<HealthStatus> {
        self.last_status.load_full().map(|s| (*s).clone())
    }

    /// Probe the backend once, store the result, and notify subscribers.
    pub async fn check_health(&self) -> HealthStatus {
        let start = Instant::now();
        let outcome = with_deadline(self.timeout, self.target.probe()).await;
        let status = HealthStatus::from_outcome(outcome, start.elapsed());

        let was_healthy = self.last_status.load().as_ref().map(|s| s.healthy);
        if status.healthy {
            tracing::debug!(
                dependency = %self.name,
                target = %self.target.describe(),
                response_time_ms = status.response_time_ms,
                status = ?status.status,
                timestamp = %status.timestamp,
                "Health check passed"
            );
            if was_healthy == Some(false) {
                tracing::info!(dependency = %self.name, "Backend reachable again");
            }
        } else {
            tracing::warn!(
                dependency = %self.name,
                target = %self.target.describe(),
                response_time_ms = status.response_time_ms,
                status = ?status.status,
                error = status.error.as_deref().unwrap_or("unknown"),
                timestamp = %status.timestamp,
                "Health check failed"
            );
        }
        metrics::record_probe(&self.name, status.healthy, start.elapsed());

        {
            let _ordered = lock(&self.delivery);
            self.last_status.store(Some(Arc::new(status.clone())));
            self.notify(&status);
        }
        status
    }

    /// Register a listener. If a result already exists it is delivered
    /// before this call returns.
    ///
    /// Must not be called from inside a listener.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&HealthStatus) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let listener: Listener = Arc::new(callback);
        {
            let _ordered = lock(&self.delivery);
            lock(&*self.listeners).push((id, listener.clone()));
            if let Some(last) = self.last_status.load_full() {
                self.deliver(&listener, &last);
            }
        }

        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&*self.listeners).len()
    }

    /// Check now, then every `interval`. Replaces a running timer.
    pub fn start_periodic_check(self: &Arc<Self>, interval: Duration) {
        let interval = interval.max(Duration::from_millis(1));
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let probe = Arc::clone(self);

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        probe.check_health().await;
                    }
                    _ = &mut stop_rx => {
                        tracing::debug!(dependency = %probe.name, "Periodic health check loop exiting");
                        break;
                    }
                }
            }
        });

        let previous = lock(&self.periodic).replace(PeriodicTask { stop: stop_tx, handle });
        if let Some(previous) = previous {
            let _ = previous.stop.send(());
            tracing::debug!(dependency = %self.name, "Replaced running periodic health check");
        }

        tracing::info!(
            dependency = %self.name,
            interval_ms = interval.as_millis() as u64,
            timeout_ms = self.timeout.as_millis() as u64,
            "Periodic health check started"
        );
    }

    /// Cancel the timer. An in-flight check still completes.
    pub fn stop_periodic_check(&self) {
        if let Some(task) = lock(&self.periodic).take() {
            let _ = task.stop.send(());
            tracing::info!(dependency = %self.name, "Periodic health check stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.periodic)
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    fn notify(&self, status: &HealthStatus) {
        let listeners: Vec<Listener> = lock(&*self.listeners)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in &listeners {
            self.deliver(listener, status);
        }
    }

    fn deliver(&self, listener: &Listener, status: &HealthStatus) {
        if catch_unwind(AssertUnwindSafe(|| listener(status))).is_err() {
            tracing::error!(dependency = %self.name, "Health subscriber panicked");
        }
    }
}

impl std::fmt::Debug for HealthProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthProbe")
            .field("name", &self.name)
            .field("target", &self.target.describe())
            .field("timeout", &self.timeout)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
