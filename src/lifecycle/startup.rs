//! Startup orchestration.
//!
//! # Responsibilities
//! - Build every breaker, probe and aggregator from configuration
//! - Compose retry, breaker and deadline into one guarded call
//! - Start and stop background monitoring
//!
//! # Design Decisions
//! - Fail fast: an invalid probe URL is a startup error
//! - Subsystems are built in order: breakers, probe, aggregator

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

use crate::config::GuardConfig;
use crate::health::{HealthProbe, HttpProbeTarget, ProbeTarget};
use crate::resilience::error::{BackendError, CircuitError};
use crate::resilience::registry::BreakerRegistry;
use crate::resilience::retries::retry_with_backoff;
use crate::resilience::timeouts::with_deadline;
use crate::resilience::CircuitBreaker;
use crate::status::StatusAggregator;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid health check URL: {0}")]
    ProbeUrl(#[from] url::ParseError),
}

/// Everything that protects calls to the backend service.
pub struct GuardContext {
    config: GuardConfig,
    registry: BreakerRegistry,
    breaker: Arc<CircuitBreaker>,
    aggregator: StatusAggregator,
}

impl GuardContext {
    /// Build a context that probes the configured backend over HTTP.
    pub fn from_config(config: GuardConfig) -> Result<Self, StartupError> {
        let target = HttpProbeTarget::new(&config.backend.base_url, &config.health_check.path)?;
        Ok(Self::with_target(config, Arc::new(target)))
    }

    /// Build a context around a custom probe target.
    pub fn with_target(config: GuardConfig, target: Arc<dyn ProbeTarget>) -> Self {
        let registry = BreakerRegistry::new(config.circuit_breaker.clone());
        let breaker = registry.get_or_create(&config.backend.name);

        let probe = Arc::new(HealthProbe::new(
            config.backend.name.clone(),
            target,
            config.health_check.timeout(),
        ));
        let aggregator = StatusAggregator::new(
            breaker.clone(),
            probe,
            config.health_check.interval(),
            config.health_check.degraded_threshold_ms,
        );

        tracing::debug!(
            dependency = %config.backend.name,
            failure_threshold = config.circuit_breaker.failure_threshold,
            success_threshold = config.circuit_breaker.success_threshold,
            timeout_ms = config.circuit_breaker.timeout_ms,
            reset_timeout_ms = config.circuit_breaker.reset_timeout_ms,
            max_retries = config.retries.max_retries,
            "Guard context built"
        );

        Self {
            config,
            registry,
            breaker,
            aggregator,
        }
    }

    /// Start background monitoring if health checks are enabled.
    pub fn start(&self) {
        if self.config.health_check.enabled {
            self.aggregator.start_monitoring();
        } else {
            tracing::info!("Active health checks disabled");
        }
    }

    pub fn stop(&self) {
        self.aggregator.stop_monitoring();
    }

    /// Call the backend through retry, circuit breaker, and deadline.
    ///
    /// Any final error is recorded as the aggregator's last error.
    pub async fn call<F, Fut, T>(&self, operation: F) -> Result<T, CircuitError<BackendError>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        self.guarded(&self.breaker, operation).await
    }

    /// Same as [`GuardContext::call`], for a named secondary dependency
    /// with its own breaker.
    pub async fn call_dependency<F, Fut, T>(
        &self,
        dependency: &str,
        operation: F,
    ) -> Result<T, CircuitError<BackendError>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let breaker = self.registry.get_or_create(dependency);
        self.guarded(&breaker, operation).await
    }

    async fn guarded<F, Fut, T>(
        &self,
        breaker: &CircuitBreaker,
        operation: F,
    ) -> Result<T, CircuitError<BackendError>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let limit = breaker.config().timeout();
        // The operation is only invoked once the breaker has admitted the call.
        let operation = Mutex::new(operation);
        let operation = &operation;
        let result = retry_with_backoff(&self.config.retries, move || {
            breaker.execute(move || {
                let attempt = (operation.lock().unwrap_or_else(PoisonError::into_inner))();
                with_deadline(limit, attempt)
            })
        })
        .await;

        if let Err(err) = &result {
            self.aggregator.record_error(err);
        }
        result
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn registry(&self) -> &BreakerRegistry {
        &self.registry
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn probe(&self) -> &Arc<HealthProbe> {
        self.aggregator.probe()
    }

    pub fn aggregator(&self) -> &StatusAggregator {
        &self.aggregator
    }
}
