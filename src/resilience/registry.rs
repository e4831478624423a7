//! Per-dependency circuit breakers.
//!
//! Every dependency gets its own breaker, created on first use from the
//! registry's default configuration. The registry is owned by the
//! application context; nothing here is process-global.

use std::sync::Arc;

use dashmap::DashMap;

use crate::config::CircuitBreakerConfig;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerStats};

/// Concurrent map of dependency name → breaker.
#[derive(Debug)]
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    defaults: CircuitBreakerConfig,
}

impl BreakerRegistry {
    pub fn new(defaults: CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            defaults,
        }
    }

    /// Return the breaker for `name`, creating it with the default config.
    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(dependency = %name, "Creating circuit breaker");
                Arc::new(CircuitBreaker::new(name, self.defaults.clone()))
            })
            .clone()
    }

    /// Register a breaker with its own configuration, replacing any existing one.
    pub fn register(&self, name: &str, config: CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        let breaker = Arc::new(CircuitBreaker::new(name, config));
        self.breakers.insert(name.to_string(), breaker.clone());
        breaker
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|r| r.value().clone())
    }

    /// Stats for every breaker, sorted by dependency name.
    pub fn all_stats(&self) -> Vec<(String, CircuitBreakerStats)> {
        let mut stats: Vec<_> = self
            .breakers
            .iter()
            .map(|r| (r.key().clone(), r.value().stats()))
            .collect();
        stats.sort_by(|a, b| a.0.cmp(&b.0));
        stats
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}
