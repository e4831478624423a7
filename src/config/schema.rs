//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the guard.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the backend reliability layer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    /// The protected backend service.
    pub backend: BackendConfig,

    /// Circuit breaker thresholds and timeouts.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Retry policy.
    pub retries: RetryConfig,

    /// Health probe settings.
    pub health_check: HealthCheckConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// The backend service guarded by this layer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Dependency name, used as the circuit breaker key and metric label.
    pub name: String,

    /// Base URL of the backend (e.g., "http://127.0.0.1:8000").
    pub base_url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            name: "backend".to_string(),
            base_url: "http://127.0.0.1:8000".to_string(),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures in CLOSED before the circuit opens.
    pub failure_threshold: u32,

    /// Successes in HALF_OPEN before the circuit closes.
    pub success_threshold: u32,

    /// Per-call timeout applied by guarded calls, in milliseconds.
    pub timeout_ms: u64,

    /// Delay after opening before a HALF_OPEN trial is permitted, in milliseconds.
    pub reset_timeout_ms: u64,
}

impl CircuitBreakerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout_ms: 10_000,
            reset_timeout_ms: 30_000,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Upper bound (exclusive) of the random jitter added to each delay.
    pub jitter_ms: u64,

    /// Status codes worth retrying.
    pub retryable_statuses: BTreeSet<u16>,

    /// Markers matched against an error's code or message.
    pub retryable_errors: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
            jitter_ms: 1_000,
            retryable_statuses: [408, 429, 500, 502, 503, 504].into_iter().collect(),
            retryable_errors: ["ECONNRESET", "ETIMEDOUT", "ENOTFOUND", "ECONNREFUSED", "NETWORK_ERROR"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Health probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable periodic health probing.
    pub enabled: bool,

    /// Probe interval in seconds.
    pub interval_secs: u64,

    /// Hard timeout for a single probe in milliseconds.
    pub timeout_ms: u64,

    /// Path to probe, appended to the backend base URL.
    pub path: String,

    /// Response time above which a healthy backend counts as degraded.
    pub degraded_threshold_ms: u64,
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            timeout_ms: 5_000,
            path: "/health".to_string(),
            degraded_threshold_ms: 5_000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
