//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds > 0, delays ordered)
//! - Validate addresses and URLs before anything binds or connects
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::GuardConfig;

/// Upper bound for `retries.jitter_ms`.
pub const MAX_JITTER_MS: u64 = 1_000;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than 0")]
    Zero { field: &'static str },

    #[error("retries.base_delay_ms ({base}) exceeds retries.max_delay_ms ({max})")]
    DelayOrder { base: u64, max: u64 },

    #[error("retries.jitter_ms ({0}) exceeds the maximum of 1000")]
    JitterTooLarge(u64),

    #[error("backend.base_url '{url}' is not a valid URL: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("health_check.path '{0}' must start with '/'")]
    InvalidPath(String),

    #[error("{field} '{value}' is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("admin.api_key must be set when the admin API is enabled")]
    MissingApiKey,
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let cb = &config.circuit_breaker;
    if cb.failure_threshold == 0 {
        errors.push(ValidationError::Zero { field: "circuit_breaker.failure_threshold" });
    }
    if cb.success_threshold == 0 {
        errors.push(ValidationError::Zero { field: "circuit_breaker.success_threshold" });
    }
    if cb.timeout_ms == 0 {
        errors.push(ValidationError::Zero { field: "circuit_breaker.timeout_ms" });
    }

    let retries = &config.retries;
    if retries.base_delay_ms > retries.max_delay_ms {
        errors.push(ValidationError::DelayOrder {
            base: retries.base_delay_ms,
            max: retries.max_delay_ms,
        });
    }

    if retries.jitter_ms > MAX_JITTER_MS {
        errors.push(ValidationError::JitterTooLarge(retries.jitter_ms));
    }

    if let Err(e) = Url::parse(&config.backend.base_url) {
        errors.push(ValidationError::InvalidUrl {
            url: config.backend.base_url.clone(),
            reason: e.to_string(),
        });
    }

    let hc = &config.health_check;
    if hc.interval_secs == 0 {
        errors.push(ValidationError::Zero { field: "health_check.interval_secs" });
    }
    if hc.timeout_ms == 0 {
        errors.push(ValidationError::Zero { field: "health_check.timeout_ms" });
    }
    if !hc.path.starts_with('/') {
        errors.push(ValidationError::InvalidPath(hc.path.clone()));
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: obs.metrics_address.clone(),
        });
    }

    let admin = &config.admin;
    if admin.enabled {
        if admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidAddress {
                field: "admin.bind_address",
                value: admin.bind_address.clone(),
            });
        }
        if admin.api_key.trim().is_empty() {
            errors.push(ValidationError::MissingApiKey);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&GuardConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = GuardConfig::default();
        config.circuit_breaker.failure_threshold = 0;
        config.retries.base_delay_ms = 20_000;
        config.health_check.path = "health".to_string();
        config.backend.base_url = "not a url".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::Zero {
            field: "circuit_breaker.failure_threshold"
        }));
        assert!(errors.contains(&ValidationError::InvalidPath("health".to_string())));
    }

    #[test]
    fn test_jitter_is_bounded() {
        let mut config = GuardConfig::default();
        config.retries.jitter_ms = MAX_JITTER_MS;
        assert!(validate_config(&config).is_ok());

        config.retries.jitter_ms = 5_000;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::JitterTooLarge(5_000)]);
    }

    #[test]
    fn test_admin_requires_key() {
        let mut config = GuardConfig::default();
        config.admin.enabled = true;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::MissingApiKey]);

        config.admin.api_key = "secret".to_string();
        assert!(validate_config(&config).is_ok());
    }
}
