//! Probe result model.
//!
//! # States
//! - Healthy: the backend answered, possibly with a client-side (4xx) error
//! - Unhealthy: server-side failure (5xx), transport failure, or timeout
//!
//! # Design Decisions
//! - The probe measures reachability, not business success, so a 4xx
//!   still proves the service is up
//! - The error and status are kept even for healthy results

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::resilience::error::{BackendError, Classify};

/// Result of one probe cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    /// When the check completed.
    pub timestamp: DateTime<Utc>,
    /// Round-trip time of the probe in milliseconds.
    pub response_time_ms: u64,
    pub error: Option<String>,
    pub status: Option<u16>,
}

impl HealthStatus {
    /// Classify the outcome of a probe request.
    pub fn from_outcome(outcome: Result<(), BackendError>, response_time: Duration) -> Self {
        let response_time_ms = u64::try_from(response_time.as_millis()).unwrap_or(u64::MAX);
        match outcome {
            Ok(()) => Self {
                healthy: true,
                timestamp: Utc::now(),
                response_time_ms,
                error: None,
                status: None,
            },
            Err(err) => {
                let status = Classify::status(&err);
                Self {
                    healthy: status.is_some_and(|s| s < 500),
                    timestamp: Utc::now(),
                    response_time_ms,
                    error: Some(err.to_string()),
                    status,
                }
            }
        }
    }

    /// True when the result should put the system in degraded mode.
    pub fn is_degraded(&self, slow_threshold_ms: u64) -> bool {
        !self.healthy || self.response_time_ms > slow_threshold_ms
    }
}
