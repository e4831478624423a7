//! Error taxonomy shared by the resilience primitives.
//!
//! Dependency failures travel through the breaker and the retry loop
//! unchanged. The only error this layer synthesizes for callers is
//! [`CircuitError::Open`].

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Code carried by a short-circuited call.
pub const CIRCUIT_OPEN: &str = "CIRCUIT_OPEN";

/// Code carried by a call that ran out of time.
pub const TIMEOUT: &str = "ETIMEDOUT";

/// Exposes what retry classification and status reporting need from an error.
pub trait Classify: fmt::Display {
    /// Numeric status (HTTP-like) if the error has one.
    fn status(&self) -> Option<u16> {
        None
    }

    /// Symbolic code (e.g. `ECONNRESET`) if the error has one.
    fn code(&self) -> Option<&str> {
        None
    }
}

/// A failure of the backend service itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend answered with an error status.
    #[error("backend returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never got a response.
    #[error("transport error ({code}): {message}")]
    Transport { code: String, message: String },

    /// The call did not settle before its deadline.
    #[error("timeout after {}ms", .after.as_millis())]
    Timeout { after: Duration },
}

impl BackendError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Status { status, message: message.into() }
    }

    pub fn transport(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport { code: code.into(), message: message.into() }
    }
}

impl Classify for BackendError {
    fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn code(&self) -> Option<&str> {
        match self {
            Self::Transport { code, .. } => Some(code),
            Self::Timeout { .. } => Some(TIMEOUT),
            Self::Status { .. } => None,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::http(status.as_u16(), err.to_string());
        }
        let code = if err.is_timeout() {
            TIMEOUT
        } else if err.is_connect() {
            "ECONNREFUSED"
        } else {
            "NETWORK_ERROR"
        };
        Self::transport(code, err.to_string())
    }
}

/// Outcome of a call routed through a circuit breaker.
#[derive(Debug, Error)]
pub enum CircuitError<E> {
    /// The breaker rejected the call without contacting the dependency.
    #[error("circuit breaker '{dependency}' is open, call rejected at {rejected_at}")]
    Open {
        dependency: String,
        rejected_at: DateTime<Utc>,
    },

    /// The wrapped operation failed; the original error is preserved.
    #[error(transparent)]
    Inner(E),
}

impl<E> CircuitError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// The dependency error, or `None` for a short-circuited call.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            Self::Open { .. } => None,
        }
    }
}

impl<E: Classify> Classify for CircuitError<E> {
    fn status(&self) -> Option<u16> {
        match self {
            Self::Inner(e) => e.status(),
            Self::Open { .. } => None,
        }
    }

    fn code(&self) -> Option<&str> {
        match self {
            Self::Inner(e) => e.code(),
            Self::Open { .. } => Some(CIRCUIT_OPEN),
        }
    }
}
