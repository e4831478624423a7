//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to backend:
//!     → retries.rs (classify failure, retry with backoff.rs delays)
//!     → circuit_breaker.rs (fail fast when open, track outcomes)
//!     → timeouts.rs (enforce the per-call deadline)
//!     → backend
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Retries only for idempotent calls, and only for retryable errors
//! - Circuit breaker prevents cascading failures
//! - Dependency errors pass through unchanged; only CIRCUIT_OPEN is new

pub mod backoff;
pub mod circuit_breaker;
pub mod error;
pub mod registry;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerStats, CircuitState};
pub use error::{BackendError, CircuitError, Classify, CIRCUIT_OPEN};
pub use registry::BreakerRegistry;
pub use retries::{is_retryable, retry_with_backoff, retry_with_notify};
pub use timeouts::with_deadline;
