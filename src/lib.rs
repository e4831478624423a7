//! Backend reliability layer.
//!
//! Protects an application from an unreliable, network-attached backend
//! service with a circuit breaker, a periodic health probe, a retry policy
//! with exponential backoff, and a status aggregator that folds all of them
//! into one observable "is the system degraded" signal.

pub mod admin;
pub mod config;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod status;

pub use config::GuardConfig;
pub use lifecycle::{GuardContext, Shutdown};
