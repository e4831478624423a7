//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GuardConfig (validated, immutable)
//!     → handed to startup, which builds breaker/probe/aggregator from it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; breakers are built from a snapshot
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, BackendConfig, CircuitBreakerConfig, GuardConfig, HealthCheckConfig, LogFormat,
    ObservabilityConfig, RetryConfig,
};
