//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breaker, retry loop, probe:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Every state transition is logged with dependency name and timestamp
//! - Metrics are off by default and cost nothing until a recorder exists

pub mod logging;
pub mod metrics;
