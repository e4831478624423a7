//! Unified status subsystem.
//!
//! # Data Flow
//! ```text
//! HealthProbe notification ──┐
//!                            ├→ aggregator.rs (AggregatedStatus, watch channel)
//! Breaker state watch ───────┘        → banner.rs (hidden / degraded / unavailable)
//! Caller-recorded errors ────────────→ last_error
//! ```
//!
//! # Design Decisions
//! - The aggregator owns no remote resources, only subscriptions and derived state
//! - Start and stop may be called any number of times
//! - Circuit OPEN outranks degraded health in the banner

pub mod aggregator;
pub mod banner;

pub use aggregator::{AggregatedStatus, LastError, StatusAggregator};
pub use banner::BannerState;
