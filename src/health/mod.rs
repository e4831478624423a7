//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Periodic timer (probe.rs):
//!     → target.rs (one lightweight GET)
//!     → bounded by the probe timeout
//!     → classify into status.rs
//!     → store as last status
//!     → notify subscribers in registration order
//! ```
//!
//! # Design Decisions
//! - The probe measures reachability, so 4xx answers count as healthy
//! - A subscriber that panics is logged and skipped; the rest still run
//! - Late subscribers receive the last known status immediately
//! - Stopping the timer never aborts a check already in flight

pub mod probe;
pub mod status;
pub mod target;

pub use probe::{HealthProbe, Listener, Subscription};
pub use status::HealthStatus;
pub use target::{HttpProbeTarget, ProbeTarget};
