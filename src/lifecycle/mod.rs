//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build breaker, probe, aggregator → Start monitoring
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop monitoring → Stop admin API → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - One context owns every breaker, probe and aggregator; nothing is global
//! - Fail fast: any startup error is fatal
//! - Stopping monitoring lets an in-flight probe finish

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{GuardContext, StartupError};
