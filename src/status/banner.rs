//! What the degraded-mode banner should show.

use serde::Serialize;

use crate::resilience::circuit_breaker::CircuitState;
use crate::status::aggregator::AggregatedStatus;

/// Consumer-facing rendering decision derived from [`AggregatedStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BannerState {
    /// Everything looks fine.
    Hidden,
    /// The backend answers, but slowly or with server errors.
    Degraded,
    /// The circuit is open; calls are being failed fast.
    Unavailable,
}

impl BannerState {
    pub fn from_status(status: &AggregatedStatus) -> Self {
        if status.circuit_state == CircuitState::Open {
            Self::Unavailable
        } else if status.health.is_some() && status.is_degraded {
            Self::Degraded
        } else {
            Self::Hidden
        }
    }

    /// Whether non-essential calls should be skipped.
    pub fn avoid_optional_calls(self) -> bool {
        self != Self::Hidden
    }
}

impl std::fmt::Display for BannerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hidden => write!(f, "hidden"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}
