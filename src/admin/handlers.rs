use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::health::HealthStatus;
use crate::resilience::CircuitBreakerStats;
use crate::status::{AggregatedStatus, BannerState};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub dependency: String,
    pub banner: BannerState,
    #[serde(flatten)]
    pub status: AggregatedStatus,
}

#[derive(Serialize)]
pub struct BreakerStatus {
    pub dependency: String,
    #[serde(flatten)]
    pub stats: CircuitBreakerStats,
}

#[derive(Debug, Default, Deserialize)]
pub struct BreakerQuery {
    pub dependency: Option<String>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let status = state.ctx.aggregator().current();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        dependency: state.ctx.config().backend.name.clone(),
        banner: status.banner(),
        status,
    })
}

pub async fn get_breakers(State(state): State<AdminState>) -> Json<Vec<BreakerStatus>> {
    let breakers = state
        .ctx
        .registry()
        .all_stats()
        .into_iter()
        .map(|(dependency, stats)| BreakerStatus { dependency, stats })
        .collect();
    Json(breakers)
}

pub async fn reset_breaker(
    State(state): State<AdminState>,
    Query(query): Query<BreakerQuery>,
) -> Result<Json<BreakerStatus>, StatusCode> {
    let dependency = query
        .dependency
        .unwrap_or_else(|| state.ctx.config().backend.name.clone());
    let breaker = state
        .ctx
        .registry()
        .get(&dependency)
        .ok_or(StatusCode::NOT_FOUND)?;

    breaker.reset();
    Ok(Json(BreakerStatus {
        dependency,
        stats: breaker.stats(),
    }))
}

pub async fn run_health_check(State(state): State<AdminState>) -> Json<HealthStatus> {
    Json(state.ctx.probe().check_health().await)
}
