//! Admin API.
//!
//! # Routes
//! - `GET /admin/status`: aggregated status and banner state
//! - `GET /admin/breaker`: stats for every circuit breaker
//! - `POST /admin/breaker/reset`: force a breaker CLOSED (`?dependency=name`)
//! - `POST /admin/health/check`: run one probe now
//!
//! Every route requires a bearer token matching `admin.api_key`.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::lifecycle::GuardContext;

#[derive(Clone)]
pub struct AdminState {
    pub ctx: Arc<GuardContext>,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(ctx: Arc<GuardContext>) -> Self {
        let api_key = Arc::from(ctx.config().admin.api_key.as_str());
        Self { ctx, api_key }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/breaker", get(get_breakers))
        .route("/admin/breaker/reset", post(reset_breaker))
        .route("/admin/health/check", post(run_health_check))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin API until `shutdown` fires.
pub async fn serve_admin(
    listener: TcpListener,
    state: AdminState,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    tracing::info!(address = %listener.local_addr()?, "Admin API listening");
    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;
    tracing::info!("Admin API stopped");
    Ok(())
}
