//! Bearer-authenticated admin API.
//!
//! Read endpoints expose breaker, buffer, and probe state; write
//! endpoints force breaker transitions and probe passes. All force
//! operations are idempotent.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::dependency::DependencyRegistry;
use crate::probe::ProbeOrchestrator;

/// Shared state for admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub registry: Arc<DependencyRegistry>,
    pub probes: Arc<ProbeOrchestrator>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/breakers", get(get_breakers))
        .route("/admin/breakers/{name}/open", post(force_open_breaker))
        .route("/admin/breakers/{name}/close", post(force_close_breaker))
        .route("/admin/buffer", get(get_buffer))
        .route("/admin/probes", get(get_probes))
        .route("/admin/probes/{service}/force-pass", post(force_pass_probe))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
