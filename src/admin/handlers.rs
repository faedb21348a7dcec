use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::admin::AdminState;
use crate::breaker::BreakerSnapshot;
use crate::buffer::BufferStats;
use crate::probe::ProbeSnapshot;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub breakers: Vec<BreakerSnapshot>,
    pub buffer: BufferStats,
    pub probes: Vec<ProbeSnapshot>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        breakers: state.registry.snapshots(),
        buffer: state.registry.buffer().stats(),
        probes: state.probes.statuses(),
    })
}

pub async fn get_breakers(State(state): State<AdminState>) -> Json<Vec<BreakerSnapshot>> {
    Json(state.registry.snapshots())
}

pub async fn force_open_breaker(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<Json<BreakerSnapshot>, StatusCode> {
    let breaker = state
        .registry
        .breaker(&name)
        .ok_or(StatusCode::NOT_FOUND)?;
    tracing::warn!(dependency = %name, "Breaker force-opened via admin API");
    breaker.force_open();
    Ok(Json(breaker.snapshot()))
}

pub async fn force_close_breaker(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<Json<BreakerSnapshot>, StatusCode> {
    let breaker = state
        .registry
        .breaker(&name)
        .ok_or(StatusCode::NOT_FOUND)?;
    tracing::warn!(dependency = %name, "Breaker force-closed via admin API");
    breaker.force_close();
    Ok(Json(breaker.snapshot()))
}

pub async fn get_buffer(State(state): State<AdminState>) -> Json<BufferStats> {
    Json(state.registry.buffer().stats())
}

pub async fn get_probes(State(state): State<AdminState>) -> Json<Vec<ProbeSnapshot>> {
    Json(state.probes.statuses())
}

pub async fn force_pass_probe(
    State(state): State<AdminState>,
    Path(service): Path<String>,
) -> Result<Json<Vec<ProbeSnapshot>>, StatusCode> {
    if !state.probes.force_pass(&service) {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(state.probes.statuses()))
}
