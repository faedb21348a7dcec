//! Metrics collection and exposition.
//!
//! # Metrics
//! - `aegis_calls_total` (counter): call outcomes by dependency, outcome
//! - `aegis_retries_total` (counter): retry attempts by dependency
//! - `aegis_breaker_state` (gauge): 0=closed, 1=half_open, 2=open
//! - `aegis_breaker_transitions_total` (counter): transitions by dependency, to
//! - `aegis_buffer_depth` (gauge): buffered write-intents
//! - `aegis_buffer_discards_total` (counter): discards by reason
//! - `aegis_probe_checks_total` (counter): checks by probe, result
//! - `aegis_probe_latency_seconds` (histogram): check latency by probe
//! - `aegis_probe_healthy` (gauge): 1=healthy, 0=unhealthy per probe
//! - `aegis_recovery_runs_total` (counter): recovery runs by strategy, outcome
//!
//! # Design Decisions
//! - Low-overhead updates; recorders are plain functions so call sites
//!   stay one line
//! - Exposition via the Prometheus exporter's own HTTP listener

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::breaker::CircuitState;

/// Start the Prometheus exporter on its own listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter started"),
        Err(e) => tracing::error!(error = %e, "Failed to start metrics exporter"),
    }
}

/// Record the terminal outcome of one dependency call.
pub fn record_call(dependency: &str, outcome: &str) {
    counter!(
        "aegis_calls_total",
        "dependency" => dependency.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record one scheduled retry attempt.
pub fn record_retry(dependency: &str) {
    counter!("aegis_retries_total", "dependency" => dependency.to_string()).increment(1);
}

/// Record the current breaker state as a gauge.
pub fn record_breaker_state(dependency: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    gauge!("aegis_breaker_state", "dependency" => dependency.to_string()).set(value);
}

/// Count a breaker transition by destination state.
pub fn record_breaker_transition(dependency: &str, to: CircuitState) {
    counter!(
        "aegis_breaker_transitions_total",
        "dependency" => dependency.to_string(),
        "to" => to.as_str().to_string()
    )
    .increment(1);
}

/// Record the current buffer depth.
pub fn record_buffer_depth(depth: usize) {
    gauge!("aegis_buffer_depth").set(depth as f64);
}

/// Count one discarded buffer entry by reason.
pub fn record_buffer_discard(reason: &str) {
    counter!("aegis_buffer_discards_total", "reason" => reason.to_string()).increment(1);
}

/// Record one probe check outcome and its latency.
pub fn record_probe_check(probe: &str, success: bool, latency_secs: f64) {
    let result = if success { "pass" } else { "fail" };
    counter!(
        "aegis_probe_checks_total",
        "probe" => probe.to_string(),
        "result" => result
    )
    .increment(1);
    histogram!("aegis_probe_latency_seconds", "probe" => probe.to_string()).record(latency_secs);
}

/// Record the confirmed health of one probe.
pub fn record_probe_status(probe: &str, healthy: bool) {
    gauge!("aegis_probe_healthy", "probe" => probe.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

/// Count one recovery strategy run by outcome.
pub fn record_recovery_run(strategy: &str, outcome: &str) {
    counter!(
        "aegis_recovery_runs_total",
        "strategy" => strategy.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Count one fallback resolution by strategy kind.
pub fn record_fallback(dependency: &str, kind: &str) {
    counter!(
        "aegis_fallbacks_total",
        "dependency" => dependency.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}
