//! Breaker state and reporting snapshot.

use serde::Serialize;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, calls pass through.
    Closed,
    /// Dependency assumed down, calls fail fast.
    Open,
    /// Testing whether the dependency recovered.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a breaker, for events and the admin API.
///
/// `failure_rate` is recomputed on every record and is reporting-only;
/// transitions are driven by the consecutive counters.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub dependency: String,
    pub state: CircuitState,
    pub total_calls: u64,
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
    pub failure_rate: f64,
    pub fallback_active: bool,
    /// Milliseconds until an open circuit becomes eligible for a probe
    /// call; `None` unless the state is `Open`.
    pub retry_eligible_in_ms: Option<u64>,
}
