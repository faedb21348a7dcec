//! Breaker transition events and the observer seam.
//!
//! The breaker itself does not depend on any concrete subscriber; anything
//! interested in transitions (logging, metrics, the probe orchestrator)
//! implements [`TransitionObserver`] and registers itself.

use crate::breaker::state::{BreakerSnapshot, CircuitState};
use crate::observability::metrics;

/// What caused a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCause {
    /// Consecutive-failure threshold crossed.
    FailureThreshold,
    /// Reset timeout elapsed, probing allowed.
    RetryEligible,
    /// Consecutive-success threshold crossed in half-open.
    SuccessThreshold,
    /// A trial call failed while half-open.
    TrialFailed,
    /// Administrative force-open/force-close.
    Forced,
    /// A health probe confirmed the dependency unhealthy.
    Probe,
}

impl TransitionCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionCause::FailureThreshold => "failure_threshold",
            TransitionCause::RetryEligible => "retry_eligible",
            TransitionCause::SuccessThreshold => "success_threshold",
            TransitionCause::TrialFailed => "trial_failed",
            TransitionCause::Forced => "forced",
            TransitionCause::Probe => "probe",
        }
    }
}

/// A single breaker state transition with the stats that triggered it.
#[derive(Debug, Clone)]
pub struct TransitionEvent {
    pub dependency: String,
    pub from: CircuitState,
    pub to: CircuitState,
    pub cause: TransitionCause,
    pub stats: BreakerSnapshot,
}

/// Observer interface for breaker transitions.
pub trait TransitionObserver: Send + Sync {
    fn on_transition(&self, event: &TransitionEvent);
}

/// Default observer: structured log line plus state metric.
pub struct LoggingObserver;

impl TransitionObserver for LoggingObserver {
    fn on_transition(&self, event: &TransitionEvent) {
        match event.to {
            CircuitState::Open => tracing::warn!(
                dependency = %event.dependency,
                from = %event.from,
                cause = event.cause.as_str(),
                consecutive_failures = event.stats.consecutive_failures,
                failure_rate = event.stats.failure_rate,
                "Circuit breaker opened"
            ),
            CircuitState::HalfOpen => tracing::info!(
                dependency = %event.dependency,
                from = %event.from,
                cause = event.cause.as_str(),
                "Circuit breaker half-open, probing"
            ),
            CircuitState::Closed => tracing::info!(
                dependency = %event.dependency,
                from = %event.from,
                cause = event.cause.as_str(),
                consecutive_successes = event.stats.consecutive_successes,
                "Circuit breaker closed"
            ),
        }
        metrics::record_breaker_state(&event.dependency, event.to);
        metrics::record_breaker_transition(&event.dependency, event.to);
    }
}
