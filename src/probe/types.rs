//! Probe state machine and check interface.
//!
//! # States
//! - Unknown: no confirmed observation yet
//! - Ready / NotReady: readiness probes ("can this dependency serve")
//! - Alive / Dead: liveness probes ("is this service process functioning")
//!
//! # State Transitions
//! ```text
//! * → healthy:   consecutive successes >= success_threshold
//! * → unhealthy: consecutive failures  >= failure_threshold
//! ```
//!
//! # Design Decisions
//! - Hysteresis prevents flapping: a lone failure amid successes never
//!   flips a confirmed status
//! - Counters for the opposite direction reset on every observation
//! - Crossing the liveness failure threshold bumps the restart counter;
//!   a live-but-not-ready service is never restarted

use crate::config::schema::{ProbeConfig, ProbeKind};
use crate::sink::BoxFuture;
use serde::Serialize;

/// Confirmed status of one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Unknown,
    Ready,
    NotReady,
    Alive,
    Dead,
}

impl ProbeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Unknown => "unknown",
            ProbeStatus::Ready => "ready",
            ProbeStatus::NotReady => "not_ready",
            ProbeStatus::Alive => "alive",
            ProbeStatus::Dead => "dead",
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, ProbeStatus::Ready | ProbeStatus::Alive)
    }
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A confirmed status change.
#[derive(Debug, Clone)]
pub struct ProbeTransition {
    pub probe: String,
    pub service: String,
    pub kind: ProbeKind,
    pub from: ProbeStatus,
    pub to: ProbeStatus,
    /// Restart count after this transition (liveness only).
    pub restart_count: u32,
}

/// A health check supplied externally; the engine consumes pass/fail
/// plus latency only.
pub trait HealthCheck: Send + Sync {
    fn check(&self) -> BoxFuture<'_, bool>;
}

/// Adapter for closure-based checks.
pub struct FnCheck {
    f: Box<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>,
}

impl FnCheck {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, bool> + Send + Sync + 'static,
    {
        Self { f: Box::new(f) }
    }
}

impl HealthCheck for FnCheck {
    fn check(&self) -> BoxFuture<'_, bool> {
        (self.f)()
    }
}

/// Mutable per-probe record, written only by the probe's own task (and
/// the admin force-pass path).
#[derive(Debug)]
pub struct ProbeRecord {
    pub name: String,
    pub service: String,
    pub kind: ProbeKind,
    pub status: ProbeStatus,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
    pub restart_count: u32,
    pub last_latency_ms: Option<u64>,
    success_threshold: u32,
    failure_threshold: u32,
}

impl ProbeRecord {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            name: config.name.clone(),
            service: config.service.clone(),
            kind: config.kind,
            status: ProbeStatus::Unknown,
            consecutive_successes: 0,
            consecutive_failures: 0,
            restart_count: 0,
            last_latency_ms: None,
            success_threshold: config.success_threshold,
            failure_threshold: config.failure_threshold,
        }
    }

    fn healthy_status(&self) -> ProbeStatus {
        match self.kind {
            ProbeKind::Readiness => ProbeStatus::Ready,
            ProbeKind::Liveness => ProbeStatus::Alive,
        }
    }

    fn unhealthy_status(&self) -> ProbeStatus {
        match self.kind {
            ProbeKind::Readiness => ProbeStatus::NotReady,
            ProbeKind::Liveness => ProbeStatus::Dead,
        }
    }

    /// Record one check outcome; returns the transition if the configured
    /// consecutive threshold was crossed.
    pub fn observe(&mut self, success: bool) -> Option<ProbeTransition> {
        if success {
            self.consecutive_failures = 0;
            if self.status == self.healthy_status() {
                return None;
            }
            self.consecutive_successes = self.consecutive_successes.saturating_add(1);
            if self.consecutive_successes >= self.success_threshold {
                return Some(self.flip(self.healthy_status()));
            }
        } else {
            self.consecutive_successes = 0;
            if self.status == self.unhealthy_status() {
                return None;
            }
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            if self.consecutive_failures >= self.failure_threshold {
                if self.kind == ProbeKind::Liveness {
                    self.restart_count = self.restart_count.saturating_add(1);
                }
                return Some(self.flip(self.unhealthy_status()));
            }
        }
        None
    }

    /// Administrative: mark healthy immediately. Idempotent.
    pub fn force_healthy(&mut self) -> Option<ProbeTransition> {
        if self.status == self.healthy_status() {
            return None;
        }
        self.consecutive_failures = 0;
        self.consecutive_successes = 0;
        Some(self.flip(self.healthy_status()))
    }

    fn flip(&mut self, to: ProbeStatus) -> ProbeTransition {
        let from = self.status;
        self.status = to;
        self.consecutive_successes = 0;
        self.consecutive_failures = 0;
        ProbeTransition {
            probe: self.name.clone(),
            service: self.service.clone(),
            kind: self.kind,
            from,
            to,
            restart_count: self.restart_count,
        }
    }

    pub fn snapshot(&self) -> ProbeSnapshot {
        ProbeSnapshot {
            name: self.name.clone(),
            service: self.service.clone(),
            kind: self.kind,
            status: self.status,
            consecutive_successes: self.consecutive_successes,
            consecutive_failures: self.consecutive_failures,
            restart_count: self.restart_count,
            last_latency_ms: self.last_latency_ms,
        }
    }
}

/// Read-only view for the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeSnapshot {
    pub name: String,
    pub service: String,
    pub kind: ProbeKind,
    pub status: ProbeStatus,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
    pub restart_count: u32,
    pub last_latency_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: ProbeKind, success_threshold: u32, failure_threshold: u32) -> ProbeRecord {
        ProbeRecord::new(&ProbeConfig {
            name: "p".to_string(),
            service: "svc".to_string(),
            kind,
            http_url: None,
            interval_secs: 10,
            timeout_secs: 5,
            success_threshold,
            failure_threshold,
        })
    }

    #[test]
    fn test_unknown_to_ready_needs_threshold() {
        let mut r = record(ProbeKind::Readiness, 2, 3);
        assert!(r.observe(true).is_none());
        let t = r.observe(true).expect("second success confirms");
        assert_eq!(t.from, ProbeStatus::Unknown);
        assert_eq!(t.to, ProbeStatus::Ready);
    }

    #[test]
    fn test_isolated_failure_never_flips_ready() {
        let mut r = record(ProbeKind::Readiness, 1, 3);
        r.observe(true).unwrap();
        assert_eq!(r.status, ProbeStatus::Ready);

        // Two failures, then a success: with success_threshold 1 the
        // status stays Ready and failure counters reset.
        assert!(r.observe(false).is_none());
        assert!(r.observe(false).is_none());
        assert!(r.observe(true).is_none());
        assert_eq!(r.status, ProbeStatus::Ready);
        assert_eq!(r.consecutive_failures, 0);

        // A full run of three failures does flip
        r.observe(false);
        r.observe(false);
        let t = r.observe(false).expect("threshold crossed");
        assert_eq!(t.to, ProbeStatus::NotReady);
    }

    #[test]
    fn test_liveness_dead_increments_restart_count() {
        let mut r = record(ProbeKind::Liveness, 1, 2);
        r.observe(true).unwrap();
        assert_eq!(r.status, ProbeStatus::Alive);

        r.observe(false);
        let t = r.observe(false).expect("confirmed dead");
        assert_eq!(t.to, ProbeStatus::Dead);
        assert_eq!(t.restart_count, 1);

        // Recover and die again
        r.observe(true);
        r.observe(false);
        let t = r.observe(false).unwrap();
        assert_eq!(t.restart_count, 2);
    }

    #[test]
    fn test_force_healthy_idempotent() {
        let mut r = record(ProbeKind::Readiness, 3, 3);
        assert!(r.force_healthy().is_some());
        assert_eq!(r.status, ProbeStatus::Ready);
        assert!(r.force_healthy().is_none());
    }
}
