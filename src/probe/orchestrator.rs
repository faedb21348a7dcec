//! Probe scheduling and outcome fan-out.
//!
//! Each probe runs in its own spawned task on its own interval so one
//! slow check can never delay another's schedule. Confirmed transitions
//! fan out to registered [`ProbeListener`]s (breaker wiring, recovery
//! triggering) and to logging/metrics.

use crate::buffer::ReadinessGate;
use crate::config::schema::{ProbeConfig, ProbeKind};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::probe::http::HttpHealthCheck;
use crate::probe::types::{HealthCheck, ProbeRecord, ProbeSnapshot, ProbeStatus, ProbeTransition};
use dashmap::DashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;

/// Observer interface for confirmed probe transitions.
pub trait ProbeListener: Send + Sync {
    fn on_probe_transition(&self, event: &ProbeTransition);
}

struct ProbeHandle {
    config: ProbeConfig,
    check: Arc<dyn HealthCheck>,
    record: Mutex<ProbeRecord>,
}

/// Owns all probe records and their schedules.
#[derive(Default)]
pub struct ProbeOrchestrator {
    probes: DashMap<String, Arc<ProbeHandle>>,
    listeners: RwLock<Vec<Arc<dyn ProbeListener>>>,
}

impl ProbeOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the orchestrator from config, creating HTTP checks for
    /// probes that declare a URL. Probes without a URL expect a custom
    /// check via [`register_probe`](Self::register_probe) before spawn.
    pub fn from_config(probes: &[ProbeConfig]) -> Self {
        let orchestrator = Self::new();
        for config in probes {
            match &config.http_url {
                Some(url) => {
                    orchestrator.register_probe(config.clone(), Arc::new(HttpHealthCheck::new(url)));
                }
                None => tracing::warn!(
                    probe = %config.name,
                    "Probe has no http_url and no registered check; it will not run"
                ),
            }
        }
        orchestrator
    }

    pub fn register_probe(&self, config: ProbeConfig, check: Arc<dyn HealthCheck>) {
        let record = Mutex::new(ProbeRecord::new(&config));
        self.probes.insert(
            config.name.clone(),
            Arc::new(ProbeHandle {
                config,
                check,
                record,
            }),
        );
    }

    pub fn register_listener(&self, listener: Arc<dyn ProbeListener>) {
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(listener);
    }

    /// Spawn one independent task per registered probe.
    pub fn spawn_all(self: &Arc<Self>, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        for entry in self.probes.iter() {
            let handle = entry.value().clone();
            let orchestrator = self.clone();
            let receiver = shutdown.subscribe();
            handles.push(tokio::spawn(async move {
                orchestrator.run_probe(handle, receiver).await;
            }));
        }
        tracing::info!(probes = handles.len(), "Probe orchestrator started");
        handles
    }

    async fn run_probe(&self, handle: Arc<ProbeHandle>, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            probe = %handle.config.name,
            service = %handle.config.service,
            interval_secs = handle.config.interval_secs,
            "Probe starting"
        );
        let mut ticker = time::interval(handle.config.interval());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_once(&handle).await;
                }
                _ = shutdown.recv() => {
                    tracing::info!(probe = %handle.config.name, "Probe received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn check_once(&self, handle: &ProbeHandle) {
        let started = Instant::now();
        let success = match time::timeout(handle.config.timeout(), handle.check.check()).await {
            Ok(passed) => passed,
            Err(_) => {
                tracing::warn!(probe = %handle.config.name, "Health check failed: timeout");
                false
            }
        };
        let latency = started.elapsed();

        let transition = {
            let mut record = handle.record.lock().unwrap_or_else(|e| e.into_inner());
            record.last_latency_ms = Some(latency.as_millis() as u64);
            record.observe(success)
        };

        metrics::record_probe_check(&handle.config.name, success, latency.as_secs_f64());
        if let Some(transition) = transition {
            self.announce(&transition);
        }
    }

    fn announce(&self, transition: &ProbeTransition) {
        if transition.to.is_healthy() {
            tracing::info!(
                probe = %transition.probe,
                service = %transition.service,
                from = %transition.from,
                to = %transition.to,
                "Probe status confirmed healthy"
            );
        } else {
            tracing::warn!(
                probe = %transition.probe,
                service = %transition.service,
                from = %transition.from,
                to = %transition.to,
                restart_count = transition.restart_count,
                "Probe status confirmed unhealthy"
            );
        }
        metrics::record_probe_status(&transition.probe, transition.to.is_healthy());

        let listeners = self.listeners.read().unwrap_or_else(|e| e.into_inner());
        for listener in listeners.iter() {
            listener.on_probe_transition(transition);
        }
    }

    /// Administrative: mark the readiness probe for a service as passing
    /// immediately. Returns false when the service has no readiness probe.
    pub fn force_pass(&self, service: &str) -> bool {
        let handle = self.probes.iter().find_map(|entry| {
            let h = entry.value();
            (h.config.service == service && h.config.kind == ProbeKind::Readiness)
                .then(|| h.clone())
        });
        let Some(handle) = handle else { return false };

        let transition = {
            let mut record = handle.record.lock().unwrap_or_else(|e| e.into_inner());
            record.force_healthy()
        };
        if let Some(transition) = transition {
            tracing::info!(service = %service, "Readiness probe forced to pass");
            self.announce(&transition);
        }
        true
    }

    /// Status of the readiness probe for one service.
    pub fn readiness(&self, service: &str) -> Option<ProbeStatus> {
        self.probes.iter().find_map(|entry| {
            let h = entry.value();
            if h.config.service == service && h.config.kind == ProbeKind::Readiness {
                Some(h.record.lock().unwrap_or_else(|e| e.into_inner()).status)
            } else {
                None
            }
        })
    }

    pub fn statuses(&self) -> Vec<ProbeSnapshot> {
        let mut snapshots: Vec<ProbeSnapshot> = self
            .probes
            .iter()
            .map(|entry| {
                entry
                    .value()
                    .record
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .snapshot()
            })
            .collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }
}

impl ReadinessGate for ProbeOrchestrator {
    /// A service with no readiness probe is not gated; otherwise draining
    /// requires a confirmed Ready status.
    fn is_ready(&self, service: &str) -> bool {
        match self.readiness(service) {
            Some(status) => status == ProbeStatus::Ready,
            None => true,
        }
    }
}
