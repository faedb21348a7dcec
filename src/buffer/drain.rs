//! Background drain scheduling.

use crate::buffer::store::FallbackBuffer;
use crate::sink::PersistenceSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

/// Availability check consulted before each drain pass.
///
/// Implemented by the probe orchestrator; test doubles substitute freely.
pub trait ReadinessGate: Send + Sync {
    fn is_ready(&self, service: &str) -> bool;
}

/// Periodic task replaying the fallback buffer once the store is ready.
pub struct DrainTask {
    buffer: Arc<FallbackBuffer>,
    sink: Arc<dyn PersistenceSink>,
    gate: Arc<dyn ReadinessGate>,
    service: String,
    interval: Duration,
}

impl DrainTask {
    pub fn new(
        buffer: Arc<FallbackBuffer>,
        sink: Arc<dyn PersistenceSink>,
        gate: Arc<dyn ReadinessGate>,
        service: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            buffer,
            sink,
            gate,
            service: service.into(),
            interval,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            service = %self.service,
            "Buffer drain task starting"
        );

        let mut ticker = time::interval(self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Drain task received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn tick(&self) {
        if self.buffer.depth() == 0 {
            return;
        }
        if !self.gate.is_ready(&self.service) {
            tracing::debug!(
                service = %self.service,
                depth = self.buffer.depth(),
                "Store not ready, deferring drain"
            );
            return;
        }

        let report = self.buffer.drain(self.sink.as_ref()).await;
        if report.skipped {
            return;
        }
        if report.synced > 0 || report.failed > 0 {
            tracing::info!(
                synced = report.synced,
                failed = report.failed,
                remaining = self.buffer.depth(),
                "Buffer drain pass complete"
            );
        }
    }
}
