//! Strategy registration and scheduling.

use std::sync::{Arc, RwLock};

use tokio::sync::{broadcast, Notify};
use tokio::time;

use crate::config::schema::RecoveryConfig;
use crate::observability::metrics;
use crate::probe::types::{ProbeStatus, ProbeTransition};
use crate::probe::ProbeListener;
use crate::sink::BoxFuture;

/// One self-contained recovery routine.
///
/// `detect` answers "is the condition I fix present"; `recover` attempts
/// the fix and reports success; `fallback` runs when recovery fails.
/// All three must be idempotent: the scheduler may invoke them again on
/// the next tick regardless of prior outcomes.
pub trait RecoveryStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn detect(&self) -> BoxFuture<'_, bool>;

    fn recover(&self) -> BoxFuture<'_, bool>;

    /// Containment step when recovery fails. Default: nothing.
    fn fallback(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}

/// Closure-based strategy for callers that do not want a struct per
/// routine.
pub struct FnStrategy {
    name: String,
    detect: Box<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>,
    recover: Box<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>,
}

impl FnStrategy {
    pub fn new<D, R>(name: impl Into<String>, detect: D, recover: R) -> Self
    where
        D: Fn() -> BoxFuture<'static, bool> + Send + Sync + 'static,
        R: Fn() -> BoxFuture<'static, bool> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            detect: Box::new(detect),
            recover: Box::new(recover),
        }
    }
}

impl RecoveryStrategy for FnStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn detect(&self) -> BoxFuture<'_, bool> {
        (self.detect)()
    }

    fn recover(&self) -> BoxFuture<'_, bool> {
        (self.recover)()
    }
}

/// Holds registered strategies and runs them on a shared tick.
///
/// A strategy is also runnable out of band: [`trigger`](Self::trigger)
/// wakes the scheduler immediately, used when a liveness probe confirms
/// a dead service.
#[derive(Default)]
pub struct RecoveryRegistry {
    strategies: RwLock<Vec<Arc<dyn RecoveryStrategy>>>,
    wake: Notify,
}

impl RecoveryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, strategy: Arc<dyn RecoveryStrategy>) {
        tracing::info!(strategy = %strategy.name(), "Recovery strategy registered");
        self.strategies
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(strategy);
    }

    /// Request an immediate run of all strategies.
    pub fn trigger(&self) {
        self.wake.notify_one();
    }

    fn snapshot(&self) -> Vec<Arc<dyn RecoveryStrategy>> {
        self.strategies
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Run every registered strategy once. Each runs in its own task so
    /// a failing or panicking strategy never stops the others.
    pub async fn run_tick(&self) {
        let strategies = self.snapshot();
        let mut handles = Vec::with_capacity(strategies.len());
        for strategy in strategies {
            handles.push(tokio::spawn(async move {
                run_strategy(strategy.as_ref()).await;
            }));
        }
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Recovery strategy task panicked");
            }
        }
    }

    /// Scheduler loop: shared periodic tick, plus immediate runs on
    /// [`trigger`](Self::trigger).
    pub async fn run(
        self: Arc<Self>,
        config: RecoveryConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        tracing::info!(
            tick_interval_secs = config.tick_interval_secs,
            "Recovery scheduler started"
        );
        let mut ticker = time::interval(config.tick_interval());
        // The first interval tick fires immediately; skip it so startup
        // does not run strategies before anything has been observed.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_tick().await;
                }
                _ = self.wake.notified() => {
                    tracing::info!("Recovery run triggered out of band");
                    self.run_tick().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Recovery scheduler received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

async fn run_strategy(strategy: &dyn RecoveryStrategy) {
    if !strategy.detect().await {
        metrics::record_recovery_run(strategy.name(), "not_needed");
        return;
    }
    tracing::info!(strategy = %strategy.name(), "Recovery condition detected");
    if strategy.recover().await {
        tracing::info!(strategy = %strategy.name(), "Recovery succeeded");
        metrics::record_recovery_run(strategy.name(), "recovered");
    } else {
        tracing::warn!(strategy = %strategy.name(), "Recovery failed, running fallback");
        metrics::record_recovery_run(strategy.name(), "fallback");
        strategy.fallback().await;
    }
}

impl ProbeListener for RecoveryRegistry {
    /// A confirmed-dead liveness probe requests an immediate recovery
    /// run instead of waiting for the next tick.
    fn on_probe_transition(&self, event: &ProbeTransition) {
        if event.to == ProbeStatus::Dead {
            tracing::warn!(
                service = %event.service,
                restart_count = event.restart_count,
                "Liveness probe confirmed dead, triggering recovery"
            );
            self.trigger();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::Duration;

    struct CountingStrategy {
        name: String,
        condition: Arc<AtomicBool>,
        recover_ok: bool,
        recoveries: AtomicU32,
        fallbacks: AtomicU32,
    }

    impl CountingStrategy {
        fn new(name: &str, condition: Arc<AtomicBool>, recover_ok: bool) -> Self {
            Self {
                name: name.to_string(),
                condition,
                recover_ok,
                recoveries: AtomicU32::new(0),
                fallbacks: AtomicU32::new(0),
            }
        }
    }

    impl RecoveryStrategy for CountingStrategy {
        fn name(&self) -> &str {
            &self.name
        }

        fn detect(&self) -> BoxFuture<'_, bool> {
            let present = self.condition.load(Ordering::SeqCst);
            Box::pin(async move { present })
        }

        fn recover(&self) -> BoxFuture<'_, bool> {
            self.recoveries.fetch_add(1, Ordering::SeqCst);
            let ok = self.recover_ok;
            Box::pin(async move { ok })
        }

        fn fallback(&self) -> BoxFuture<'_, ()> {
            self.fallbacks.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {})
        }
    }

    #[tokio::test]
    async fn test_detect_gates_recover() {
        let registry = RecoveryRegistry::new();
        let condition = Arc::new(AtomicBool::new(false));
        let strategy = Arc::new(CountingStrategy::new("s", condition.clone(), true));
        registry.register(strategy.clone());

        registry.run_tick().await;
        assert_eq!(strategy.recoveries.load(Ordering::SeqCst), 0);

        condition.store(true, Ordering::SeqCst);
        registry.run_tick().await;
        assert_eq!(strategy.recoveries.load(Ordering::SeqCst), 1);
        assert_eq!(strategy.fallbacks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_recovery_runs_fallback() {
        let registry = RecoveryRegistry::new();
        let condition = Arc::new(AtomicBool::new(true));
        let strategy = Arc::new(CountingStrategy::new("s", condition, false));
        registry.register(strategy.clone());

        registry.run_tick().await;
        assert_eq!(strategy.recoveries.load(Ordering::SeqCst), 1);
        assert_eq!(strategy.fallbacks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_strategy_does_not_stop_others() {
        struct PanickingStrategy;

        impl RecoveryStrategy for PanickingStrategy {
            fn name(&self) -> &str {
                "boom"
            }
            fn detect(&self) -> BoxFuture<'_, bool> {
                Box::pin(async { panic!("strategy bug") })
            }
            fn recover(&self) -> BoxFuture<'_, bool> {
                Box::pin(async { true })
            }
        }

        let registry = RecoveryRegistry::new();
        let condition = Arc::new(AtomicBool::new(true));
        let healthy = Arc::new(CountingStrategy::new("healthy", condition, true));
        registry.register(Arc::new(PanickingStrategy));
        registry.register(healthy.clone());

        registry.run_tick().await;
        assert_eq!(healthy.recoveries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_runs_before_next_tick() {
        let registry = Arc::new(RecoveryRegistry::new());
        let condition = Arc::new(AtomicBool::new(true));
        let strategy = Arc::new(CountingStrategy::new("s", condition, true));
        registry.register(strategy.clone());

        let shutdown = crate::lifecycle::Shutdown::new();
        let handle = tokio::spawn(registry.clone().run(
            RecoveryConfig {
                tick_interval_secs: 3600,
            },
            shutdown.subscribe(),
        ));

        // Let the scheduler reach its select loop, then wake it.
        time::sleep(Duration::from_millis(10)).await;
        registry.trigger();
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(strategy.recoveries.load(Ordering::SeqCst), 1);

        shutdown.trigger();
        let _ = handle.await;
    }
}
