//! Per-dependency wiring and the caller-facing call path.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::breaker::{BreakerSnapshot, CircuitBreaker, LoggingObserver};
use crate::buffer::FallbackBuffer;
use crate::config::schema::{AegisConfig, DependencyConfig, PriorityTier};
use crate::error::{CallError, DependencyError, ExecuteError, FallbackError};
use crate::fallback::resolver::{resolve_local, Resolution, ResultCache};
use crate::fallback::FallbackValue;
use crate::observability::metrics;
use crate::probe::types::{ProbeStatus, ProbeTransition};
use crate::probe::ProbeListener;
use crate::retry::{executor, RetryPolicy};
use crate::sink::{BoxFuture, PersistenceSink, WriteRecord};

/// Boxed operation future produced by a registered handler.
pub type OpFuture = BoxFuture<'static, Result<serde_json::Value, DependencyError>>;

/// A dependency's own way of being called, registered up front so the
/// alternate-fallback path can invoke it without caller involvement.
pub type Handler = Arc<dyn Fn() -> OpFuture + Send + Sync>;

/// Result of a managed call; a degraded answer is never mistakable for
/// a real one.
#[derive(Debug)]
pub enum CallOutcome {
    /// The dependency answered directly.
    Direct(serde_json::Value),
    /// A substitute produced by the fallback strategy.
    Fallback(FallbackValue),
}

/// Where a write-through attempt ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// The primary store accepted the write directly.
    Synced,
    /// The write is held in the fallback buffer for replay.
    Buffered(Uuid),
}

struct Entry {
    config: DependencyConfig,
    breaker: Arc<CircuitBreaker>,
    policy: Arc<RetryPolicy>,
    handler: RwLock<Option<Handler>>,
}

/// Explicitly constructed registry of managed dependencies.
///
/// Owns one breaker and one policy binding per dependency plus the
/// shared last-good-result cache and the fallback buffer. No global
/// state; everything that needs the registry receives an `Arc`.
pub struct DependencyRegistry {
    entries: DashMap<String, Arc<Entry>>,
    cache: ResultCache,
    buffer: Arc<FallbackBuffer>,
    store_service: String,
}

impl DependencyRegistry {
    /// Build breakers and policy bindings from validated config.
    pub fn from_config(config: &AegisConfig) -> Self {
        let mut policies: HashMap<String, Arc<RetryPolicy>> = HashMap::new();
        policies.insert("default".to_string(), Arc::new(RetryPolicy::default()));
        for policy_config in &config.retry_policies {
            policies.insert(
                policy_config.name.clone(),
                Arc::new(RetryPolicy::from_config(policy_config)),
            );
        }
        let default_policy = policies["default"].clone();

        let entries = DashMap::new();
        for dep in &config.dependencies {
            let settings = crate::breaker::BreakerSettings {
                failure_threshold: config.breaker.failure_threshold_for(dep.tier),
                success_threshold: config.breaker.success_threshold,
                reset_timeout: config.breaker.reset_timeout(),
            };
            let breaker = Arc::new(CircuitBreaker::new(dep.name.clone(), settings));
            breaker.subscribe(Arc::new(LoggingObserver));
            let policy = policies
                .get(&dep.retry_policy)
                .cloned()
                .unwrap_or_else(|| default_policy.clone());
            entries.insert(
                dep.name.clone(),
                Arc::new(Entry {
                    config: dep.clone(),
                    breaker,
                    policy,
                    handler: RwLock::new(None),
                }),
            );
        }

        Self {
            entries,
            cache: ResultCache::new(),
            buffer: Arc::new(FallbackBuffer::new(config.buffer.clone())),
            store_service: config.buffer.store_service.clone(),
        }
    }

    /// Attach the canonical way to invoke a dependency. Required for any
    /// dependency that serves as an alternate-fallback target. Returns
    /// false when the dependency is unknown.
    pub fn register_handler(&self, name: &str, handler: Handler) -> bool {
        match self.entries.get(name) {
            Some(entry) => {
                *entry.handler.write().unwrap_or_else(|e| e.into_inner()) = Some(handler);
                true
            }
            None => false,
        }
    }

    pub fn breaker(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.entries.get(name).map(|e| e.breaker.clone())
    }

    pub fn buffer(&self) -> Arc<FallbackBuffer> {
        self.buffer.clone()
    }

    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<BreakerSnapshot> = self
            .entries
            .iter()
            .map(|entry| entry.value().breaker.snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.dependency.cmp(&b.dependency));
        snapshots
    }

    /// Periodic task halving every breaker's cumulative stats.
    ///
    /// Keeps `failure_rate` a rolling figure over recent traffic rather
    /// than a since-startup average.
    pub async fn run_stat_decay(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        tracing::info!(
            interval_secs = interval.as_secs(),
            "Breaker stat decay task starting"
        );
        let mut ticker = tokio::time::interval(interval);
        // The immediate first tick would decay before any traffic.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for entry in self.entries.iter() {
                        entry.value().breaker.decay_stats();
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Stat decay task received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Execute a call against a managed dependency.
    ///
    /// The direct path runs under the dependency's retry policy and
    /// breaker; an open breaker or exhausted retries route to the
    /// configured fallback strategy. Every direct success refreshes the
    /// last-good-result cache.
    pub async fn call<F, Fut>(&self, name: &str, op: F) -> Result<CallOutcome, CallError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<serde_json::Value, DependencyError>>,
    {
        let entry = self
            .entries
            .get(name)
            .map(|e| e.value().clone())
            .ok_or_else(|| CallError::UnknownDependency(name.to_string()))?;

        match executor::execute(&entry.breaker, &entry.policy, entry.config.call_timeout(), op)
            .await
        {
            Ok(value) => {
                self.cache.store(name, value.clone());
                Ok(CallOutcome::Direct(value))
            }
            Err(err @ ExecuteError::NonRetryable(_)) => Err(CallError::Rejected(err)),
            Err(call_err) => self.resolve_fallback(name, &entry, call_err).await,
        }
    }

    async fn resolve_fallback(
        &self,
        name: &str,
        entry: &Entry,
        call_err: ExecuteError,
    ) -> Result<CallOutcome, CallError> {
        match resolve_local(name, &entry.config.fallback, &self.cache, &entry.breaker) {
            Ok(Resolution::Value(value)) => {
                metrics::record_fallback(name, fallback_kind(&value));
                Ok(CallOutcome::Fallback(value))
            }
            Ok(Resolution::Alternate(alt)) => match self.call_alternate(name, entry, &alt).await {
                Ok(outcome) => Ok(outcome),
                Err(fallback) => Err(CallError::Exhausted {
                    name: name.to_string(),
                    call: call_err,
                    fallback,
                }),
            },
            Err(fallback) => Err(CallError::Exhausted {
                name: name.to_string(),
                call: call_err,
                fallback,
            }),
        }
    }

    /// One-hop redirect through the alternate's own breaker and policy.
    async fn call_alternate(
        &self,
        name: &str,
        entry: &Entry,
        alt: &str,
    ) -> Result<CallOutcome, FallbackError> {
        let alt_entry = self
            .entries
            .get(alt)
            .map(|e| e.value().clone())
            .ok_or_else(|| FallbackError::AlternateUnavailable(alt.to_string()))?;

        // One hop only: an alternate that itself redirects is refused
        // rather than chained.
        if matches!(
            alt_entry.config.fallback,
            crate::config::schema::FallbackStrategy::Alternate { .. }
        ) {
            return Err(FallbackError::AlternateDepth(name.to_string()));
        }

        let handler = alt_entry
            .handler
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| FallbackError::AlternateUnavailable(alt.to_string()))?;

        tracing::info!(
            dependency = %name,
            alternate = %alt,
            "Redirecting to alternate dependency"
        );
        match executor::execute(
            &alt_entry.breaker,
            &alt_entry.policy,
            alt_entry.config.call_timeout(),
            move || handler(),
        )
        .await
        {
            Ok(value) => {
                self.cache.store(alt, value.clone());
                entry.breaker.set_fallback_active(true);
                metrics::record_fallback(name, "alternate");
                Ok(CallOutcome::Fallback(FallbackValue::Alternate {
                    dependency: alt.to_string(),
                    value,
                }))
            }
            Err(err) => Err(FallbackError::AlternateFailed(alt.to_string(), err)),
        }
    }

    /// Write-through with buffer fallback.
    ///
    /// The direct attempt runs under the primary store's breaker and
    /// policy when the store is a managed dependency; on any failure the
    /// record lands in the fallback buffer and the caller proceeds.
    pub async fn persist(
        &self,
        sink: &dyn PersistenceSink,
        record: WriteRecord,
        severity: PriorityTier,
    ) -> PersistOutcome {
        let direct = match self.entries.get(self.store_service.as_str()) {
            Some(entry) => {
                let entry = entry.value().clone();
                let record_ref = &record;
                executor::execute(
                    &entry.breaker,
                    &entry.policy,
                    entry.config.call_timeout(),
                    move || async move { sink.persist(record_ref).await.map(|()| ()) },
                )
                .await
                .map(|_| ())
            }
            // Store not managed as a dependency: single unguarded attempt.
            None => sink
                .persist(&record)
                .await
                .map_err(ExecuteError::NonRetryable),
        };

        match direct {
            Ok(()) => PersistOutcome::Synced,
            Err(err) => {
                let id = self.buffer.enqueue(record, severity);
                tracing::warn!(
                    store = %self.store_service,
                    action_id = %id,
                    severity = severity.as_str(),
                    error = %err,
                    "Direct write failed, buffered for replay"
                );
                PersistOutcome::Buffered(id)
            }
        }
    }
}

fn fallback_kind(value: &FallbackValue) -> &'static str {
    match value {
        FallbackValue::Cached { .. } => "cached",
        FallbackValue::Degraded { .. } => "degraded",
        FallbackValue::Alternate { .. } => "alternate",
    }
}

impl ProbeListener for DependencyRegistry {
    /// Readiness outcomes steer the breakers of dependencies linked via
    /// `health_service`: confirmed down opens them, confirmed recovered
    /// makes the next call probe immediately.
    fn on_probe_transition(&self, event: &ProbeTransition) {
        match event.to {
            ProbeStatus::NotReady => {
                for entry in self.entries.iter() {
                    let e = entry.value();
                    if e.config.health_service.as_deref() == Some(event.service.as_str()) {
                        tracing::warn!(
                            dependency = %e.config.name,
                            service = %event.service,
                            "Readiness probe confirmed down, opening breaker"
                        );
                        e.breaker.probe_open();
                    }
                }
            }
            ProbeStatus::Ready => {
                for entry in self.entries.iter() {
                    let e = entry.value();
                    if e.config.health_service.as_deref() == Some(event.service.as_str()) {
                        e.breaker.shorten_retry();
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{FallbackStrategy, ProbeKind};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    fn config_with(dependencies: Vec<DependencyConfig>) -> AegisConfig {
        AegisConfig {
            dependencies,
            ..Default::default()
        }
    }

    fn dep(name: &str, fallback: FallbackStrategy) -> DependencyConfig {
        DependencyConfig {
            name: name.to_string(),
            tier: PriorityTier::High,
            call_timeout_ms: 1_000,
            retry_policy: "default".to_string(),
            fallback,
            health_service: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_direct_success_populates_cache() {
        let registry = DependencyRegistry::from_config(&config_with(vec![dep(
            "rates",
            FallbackStrategy::Cached { freshness_secs: 60 },
        )]));

        let outcome = registry
            .call("rates", || async { Ok(json!({"usd": 1.09})) })
            .await
            .unwrap();
        assert!(matches!(outcome, CallOutcome::Direct(_)));

        // Break the dependency; the cached value takes over
        let breaker = registry.breaker("rates").unwrap();
        breaker.force_open();
        let outcome = registry
            .call("rates", || async { Ok(json!({"usd": 0.0})) })
            .await
            .unwrap();
        match outcome {
            CallOutcome::Fallback(FallbackValue::Cached { value, .. }) => {
                assert_eq!(value, json!({"usd": 1.09}));
            }
            other => panic!("expected cached fallback, got {:?}", other),
        }
        assert!(breaker.fallback_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_dependency_rejected() {
        let registry = DependencyRegistry::from_config(&config_with(vec![]));
        let result = registry.call("ghost", || async { Ok(json!(null)) }).await;
        assert!(matches!(result, Err(CallError::UnknownDependency(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_skips_fallback() {
        let registry = DependencyRegistry::from_config(&config_with(vec![dep(
            "tax",
            FallbackStrategy::Degraded,
        )]));
        let result = registry
            .call("tax", || async {
                Err::<serde_json::Value, _>(DependencyError::Validation("bad input".into()))
            })
            .await;
        assert!(matches!(result, Err(CallError::Rejected(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_alternate_single_hop() {
        let registry = DependencyRegistry::from_config(&config_with(vec![
            dep(
                "primary-quotes",
                FallbackStrategy::Alternate {
                    dependency: "backup-quotes".to_string(),
                },
            ),
            dep("backup-quotes", FallbackStrategy::Degraded),
        ]));
        registry.register_handler(
            "backup-quotes",
            Arc::new(|| Box::pin(async { Ok(json!({"quote": 99})) })),
        );

        registry.breaker("primary-quotes").unwrap().force_open();
        let outcome = registry
            .call("primary-quotes", || async { Ok(json!(null)) })
            .await
            .unwrap();
        match outcome {
            CallOutcome::Fallback(FallbackValue::Alternate { dependency, value }) => {
                assert_eq!(dependency, "backup-quotes");
                assert_eq!(value, json!({"quote": 99}));
            }
            other => panic!("expected alternate fallback, got {:?}", other),
        }
        assert!(registry.breaker("primary-quotes").unwrap().fallback_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_alternate_chain_refused() {
        let registry = DependencyRegistry::from_config(&config_with(vec![
            dep(
                "a",
                FallbackStrategy::Alternate {
                    dependency: "b".to_string(),
                },
            ),
            dep(
                "b",
                FallbackStrategy::Alternate {
                    dependency: "c".to_string(),
                },
            ),
            dep("c", FallbackStrategy::Degraded),
        ]));
        registry.register_handler("b", Arc::new(|| Box::pin(async { Ok(json!(1)) })));

        registry.breaker("a").unwrap().force_open();
        let result = registry.call("a", || async { Ok(json!(null)) }).await;
        match result {
            Err(CallError::Exhausted { fallback, .. }) => {
                assert!(matches!(fallback, FallbackError::AlternateDepth(_)));
            }
            other => panic!("expected exhausted with depth error, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_persist_buffers_on_store_failure() {
        struct FlakySink {
            up: AtomicBool,
            writes: AtomicU32,
        }
        impl PersistenceSink for FlakySink {
            fn persist<'a>(
                &'a self,
                _record: &'a WriteRecord,
            ) -> BoxFuture<'a, Result<(), DependencyError>> {
                Box::pin(async move {
                    self.writes.fetch_add(1, Ordering::SeqCst);
                    if self.up.load(Ordering::SeqCst) {
                        Ok(())
                    } else {
                        Err(DependencyError::ConnectionRefused)
                    }
                })
            }
        }

        let registry = DependencyRegistry::from_config(&config_with(vec![dep(
            "primary-store",
            FallbackStrategy::Disabled,
        )]));
        let sink = FlakySink {
            up: AtomicBool::new(false),
            writes: AtomicU32::new(0),
        };

        let record = WriteRecord {
            kind: "audit_event".to_string(),
            payload: json!({"action": "login"}),
        };
        let outcome = registry
            .persist(&sink, record, PriorityTier::Critical)
            .await;
        assert!(matches!(outcome, PersistOutcome::Buffered(_)));
        assert_eq!(registry.buffer().depth(), 1);

        // Store recovers; drain replays the buffered write
        sink.up.store(true, Ordering::SeqCst);
        let report = registry.buffer().drain(&sink).await;
        assert_eq!(report.synced, 1);
        assert_eq!(registry.buffer().depth(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stat_decay_task_makes_failure_rate_rolling() {
        let registry = Arc::new(DependencyRegistry::from_config(&config_with(vec![dep(
            "rates",
            FallbackStrategy::Degraded,
        )])));
        let breaker = registry.breaker("rates").unwrap();
        breaker.record_failure(false);
        breaker.record_failure(false);
        breaker.record_success();
        assert!(breaker.snapshot().failure_rate > 0.6);

        let shutdown = crate::lifecycle::Shutdown::new();
        let handle = tokio::spawn(
            registry
                .clone()
                .run_stat_decay(Duration::from_secs(60), shutdown.subscribe()),
        );

        tokio::time::sleep(Duration::from_secs(181)).await;
        let snap = breaker.snapshot();
        assert!(snap.total_calls <= 1, "three decay passes shrink the window");

        // Fresh traffic dominates the decayed history
        breaker.record_success();
        breaker.record_success();
        assert!(breaker.snapshot().failure_rate < 0.4);

        shutdown.trigger();
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_transitions_steer_breakers() {
        let mut managed = dep("orders", FallbackStrategy::Degraded);
        managed.health_service = Some("orders-svc".to_string());
        let registry = DependencyRegistry::from_config(&config_with(vec![managed]));
        let breaker = registry.breaker("orders").unwrap();

        registry.on_probe_transition(&ProbeTransition {
            probe: "orders-ready".to_string(),
            service: "orders-svc".to_string(),
            kind: ProbeKind::Readiness,
            from: ProbeStatus::Unknown,
            to: ProbeStatus::NotReady,
            restart_count: 0,
        });
        assert_eq!(breaker.state(), crate::breaker::CircuitState::Open);

        registry.on_probe_transition(&ProbeTransition {
            probe: "orders-ready".to_string(),
            service: "orders-svc".to_string(),
            kind: ProbeKind::Readiness,
            from: ProbeStatus::NotReady,
            to: ProbeStatus::Ready,
            restart_count: 0,
        });
        // Retry window pulled forward: the next call probes immediately
        assert!(breaker.allow());
        assert_eq!(breaker.state(), crate::breaker::CircuitState::HalfOpen);
    }
}
