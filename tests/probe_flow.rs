//! Probe-driven breaker steering and recovery triggering.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use aegis::breaker::CircuitState;
use aegis::config::schema::{
    AegisConfig, DependencyConfig, FallbackStrategy, PriorityTier, ProbeConfig, ProbeKind,
};
use aegis::probe::ProbeOrchestrator;
use aegis::recovery::{FnStrategy, RecoveryRegistry};
use aegis::{DependencyRegistry, Shutdown};

mod common;

fn probe(name: &str, service: &str, kind: ProbeKind) -> ProbeConfig {
    ProbeConfig {
        name: name.to_string(),
        service: service.to_string(),
        kind,
        http_url: None,
        interval_secs: 5,
        timeout_secs: 2,
        success_threshold: 2,
        failure_threshold: 2,
    }
}

#[tokio::test(start_paused = true)]
async fn test_confirmed_not_ready_opens_linked_breaker() {
    let config = AegisConfig {
        dependencies: vec![DependencyConfig {
            name: "orders".to_string(),
            tier: PriorityTier::High,
            call_timeout_ms: 1_000,
            retry_policy: "default".to_string(),
            fallback: FallbackStrategy::Degraded,
            health_service: Some("orders-svc".to_string()),
        }],
        ..Default::default()
    };
    let registry = Arc::new(DependencyRegistry::from_config(&config));
    let breaker = registry.breaker("orders").unwrap();

    let probes = Arc::new(ProbeOrchestrator::new());
    let svc_up = Arc::new(AtomicBool::new(false));
    probes.register_probe(
        probe("orders-ready", "orders-svc", ProbeKind::Readiness),
        common::flag_check(svc_up.clone()),
    );
    probes.register_listener(registry.clone());

    let shutdown = Shutdown::new();
    let tasks = probes.spawn_all(&shutdown);

    // Two consecutive failures confirm NotReady and open the breaker
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(breaker.state(), CircuitState::Open);

    // Two consecutive passes confirm Ready; the breaker's retry window
    // collapses so the next call probes immediately
    svc_up.store(true, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert!(breaker.allow());
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    shutdown.trigger();
    for task in tasks {
        let _ = task.await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_confirmed_dead_triggers_recovery() {
    let probes = Arc::new(ProbeOrchestrator::new());
    let alive = Arc::new(AtomicBool::new(false));
    probes.register_probe(
        probe("worker-live", "worker", ProbeKind::Liveness),
        common::flag_check(alive),
    );

    let recovery = Arc::new(RecoveryRegistry::new());
    let recovered = Arc::new(AtomicBool::new(false));
    let flag = recovered.clone();
    recovery.register(Arc::new(FnStrategy::new(
        "restart-worker",
        || Box::pin(async { true }),
        move || {
            flag.store(true, Ordering::SeqCst);
            Box::pin(async { true })
        },
    )));
    probes.register_listener(recovery.clone());

    let shutdown = Shutdown::new();
    let tasks = probes.spawn_all(&shutdown);
    let scheduler = tokio::spawn(recovery.clone().run(
        aegis::config::schema::RecoveryConfig {
            tick_interval_secs: 3600,
        },
        shutdown.subscribe(),
    ));

    // Two failed liveness checks confirm Dead; the wake runs strategies
    // long before the hourly tick
    tokio::time::sleep(Duration::from_secs(12)).await;
    assert!(recovered.load(Ordering::SeqCst));

    shutdown.trigger();
    let _ = scheduler.await;
    for task in tasks {
        let _ = task.await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_force_pass_unblocks_readiness() {
    let probes = ProbeOrchestrator::new();
    let down = Arc::new(AtomicBool::new(false));
    probes.register_probe(
        probe("store-ready", "store", ProbeKind::Readiness),
        common::flag_check(down),
    );

    use aegis::buffer::ReadinessGate;
    assert!(!probes.is_ready("store"));
    assert!(probes.force_pass("store"));
    assert!(probes.is_ready("store"));
}
