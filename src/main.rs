//! Resilience engine daemon.
//!
//! Startup order: config, logging, metrics, core registries, background
//! tasks (probes, buffer drain, recovery scheduler), admin API. SIGINT
//! triggers a broadcast shutdown that every task honors.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use aegis::admin::{setup_admin_router, AdminState};
use aegis::buffer::DrainTask;
use aegis::config::loader::load_config;
use aegis::observability::{logging, metrics};
use aegis::probe::ProbeOrchestrator;
use aegis::recovery::RecoveryRegistry;
use aegis::sink::HttpSink;
use aegis::{AegisConfig, DependencyRegistry, Shutdown};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => load_config(Path::new(&path))?,
        None => AegisConfig::default(),
    };

    logging::init_logging(&format!("aegis={}", config.observability.log_level));
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        dependencies = config.dependencies.len(),
        probes = config.probes.len(),
        "aegis starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let registry = Arc::new(DependencyRegistry::from_config(&config));
    let probes = Arc::new(ProbeOrchestrator::from_config(&config.probes));
    let recovery = Arc::new(RecoveryRegistry::new());

    // Probe outcomes steer breakers and wake the recovery scheduler.
    probes.register_listener(registry.clone());
    probes.register_listener(recovery.clone());

    let shutdown = Shutdown::new();
    let mut tasks = probes.spawn_all(&shutdown);

    if let Some(url) = &config.buffer.store_url {
        let drain = DrainTask::new(
            registry.buffer(),
            Arc::new(HttpSink::new(url.clone())),
            probes.clone(),
            config.buffer.store_service.clone(),
            config.buffer.drain_interval(),
        );
        tasks.push(tokio::spawn(drain.run(shutdown.subscribe())));
    } else {
        tracing::warn!("No store_url configured; buffered writes will not drain");
    }

    tasks.push(tokio::spawn(registry.clone().run_stat_decay(
        config.breaker.stat_decay_interval(),
        shutdown.subscribe(),
    )));

    tasks.push(tokio::spawn(
        recovery
            .clone()
            .run(config.recovery.clone(), shutdown.subscribe()),
    ));

    if config.admin.enabled {
        let state = AdminState {
            registry: registry.clone(),
            probes: probes.clone(),
            api_key: config.admin.api_key.clone().into(),
        };
        let router = setup_admin_router(state);
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %config.admin.bind_address, "Admin API listening");
        let mut admin_shutdown = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = admin_shutdown.recv().await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "Admin server error");
            }
        }));
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    shutdown.trigger();

    for task in tasks {
        if tokio::time::timeout(Duration::from_secs(5), task).await.is_err() {
            tracing::warn!("Task did not stop within the shutdown deadline");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
