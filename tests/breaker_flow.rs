//! End-to-end breaker behavior through the dependency registry.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use aegis::breaker::CircuitState;
use aegis::config::schema::{
    AegisConfig, BreakerConfig, DependencyConfig, FallbackStrategy, PriorityTier,
    RetryPolicyConfig,
};
use aegis::error::DependencyError;
use aegis::fallback::FallbackValue;
use aegis::{CallOutcome, DependencyRegistry};

fn dependency(name: &str, tier: PriorityTier, fallback: FallbackStrategy) -> DependencyConfig {
    DependencyConfig {
        name: name.to_string(),
        tier,
        call_timeout_ms: 1_000,
        retry_policy: "default".to_string(),
        fallback,
        health_service: None,
    }
}

#[tokio::test(start_paused = true)]
async fn test_critical_tier_opens_after_three_failures() {
    let config = AegisConfig {
        dependencies: vec![dependency(
            "payments",
            PriorityTier::Critical,
            FallbackStrategy::Degraded,
        )],
        ..Default::default()
    };
    let registry = DependencyRegistry::from_config(&config);

    // Default policy: 3 attempts. One exhausted call produces exactly
    // the critical-tier threshold of consecutive failures.
    let calls = Arc::new(AtomicU32::new(0));
    let c = calls.clone();
    let outcome = registry
        .call("payments", move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<serde_json::Value, _>(DependencyError::RemoteStatus(503))
            }
        })
        .await
        .unwrap();
    // Exhausted retries fall through to the degraded strategy
    assert!(matches!(
        outcome,
        CallOutcome::Fallback(FallbackValue::Degraded { .. })
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let breaker = registry.breaker("payments").unwrap();
    assert_eq!(breaker.state(), CircuitState::Open);
    assert!(breaker.fallback_active());

    // While open, the operation is never invoked
    let c = calls.clone();
    let outcome = registry
        .call("payments", move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(json!("should not run"))
            }
        })
        .await
        .unwrap();
    assert!(matches!(outcome, CallOutcome::Fallback(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 3, "open breaker fails fast");
}

#[tokio::test(start_paused = true)]
async fn test_cached_fallback_then_direct_recovery() {
    let config = AegisConfig {
        dependencies: vec![dependency(
            "fx-rates",
            PriorityTier::High,
            FallbackStrategy::Cached { freshness_secs: 300 },
        )],
        ..Default::default()
    };
    let registry = DependencyRegistry::from_config(&config);
    let breaker = registry.breaker("fx-rates").unwrap();

    let outcome = registry
        .call("fx-rates", || async { Ok(json!({"eur": 0.92})) })
        .await
        .unwrap();
    assert!(matches!(outcome, CallOutcome::Direct(_)));

    breaker.force_open();
    let outcome = registry
        .call("fx-rates", || async { Ok(json!(null)) })
        .await
        .unwrap();
    match outcome {
        CallOutcome::Fallback(FallbackValue::Cached { value, .. }) => {
            assert_eq!(value, json!({"eur": 0.92}));
        }
        other => panic!("expected cached fallback, got {:?}", other),
    }
    assert!(breaker.fallback_active());

    // Operator closes the breaker; the next direct success ends the
    // fallback episode.
    breaker.force_close();
    let outcome = registry
        .call("fx-rates", || async { Ok(json!({"eur": 0.93})) })
        .await
        .unwrap();
    assert!(matches!(outcome, CallOutcome::Direct(_)));
    assert!(!breaker.fallback_active());
}

#[tokio::test(start_paused = true)]
async fn test_open_breaker_recovers_through_half_open() {
    let config = AegisConfig {
        dependencies: vec![DependencyConfig {
            name: "search".to_string(),
            tier: PriorityTier::Medium,
            call_timeout_ms: 1_000,
            retry_policy: "single".to_string(),
            fallback: FallbackStrategy::Degraded,
            health_service: None,
        }],
        retry_policies: vec![RetryPolicyConfig {
            name: "single".to_string(),
            max_attempts: 1,
            ..Default::default()
        }],
        breaker: BreakerConfig {
            success_threshold: 1,
            reset_timeout_secs: 1,
            failure_threshold: Some(1),
            ..Default::default()
        },
        ..Default::default()
    };
    let registry = DependencyRegistry::from_config(&config);
    let breaker = registry.breaker("search").unwrap();

    let outcome = registry
        .call("search", || async {
            Err::<serde_json::Value, _>(DependencyError::ConnectionReset)
        })
        .await
        .unwrap();
    assert!(matches!(outcome, CallOutcome::Fallback(_)));
    assert_eq!(breaker.state(), CircuitState::Open);

    // Reset timeout elapses; the next call probes and closes the circuit
    tokio::time::sleep(Duration::from_secs(2)).await;
    let outcome = registry
        .call("search", || async { Ok(json!({"hits": 7})) })
        .await
        .unwrap();
    assert!(matches!(outcome, CallOutcome::Direct(_)));
    assert_eq!(breaker.state(), CircuitState::Closed);
}
