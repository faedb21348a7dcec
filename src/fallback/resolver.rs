//! Strategy dispatch and the last-good-result cache.

use crate::breaker::CircuitBreaker;
use crate::config::schema::FallbackStrategy;
use crate::error::FallbackError;
use crate::fallback::{DegradedNotice, FallbackValue};
use dashmap::DashMap;
use std::time::Duration;
// Runtime clock, so paused-clock tests exercise the freshness window.
use tokio::time::Instant;

/// Most recent successful result per dependency, feeding the `cached`
/// strategy. Written by the call path on every direct success.
#[derive(Default)]
pub struct ResultCache {
    inner: DashMap<String, (Instant, serde_json::Value)>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, dependency: &str, value: serde_json::Value) {
        self.inner.insert(dependency.to_string(), (Instant::now(), value));
    }

    /// Return the cached value and its age if one exists within `window`.
    pub fn fresh(&self, dependency: &str, window: Duration) -> Option<(serde_json::Value, Duration)> {
        let entry = self.inner.get(dependency)?;
        let (at, value) = entry.value();
        let age = at.elapsed();
        if age <= window {
            Some((value.clone(), age))
        } else {
            None
        }
    }

    pub fn contains(&self, dependency: &str) -> bool {
        self.inner.contains_key(dependency)
    }
}

/// Outcome of local strategy dispatch.
#[derive(Debug)]
pub enum Resolution {
    /// A substitute result was produced here.
    Value(FallbackValue),
    /// The caller must redirect to this alternate dependency through the
    /// full executor/breaker path (one hop only).
    Alternate(String),
}

/// Resolve every strategy that needs no further dependency call.
///
/// Marks the breaker's fallback flag when a substitute is produced; the
/// alternate marker leaves flagging to the redirecting caller.
pub fn resolve_local(
    dependency: &str,
    strategy: &FallbackStrategy,
    cache: &ResultCache,
    breaker: &CircuitBreaker,
) -> Result<Resolution, FallbackError> {
    match strategy {
        FallbackStrategy::Cached { freshness_secs } => {
            let window = Duration::from_secs(*freshness_secs);
            match cache.fresh(dependency, window) {
                Some((value, age)) => {
                    breaker.set_fallback_active(true);
                    tracing::info!(
                        dependency = %dependency,
                        age_ms = age.as_millis() as u64,
                        "Serving cached fallback result"
                    );
                    Ok(Resolution::Value(FallbackValue::Cached {
                        value,
                        age_ms: age.as_millis() as u64,
                    }))
                }
                None if cache.contains(dependency) => {
                    Err(FallbackError::Stale(dependency.to_string()))
                }
                None => Err(FallbackError::NoCached(dependency.to_string())),
            }
        }
        FallbackStrategy::Degraded => {
            breaker.set_fallback_active(true);
            tracing::info!(dependency = %dependency, "Serving degraded sentinel");
            Ok(Resolution::Value(FallbackValue::Degraded {
                notice: DegradedNotice::new(dependency),
            }))
        }
        FallbackStrategy::Alternate { dependency: alt } => Ok(Resolution::Alternate(alt.clone())),
        FallbackStrategy::Disabled => Err(FallbackError::Disabled(dependency.to_string())),
    }
}
