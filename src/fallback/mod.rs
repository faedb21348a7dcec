//! Fallback strategy resolution.
//!
//! # Data Flow
//! ```text
//! Breaker open or retries exhausted:
//!     → resolver.rs (dispatch on the configured FallbackStrategy)
//!     → cached: last good result, if fresh
//!     → degraded: labeled sentinel, never fabricated data
//!     → alternate: marker back to the registry for a one-hop redirect
//!     → disabled: immediate error
//! ```
//!
//! # Design Decisions
//! - Strategy is a tagged enum typed at config load, not a runtime string
//! - A fallback result is always distinguishable from a real answer
//! - The breaker's fallback_active flag is set while a substitute serves
//!   and cleared by the next direct success

pub mod resolver;

use serde::Serialize;

pub use resolver::{resolve_local, Resolution, ResultCache};

/// Explicitly labeled notice returned by the degraded strategy.
#[derive(Debug, Clone, Serialize)]
pub struct DegradedNotice {
    pub dependency: String,
    /// Always `"service_unavailable"`; downstream consumers key off this.
    pub status: &'static str,
}

impl DegradedNotice {
    pub fn new(dependency: impl Into<String>) -> Self {
        Self {
            dependency: dependency.into(),
            status: "service_unavailable",
        }
    }
}

/// A substitute result produced by fallback resolution.
///
/// Tagged by origin so no consumer can mistake it for a direct answer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum FallbackValue {
    /// A previously observed successful result within its freshness window.
    Cached {
        value: serde_json::Value,
        age_ms: u64,
    },
    /// Service-unavailable sentinel.
    Degraded { notice: DegradedNotice },
    /// Result obtained from the configured alternate dependency.
    Alternate {
        dependency: String,
        value: serde_json::Value,
    },
}
