//! Dependency orchestration facade.
//!
//! # Data Flow
//! ```text
//! Caller → registry.call(name, op)
//!     → retrying executor (breaker gate, backoff, per-attempt timeout)
//!     → direct success: refresh cache, CallOutcome::Direct
//!     → open/exhausted: fallback strategy → CallOutcome::Fallback
//!
//! Caller → registry.persist(sink, record, severity)
//!     → direct write under the store's breaker
//!     → on failure: fallback buffer, replayed by the drain task
//! ```
//!
//! # Design Decisions
//! - No globals: the registry is constructed once and passed by `Arc`
//! - Alternate fallback is one hop; the hop runs under the alternate's
//!   own breaker and policy
//! - Probe transitions steer breakers through the `health_service` link

pub mod registry;

pub use registry::{CallOutcome, DependencyRegistry, Handler, OpFuture, PersistOutcome};
