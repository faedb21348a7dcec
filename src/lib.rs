//! Fault-Tolerant Dependency Execution Engine
//!
//! Wraps calls to flaky external dependencies with per-dependency
//! circuit breakers, bounded retries with jittered backoff, configured
//! fallback strategies, a durable write buffer, health probing, and
//! automated recovery strategies.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌────────────────────────────────────────────────┐
//!                 │            DEPENDENCY REGISTRY                  │
//!   Caller ──────▶│  call(name, op)                                 │
//!                 │    ├─▶ retry executor ──▶ circuit breaker       │
//!                 │    │         │ open/exhausted                   │
//!                 │    └─▶ fallback resolver (cached / degraded /   │
//!                 │                           alternate / disabled) │
//!                 │                                                 │
//!                 │  persist(record)                                │
//!                 │    ├─▶ direct write to primary store            │
//!                 │    └─▶ fallback buffer ──▶ drain task           │
//!                 └────────────────────────────────────────────────┘
//!                    ▲                         ▲
//!          probe orchestrator          recovery registry
//!          (readiness/liveness)        (detect/recover/fallback)
//! ```

pub mod admin;
pub mod breaker;
pub mod buffer;
pub mod config;
pub mod dependency;
pub mod error;
pub mod fallback;
pub mod lifecycle;
pub mod observability;
pub mod probe;
pub mod recovery;
pub mod retry;
pub mod sink;

pub use config::schema::AegisConfig;
pub use dependency::{CallOutcome, DependencyRegistry, PersistOutcome};
pub use lifecycle::Shutdown;
