//! Health probing subsystem.
//!
//! # Data Flow
//! ```text
//! Per-probe task (orchestrator.rs):
//!     Independent timer → run check with timeout
//!     → types.rs record (consecutive-threshold hysteresis)
//!     → confirmed transition → listeners (breaker wiring, recovery)
//!
//! Consumers:
//!     Readiness → gates buffer drains, shortens open-breaker retry
//!     Liveness → restart counter + recovery-needed signal
//! ```
//!
//! # Design Decisions
//! - Readiness and liveness are separate probes with separate meanings;
//!   a live-but-not-ready service is never restarted
//! - State transitions require consecutive successes/failures
//! - Probes never block one another

pub mod http;
pub mod orchestrator;
pub mod types;

pub use http::HttpHealthCheck;
pub use orchestrator::{ProbeListener, ProbeOrchestrator};
pub use types::{FnCheck, HealthCheck, ProbeRecord, ProbeSnapshot, ProbeStatus, ProbeTransition};
