//! Durable fallback buffering subsystem.
//!
//! # Data Flow
//! ```text
//! Direct write to the primary store fails:
//!     → store.rs (enqueue write-intent, bounded with priority eviction)
//!
//! Periodic drain (drain.rs):
//!     Timer tick → readiness gate → replay priority-ordered entries
//!     → synced entries removed; failures bump retry counts
//!     → retry/age bounds exceeded → discard, logged
//! ```
//!
//! # Design Decisions
//! - Enqueue never blocks the caller and never fails
//! - Intended for idempotent or append-only records; callers own
//!   idempotency keys for anything duplication-sensitive
//! - One shared buffer across severities: priority eviction already
//!   protects audit-critical entries, and one buffer means one drain
//!   path and one readiness gate
//! - The internal lock covers bookkeeping only, never sink I/O

pub mod drain;
pub mod store;

pub use drain::{DrainTask, ReadinessGate};
pub use store::{BufferStats, BufferedAction, DrainReport, FallbackBuffer};
