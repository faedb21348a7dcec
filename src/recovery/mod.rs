//! Automated recovery subsystem.
//!
//! # Data Flow
//! ```text
//! Shared tick (or liveness-triggered wake):
//!     for each strategy: detect → recover → fallback on failure
//! ```
//!
//! # Design Decisions
//! - Strategies are independent; one failure never stops the rest
//! - detect/recover are idempotent so repeated ticks are safe
//! - Liveness-dead events wake the scheduler instead of running
//!   strategies inline on the probe task

pub mod registry;

pub use registry::{FnStrategy, RecoveryRegistry, RecoveryStrategy};
