//! Observability subsystem.
//!
//! # Responsibilities
//! - Structured logging via tracing (logging.rs)
//! - Prometheus metrics exposition (metrics.rs)
//!
//! # Design Decisions
//! - Every state transition is logged with structured fields; log lines
//!   are the primary operational record
//! - Metrics recorders are free functions so subsystems never hold
//!   exporter handles

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
