//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Build registries → Spawn background tasks
//!
//! Shutdown (shutdown.rs):
//!     SIGINT received → broadcast → tasks drain their loops → Exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core state, then background tasks
//! - A single broadcast channel fans the shutdown signal out to every task

pub mod shutdown;

pub use shutdown::Shutdown;
