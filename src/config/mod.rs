//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AegisConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; dependency definitions, policies,
//!   and probe schedules do not change while the process runs
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::AegisConfig;
pub use schema::BreakerConfig;
pub use schema::BufferConfig;
pub use schema::DependencyConfig;
pub use schema::FallbackStrategy;
pub use schema::PriorityTier;
pub use schema::ProbeConfig;
pub use schema::ProbeKind;
pub use schema::RetryPolicyConfig;
