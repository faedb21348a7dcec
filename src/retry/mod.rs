//! Retrying execution subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a dependency:
//!     → executor.rs (attempt loop, per-attempt timeout)
//!     → breaker gate before every attempt (open circuit stops the loop)
//!     → On failure: policy.rs decides retryability by error class
//!     → backoff.rs (exponential delay + jitter between attempts)
//! ```
//!
//! # Design Decisions
//! - The breaker gate never consumes retry budget
//! - Retries only for transient error classes; validation errors fail fast
//! - Jittered backoff prevents thundering herd
//! - One breaker record per attempt, success or failure

pub mod backoff;
pub mod executor;
pub mod policy;

pub use executor::execute;
pub use policy::RetryPolicy;
