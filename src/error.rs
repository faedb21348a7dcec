//! Error taxonomy for the engine.
//!
//! # Layers
//! - [`DependencyError`]: what one attempt against a dependency produced
//! - [`ExecuteError`]: what the retrying executor surfaced for a call
//! - [`FallbackError`]: why fallback resolution could not substitute
//! - [`CallError`]: the caller-facing result when everything failed
//!
//! # Design Decisions
//! - Classification lives on the dependency error so retry policies
//!   match on [`ErrorClass`], never on message text
//! - Validation-class errors are never retryable: the remote already
//!   rejected the request as malformed

use std::time::Duration;

use thiserror::Error;

/// Retryability class of a dependency failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Timeout,
    ConnectionRefused,
    ConnectionReset,
    /// Remote answered with a 5xx status.
    ServerError,
    /// The request itself was rejected; retrying cannot succeed.
    Validation,
    /// Uncategorized; treated as non-retryable.
    Other,
}

/// Failure of a single attempt against a managed dependency.
#[derive(Debug, Clone, Error)]
pub enum DependencyError {
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection refused")]
    ConnectionRefused,

    #[error("connection reset")]
    ConnectionReset,

    #[error("remote answered with status {0}")]
    RemoteStatus(u16),

    #[error("request rejected: {0}")]
    Validation(String),

    #[error("{0}")]
    Other(String),
}

impl DependencyError {
    pub fn class(&self) -> ErrorClass {
        match self {
            DependencyError::Timeout(_) => ErrorClass::Timeout,
            DependencyError::ConnectionRefused => ErrorClass::ConnectionRefused,
            DependencyError::ConnectionReset => ErrorClass::ConnectionReset,
            DependencyError::RemoteStatus(status) if (500..=599).contains(status) => {
                ErrorClass::ServerError
            }
            DependencyError::RemoteStatus(_) => ErrorClass::Validation,
            DependencyError::Validation(_) => ErrorClass::Validation,
            DependencyError::Other(_) => ErrorClass::Other,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, DependencyError::Timeout(_))
    }
}

/// Terminal outcome of the retrying executor for one call.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The circuit breaker denied the attempt; no work was performed.
    #[error("circuit breaker open for dependency '{0}'")]
    BreakerOpen(String),

    /// The failure class is excluded from retrying; failed fast.
    #[error("non-retryable failure: {0}")]
    NonRetryable(DependencyError),

    /// Every permitted attempt failed.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: DependencyError,
    },
}

/// Why fallback resolution produced nothing.
#[derive(Debug, Error)]
pub enum FallbackError {
    #[error("no cached result for dependency '{0}'")]
    NoCached(String),

    #[error("cached result for dependency '{0}' exceeds its freshness window")]
    Stale(String),

    #[error("fallback disabled for dependency '{0}'")]
    Disabled(String),

    #[error("alternate chain for dependency '{0}' exceeds one hop")]
    AlternateDepth(String),

    #[error("alternate dependency '{0}' is not registered")]
    AlternateUnavailable(String),

    #[error("alternate dependency '{0}' failed: {1}")]
    AlternateFailed(String, ExecuteError),
}

/// Caller-facing failure of a managed call.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("unknown dependency '{0}'")]
    UnknownDependency(String),

    /// The direct call failed in a way fallback does not cover
    /// (non-retryable rejection).
    #[error("call to dependency failed: {0}")]
    Rejected(ExecuteError),

    /// Both the direct call and fallback resolution failed.
    #[error("call to '{name}' failed ({call}) and fallback failed ({fallback})")]
    Exhausted {
        name: String,
        call: ExecuteError,
        fallback: FallbackError,
    },
}
