//! Retry policies.
//!
//! A policy is built once from config, then shared by reference across
//! every call of the same operation class.

use crate::config::schema::{RetryOn, RetryPolicyConfig};
use crate::error::ErrorClass;
use std::time::Duration;

/// Immutable retry policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub name: String,
    /// Total attempts including the first.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
    retry_on: Vec<RetryOn>,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryPolicyConfig) -> Self {
        Self {
            name: config.name.clone(),
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            backoff_multiplier: config.backoff_multiplier,
            jitter: config.jitter,
            retry_on: config.retry_on.clone(),
        }
    }

    /// Whether an error of this class consumes retry budget.
    ///
    /// Validation-class and uncategorized errors always fail fast:
    /// retrying a request the remote has already rejected as invalid
    /// cannot succeed.
    pub fn retryable(&self, class: ErrorClass) -> bool {
        let selector = match class {
            ErrorClass::Timeout => RetryOn::Timeout,
            ErrorClass::ConnectionRefused => RetryOn::ConnectionRefused,
            ErrorClass::ConnectionReset => RetryOn::ConnectionReset,
            ErrorClass::ServerError => RetryOn::ServerError,
            ErrorClass::Validation | ErrorClass::Other => return false,
        };
        self.retry_on.contains(&selector)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryPolicyConfig::default())
    }
}
