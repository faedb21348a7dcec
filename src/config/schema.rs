//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the engine.
//! All types derive Serde traits for deserialization from config files.
//! Configuration is loaded once at startup and immutable thereafter.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the resilience engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AegisConfig {
    /// Managed dependency definitions.
    pub dependencies: Vec<DependencyConfig>,

    /// Named retry policies shared across dependencies.
    pub retry_policies: Vec<RetryPolicyConfig>,

    /// Circuit breaker settings.
    pub breaker: BreakerConfig,

    /// Durable fallback buffer settings.
    pub buffer: BufferConfig,

    /// Health probe definitions.
    pub probes: Vec<ProbeConfig>,

    /// Recovery scheduler settings.
    pub recovery: RecoveryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Priority tier of a managed dependency.
///
/// Higher tiers get lower breaker failure thresholds (faster detection)
/// and their buffered writes outlive lower tiers under eviction pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityTier {
    Low,
    Medium,
    High,
    Critical,
}

impl PriorityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityTier::Critical => "critical",
            PriorityTier::High => "high",
            PriorityTier::Medium => "medium",
            PriorityTier::Low => "low",
        }
    }
}

/// A managed external dependency.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DependencyConfig {
    /// Unique dependency identifier.
    pub name: String,

    /// Priority tier (drives breaker thresholds).
    #[serde(default = "default_tier")]
    pub tier: PriorityTier,

    /// Per-attempt call timeout in milliseconds.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Name of the retry policy to apply.
    #[serde(default = "default_policy_name")]
    pub retry_policy: String,

    /// Fallback strategy when the direct path is unavailable.
    #[serde(default)]
    pub fallback: FallbackStrategy,

    /// Service name whose readiness probe reflects this dependency.
    #[serde(default)]
    pub health_service: Option<String>,
}

fn default_tier() -> PriorityTier {
    PriorityTier::Medium
}

fn default_call_timeout_ms() -> u64 {
    5_000
}

fn default_policy_name() -> String {
    "default".to_string()
}

impl DependencyConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

/// Substitute-result strategy used when the breaker is open or the direct
/// call fails.
///
/// Modeled as a tagged enum so an unknown strategy is a config-load error,
/// never a call-time surprise.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FallbackStrategy {
    /// Serve the most recent successful result if fresh enough.
    Cached {
        /// Maximum age of a cached result, in seconds.
        #[serde(default = "default_freshness_secs")]
        freshness_secs: u64,
    },

    /// Serve an explicitly labeled "service unavailable" sentinel.
    #[default]
    Degraded,

    /// Redirect to a secondary dependency serving the same purpose.
    Alternate {
        /// Name of the alternate dependency.
        dependency: String,
    },

    /// Fail immediately with a "dependency disabled" error.
    Disabled,
}

fn default_freshness_secs() -> u64 {
    60
}

/// A named retry policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryPolicyConfig {
    /// Policy identifier referenced by dependencies.
    pub name: String,

    /// Maximum number of attempts (including the first).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff delay in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Backoff delay cap in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Backoff multiplier applied per attempt.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Widen each delay by up to 30% to avoid herd resynchronization.
    #[serde(default = "default_jitter")]
    pub jitter: bool,

    /// Error classes that are worth retrying.
    #[serde(default = "default_retry_on")]
    pub retry_on: Vec<RetryOn>,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    2_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> bool {
    true
}

fn default_retry_on() -> Vec<RetryOn> {
    vec![
        RetryOn::Timeout,
        RetryOn::ConnectionRefused,
        RetryOn::ConnectionReset,
        RetryOn::ServerError,
    ]
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            name: default_policy_name(),
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: default_jitter(),
            retry_on: default_retry_on(),
        }
    }
}

/// Retryable error class selector for config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryOn {
    Timeout,
    ConnectionRefused,
    ConnectionReset,
    ServerError,
}

/// Circuit breaker settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive successes in half-open required to close.
    pub success_threshold: u32,

    /// How long an open circuit waits before probing, in seconds.
    pub reset_timeout_secs: u64,

    /// Failure threshold override; when unset, derived from the tier.
    pub failure_threshold: Option<u32>,

    /// How often cumulative breaker stats are halved, in seconds.
    ///
    /// Keeps the reported failure rate weighted toward recent traffic
    /// instead of accumulating since startup.
    pub stat_decay_interval_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            success_threshold: 2,
            reset_timeout_secs: 30,
            failure_threshold: None,
            stat_decay_interval_secs: 60,
        }
    }
}

impl BreakerConfig {
    /// Failure threshold for a tier: higher-priority dependencies trip
    /// faster so detection latency stays bounded where it matters.
    pub fn failure_threshold_for(&self, tier: PriorityTier) -> u32 {
        if let Some(t) = self.failure_threshold {
            return t;
        }
        match tier {
            PriorityTier::Critical => 3,
            PriorityTier::High => 4,
            PriorityTier::Medium | PriorityTier::Low => 5,
        }
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.reset_timeout_secs)
    }

    pub fn stat_decay_interval(&self) -> Duration {
        Duration::from_secs(self.stat_decay_interval_secs)
    }
}

/// Durable fallback buffer settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Maximum number of buffered actions held at once.
    pub capacity: usize,

    /// Drain scheduler interval in seconds.
    pub drain_interval_secs: u64,

    /// Replay attempts per action before discard.
    pub max_retries: u32,

    /// Maximum action age before discard, in seconds.
    pub retention_secs: u64,

    /// Service whose readiness probe gates draining.
    pub store_service: String,

    /// URL the built-in HTTP sink posts records to. When unset, the
    /// daemon expects a sink to be supplied programmatically.
    pub store_url: Option<String>,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            drain_interval_secs: 15,
            max_retries: 5,
            retention_secs: 24 * 60 * 60,
            store_service: "primary-store".to_string(),
            store_url: None,
        }
    }
}

impl BufferConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_secs(self.drain_interval_secs)
    }
}

/// Kind of health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    Readiness,
    Liveness,
}

/// A scheduled health probe for one managed service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbeConfig {
    /// Unique probe identifier.
    pub name: String,

    /// Service this probe reports on.
    pub service: String,

    /// Readiness or liveness.
    pub kind: ProbeKind,

    /// URL for the built-in HTTP GET check; custom checks are registered
    /// programmatically instead.
    #[serde(default)]
    pub http_url: Option<String>,

    /// Check interval in seconds.
    #[serde(default = "default_probe_interval_secs")]
    pub interval_secs: u64,

    /// Per-check timeout in seconds.
    #[serde(default = "default_probe_timeout_secs")]
    pub timeout_secs: u64,

    /// Consecutive successes required to confirm healthy.
    #[serde(default = "default_probe_success_threshold")]
    pub success_threshold: u32,

    /// Consecutive failures required to confirm unhealthy.
    #[serde(default = "default_probe_failure_threshold")]
    pub failure_threshold: u32,
}

fn default_probe_interval_secs() -> u64 {
    10
}

fn default_probe_timeout_secs() -> u64 {
    5
}

fn default_probe_success_threshold() -> u32 {
    2
}

fn default_probe_failure_threshold() -> u32 {
    3
}

impl ProbeConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Recovery strategy scheduler settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Shared tick interval for registered strategies, in seconds.
    pub tick_interval_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 30,
        }
    }
}

impl RecoveryConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
