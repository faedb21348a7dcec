//! Configuration validation.
//!
//! Serde handles the syntactic layer; this module checks semantics:
//! referential integrity (dependencies reference existing retry policies
//! and alternates), value ranges, and name uniqueness. Returns all
//! violations, not just the first, so a bad config can be fixed in one pass.

use crate::config::schema::{AegisConfig, FallbackStrategy};
use std::collections::HashSet;
use std::fmt;

/// A single semantic violation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Config location, e.g. `dependencies.tax-api.retry_policy`.
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn err(field: impl Into<String>, message: impl Into<String>) -> ValidationError {
    ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AegisConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut policy_names = HashSet::new();
    for policy in &config.retry_policies {
        if !policy_names.insert(policy.name.as_str()) {
            errors.push(err(
                format!("retry_policies.{}", policy.name),
                "duplicate policy name",
            ));
        }
        if policy.max_attempts == 0 {
            errors.push(err(
                format!("retry_policies.{}.max_attempts", policy.name),
                "must be at least 1",
            ));
        }
        if policy.backoff_multiplier < 1.0 {
            errors.push(err(
                format!("retry_policies.{}.backoff_multiplier", policy.name),
                "must be >= 1.0",
            ));
        }
        if policy.max_delay_ms < policy.initial_delay_ms {
            errors.push(err(
                format!("retry_policies.{}.max_delay_ms", policy.name),
                "must be >= initial_delay_ms",
            ));
        }
    }

    let mut dep_names = HashSet::new();
    for dep in &config.dependencies {
        if !dep_names.insert(dep.name.as_str()) {
            errors.push(err(
                format!("dependencies.{}", dep.name),
                "duplicate dependency name",
            ));
        }
        if dep.call_timeout_ms == 0 {
            errors.push(err(
                format!("dependencies.{}.call_timeout_ms", dep.name),
                "must be > 0",
            ));
        }
        // "default" is always available even without an explicit policy block
        if dep.retry_policy != "default" && !policy_names.contains(dep.retry_policy.as_str()) {
            errors.push(err(
                format!("dependencies.{}.retry_policy", dep.name),
                format!("references unknown policy '{}'", dep.retry_policy),
            ));
        }
    }

    let all_deps: HashSet<&str> = config.dependencies.iter().map(|d| d.name.as_str()).collect();
    for dep in &config.dependencies {
        if let FallbackStrategy::Alternate { dependency } = &dep.fallback {
            if dependency == &dep.name {
                errors.push(err(
                    format!("dependencies.{}.fallback", dep.name),
                    "alternate must not reference itself",
                ));
            } else if !all_deps.contains(dependency.as_str()) {
                errors.push(err(
                    format!("dependencies.{}.fallback", dep.name),
                    format!("references unknown alternate '{}'", dependency),
                ));
            }
        }
        if let FallbackStrategy::Cached { freshness_secs } = dep.fallback {
            if freshness_secs == 0 {
                errors.push(err(
                    format!("dependencies.{}.fallback.freshness_secs", dep.name),
                    "must be > 0",
                ));
            }
        }
    }

    if config.buffer.capacity == 0 {
        errors.push(err("buffer.capacity", "must be > 0"));
    }
    if config.buffer.drain_interval_secs == 0 {
        errors.push(err("buffer.drain_interval_secs", "must be > 0"));
    }
    if config.breaker.success_threshold == 0 {
        errors.push(err("breaker.success_threshold", "must be at least 1"));
    }
    if config.breaker.failure_threshold == Some(0) {
        errors.push(err("breaker.failure_threshold", "must be at least 1"));
    }
    if config.breaker.stat_decay_interval_secs == 0 {
        errors.push(err("breaker.stat_decay_interval_secs", "must be > 0"));
    }

    let mut probe_names = HashSet::new();
    let mut probe_keys = HashSet::new();
    for probe in &config.probes {
        if !probe_names.insert(probe.name.as_str()) {
            errors.push(err(format!("probes.{}", probe.name), "duplicate probe name"));
        }
        if !probe_keys.insert((probe.service.as_str(), probe.kind)) {
            errors.push(err(
                format!("probes.{}", probe.name),
                format!("service '{}' already has a probe of this kind", probe.service),
            ));
        }
        if probe.interval_secs == 0 {
            errors.push(err(
                format!("probes.{}.interval_secs", probe.name),
                "must be > 0",
            ));
        }
        if probe.success_threshold == 0 || probe.failure_threshold == 0 {
            errors.push(err(
                format!("probes.{}", probe.name),
                "thresholds must be at least 1",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{DependencyConfig, ProbeConfig, ProbeKind};

    fn dep(name: &str) -> DependencyConfig {
        DependencyConfig {
            name: name.to_string(),
            tier: crate::config::schema::PriorityTier::Medium,
            call_timeout_ms: 1000,
            retry_policy: "default".to_string(),
            fallback: FallbackStrategy::Degraded,
            health_service: None,
        }
    }

    #[test]
    fn test_valid_default_config() {
        assert!(validate_config(&AegisConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = AegisConfig::default();
        let mut bad = dep("a");
        bad.retry_policy = "missing".to_string();
        bad.call_timeout_ms = 0;
        config.dependencies.push(bad);
        config.buffer.capacity = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3, "expected all violations reported: {:?}", errors);
    }

    #[test]
    fn test_alternate_referential_integrity() {
        let mut config = AegisConfig::default();
        let mut primary = dep("primary");
        primary.fallback = FallbackStrategy::Alternate {
            dependency: "ghost".to_string(),
        };
        config.dependencies.push(primary);

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("ghost")));

        let mut config = AegisConfig::default();
        let mut selfref = dep("loop");
        selfref.fallback = FallbackStrategy::Alternate {
            dependency: "loop".to_string(),
        };
        config.dependencies.push(selfref);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_duplicate_probe_for_service_kind() {
        let mut config = AegisConfig::default();
        for name in ["p1", "p2"] {
            config.probes.push(ProbeConfig {
                name: name.to_string(),
                service: "store".to_string(),
                kind: ProbeKind::Readiness,
                http_url: None,
                interval_secs: 5,
                timeout_secs: 2,
                success_threshold: 1,
                failure_threshold: 3,
            });
        }
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("already has a probe")));
    }
}
