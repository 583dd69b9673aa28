//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic, and retry policies
//!   validate themselves while deserializing)
//! - Validate value ranges (intervals > 0, capacities > 0, windows > 0)
//! - Check the hysteresis band is ordered
//! - Detect duplicate rate-limit rule names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ResilienceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::ResilienceConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check every semantic constraint, collecting all failures.
pub fn validate_config(config: &ResilienceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let orch = &config.orchestrator;
    if orch.online_poll_interval_ms == 0 {
        errors.push(ValidationError::new("orchestrator.online_poll_interval_ms", "must be greater than 0"));
    }
    if orch.online_wait_timeout_secs == Some(0) {
        errors.push(ValidationError::new("orchestrator.online_wait_timeout_secs", "must be greater than 0 when set"));
    }
    if orch.batch_max_concurrency == 0 {
        errors.push(ValidationError::new("orchestrator.batch_max_concurrency", "must be at least 1"));
    }
    if orch.event_capacity == 0 {
        errors.push(ValidationError::new("orchestrator.event_capacity", "must be at least 1"));
    }
    for name in orch.policies.keys() {
        if matches!(name.as_str(), "default" | "aggressive" | "conservative") {
            errors.push(ValidationError::new(
                format!("orchestrator.policies.{}", name),
                "shadows a built-in preset",
            ));
        }
    }

    let mut seen = HashSet::new();
    for (i, rule) in config.rate_limits.rules.iter().enumerate() {
        let field = format!("rate_limits.rules[{}]", i);
        if rule.name.is_empty() {
            errors.push(ValidationError::new(format!("{}.name", field), "must not be empty"));
        } else if !seen.insert(rule.name.as_str()) {
            errors.push(ValidationError::new(format!("{}.name", field), format!("duplicate rule '{}'", rule.name)));
        }
        if rule.max_requests == 0 {
            errors.push(ValidationError::new(format!("{}.max_requests", field), "must be at least 1"));
        }
        if rule.window_secs == 0 {
            errors.push(ValidationError::new(format!("{}.window_secs", field), "must be greater than 0"));
        }
    }

    let net = &config.network;
    if net.sample_interval_secs == 0 {
        errors.push(ValidationError::new("network.sample_interval_secs", "must be greater than 0"));
    }
    if net.probe_timeout_secs == 0 {
        errors.push(ValidationError::new("network.probe_timeout_secs", "must be greater than 0"));
    }
    if let Err(e) = url::Url::parse(&net.probe_url) {
        errors.push(ValidationError::new("network.probe_url", format!("invalid URL: {}", e)));
    }
    if net.promote_latency_ms >= net.demote_latency_ms {
        errors.push(ValidationError::new(
            "network.promote_latency_ms",
            format!(
                "must be below demote_latency_ms ({} >= {})",
                net.promote_latency_ms, net.demote_latency_ms
            ),
        ));
    }
    if net.latency_capacity == 0 {
        errors.push(ValidationError::new("network.latency_capacity", "must be at least 1"));
    }
    if net.history_capacity == 0 {
        errors.push(ValidationError::new("network.history_capacity", "must be at least 1"));
    }
    if let Some(addr) = &net.reachability_addr {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new("network.reachability_addr", format!("'{}' is not a socket address", addr)));
        }
        if net.reachability_interval_secs == 0 {
            errors.push(ValidationError::new("network.reachability_interval_secs", "must be greater than 0"));
        }
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", obs.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
