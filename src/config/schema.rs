//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! resilience layer. All types derive Serde traits for deserialization from
//! config files, and every section has defaults so an empty file is valid.

use std::collections::BTreeMap;
use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::resilience::policy::{PolicyPreset, RetryPolicy};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Retry orchestration settings.
    pub orchestrator: OrchestratorConfig,

    /// Named rate-limit rules.
    pub rate_limits: RateLimitConfig,

    /// Connectivity monitoring settings.
    pub network: NetworkMonitorConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Retry orchestration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Preset used when a caller does not pick a policy.
    pub default_preset: PolicyPreset,

    /// Interval between connectivity checks while waiting to go online.
    pub online_poll_interval_ms: u64,

    /// Upper bound on the connectivity wait. `None` waits indefinitely.
    pub online_wait_timeout_secs: Option<u64>,

    /// Chunk size for batches when the caller has no preference.
    pub batch_max_concurrency: usize,

    /// Buffered lifecycle events per subscriber before lagging.
    pub event_capacity: usize,

    /// Additional named policies, looked up after the presets.
    pub policies: BTreeMap<String, RetryPolicy>,
}

impl OrchestratorConfig {
    /// Resolve a preset name (`default`, `aggressive`, `conservative`) or a
    /// custom policy name.
    pub fn policy(&self, name: &str) -> Option<RetryPolicy> {
        match name {
            "default" => Some(RetryPolicy::DEFAULT),
            "aggressive" => Some(RetryPolicy::AGGRESSIVE),
            "conservative" => Some(RetryPolicy::CONSERVATIVE),
            other => self.policies.get(other).copied(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_preset: PolicyPreset::Default,
            online_poll_interval_ms: 1000,
            online_wait_timeout_secs: None,
            batch_max_concurrency: 3,
            event_capacity: 256,
            policies: BTreeMap::new(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub rules: Vec<RateLimitRule>,
}

impl RateLimitConfig {
    pub fn rule(&self, name: &str) -> Option<&RateLimitRule> {
        self.rules.iter().find(|r| r.name == name)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            rules: vec![
                RateLimitRule::new("sign_in", 5, 900),
                RateLimitRule::new("content_creation", 10, 3600),
                RateLimitRule::new("upload", 20, 3600),
            ],
        }
    }
}

/// A named sliding-window limit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RateLimitRule {
    /// Rule name, also used to namespace limiter keys.
    pub name: String,

    /// Requests admitted per window.
    pub max_requests: usize,

    /// Window length in seconds.
    pub window_secs: u64,
}

impl RateLimitRule {
    pub fn new(name: impl Into<String>, max_requests: usize, window_secs: u64) -> Self {
        Self {
            name: name.into(),
            max_requests,
            window_secs,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Limiter key for `subject` under this rule, e.g. `sign_in:alice`.
    pub fn scoped_key(&self, subject: &str) -> String {
        format!("{}:{}", self.name, subject)
    }
}

/// Connectivity monitoring configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkMonitorConfig {
    /// Enable periodic latency sampling.
    pub enabled: bool,

    /// Latency sampling interval in seconds.
    pub sample_interval_secs: u64,

    /// Timeout for a single latency probe in seconds.
    pub probe_timeout_secs: u64,

    /// URL probed with a HEAD request.
    pub probe_url: String,

    /// Average latency above which a connected link is demoted to slow.
    pub demote_latency_ms: u64,

    /// Average latency at or below which a slow link is promoted back.
    pub promote_latency_ms: u64,

    /// Rolling latency window size.
    pub latency_capacity: usize,

    /// Maximum retained connectivity events.
    pub history_capacity: usize,

    /// Address used for TCP reachability checks when no native path monitor exists.
    pub reachability_addr: Option<String>,

    /// Interval between reachability checks in seconds.
    pub reachability_interval_secs: u64,
}

impl NetworkMonitorConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn demote_latency(&self) -> Duration {
        Duration::from_millis(self.demote_latency_ms)
    }

    pub fn promote_latency(&self) -> Duration {
        Duration::from_millis(self.promote_latency_ms)
    }

    pub fn reachability_interval(&self) -> Duration {
        Duration::from_secs(self.reachability_interval_secs)
    }
}

impl Default for NetworkMonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_interval_secs: 30,
            probe_timeout_secs: 10,
            probe_url: "https://www.google.com/generate_204".to_string(),
            demote_latency_ms: 2000,
            promote_latency_ms: 1000,
            latency_capacity: 10,
            history_capacity: 100,
            reachability_addr: Some("1.1.1.1:443".to_string()),
            reachability_interval_secs: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
