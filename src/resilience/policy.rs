//! Retry policies and named presets.
//!
//! A `RetryPolicy` can only be obtained from a preset or through validation,
//! so the orchestrator never sees a structurally invalid policy.

use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::resilience::error::{ResilienceError, ResilienceResult};

/// Immutable backoff configuration for one `execute` call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RetryPolicySpec", into = "RetryPolicySpec")]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
    jitter_min: f64,
    jitter_max: f64,
}

impl RetryPolicy {
    /// Balanced general use: 3 attempts, 1s base, 30s cap, x2.0, 0.8-1.2 jitter.
    pub const DEFAULT: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(30),
        backoff_multiplier: 2.0,
        jitter_min: 0.8,
        jitter_max: 1.2,
    };

    /// Fast-retrying low-latency services: 5 attempts, 0.5s base, 60s cap, x2.5, 0.7-1.3 jitter.
    pub const AGGRESSIVE: RetryPolicy = RetryPolicy {
        max_attempts: 5,
        base_delay: Duration::from_millis(500),
        max_delay: Duration::from_secs(60),
        backoff_multiplier: 2.5,
        jitter_min: 0.7,
        jitter_max: 1.3,
    };

    /// Expensive or rate-sensitive services: 2 attempts, 2s base, 15s cap, x1.5, 0.9-1.1 jitter.
    pub const CONSERVATIVE: RetryPolicy = RetryPolicy {
        max_attempts: 2,
        base_delay: Duration::from_secs(2),
        max_delay: Duration::from_secs(15),
        backoff_multiplier: 1.5,
        jitter_min: 0.9,
        jitter_max: 1.1,
    };

    /// Build a policy, rejecting structurally invalid values.
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
        jitter_range: (f64, f64),
    ) -> ResilienceResult<Self> {
        let policy = Self {
            max_attempts,
            base_delay,
            max_delay,
            backoff_multiplier,
            jitter_min: jitter_range.0,
            jitter_max: jitter_range.1,
        };
        policy.validate()?;
        Ok(policy)
    }

    fn validate(&self) -> ResilienceResult<()> {
        if self.max_attempts < 1 {
            return Err(ResilienceError::InvalidPolicy("max_attempts must be at least 1".into()));
        }
        if self.base_delay.is_zero() {
            return Err(ResilienceError::InvalidPolicy("base_delay must be positive".into()));
        }
        if self.max_delay < self.base_delay {
            return Err(ResilienceError::InvalidPolicy(format!(
                "max_delay {:?} is below base_delay {:?}",
                self.max_delay, self.base_delay
            )));
        }
        if !(self.backoff_multiplier.is_finite() && self.backoff_multiplier > 1.0) {
            return Err(ResilienceError::InvalidPolicy(format!(
                "backoff_multiplier must be greater than 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if !(self.jitter_min.is_finite() && self.jitter_max.is_finite())
            || self.jitter_min <= 0.0
            || self.jitter_min > self.jitter_max
        {
            return Err(ResilienceError::InvalidPolicy(format!(
                "jitter range {}..{} must be positive and ordered",
                self.jitter_min, self.jitter_max
            )));
        }
        Ok(())
    }

    pub fn with_max_attempts(self, max_attempts: u32) -> ResilienceResult<Self> {
        let policy = Self { max_attempts, ..self };
        policy.validate()?;
        Ok(policy)
    }

    pub fn with_jitter_range(self, min: f64, max: f64) -> ResilienceResult<Self> {
        let policy = Self { jitter_min: min, jitter_max: max, ..self };
        policy.validate()?;
        Ok(policy)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    /// Multiplicative jitter bounds `(min, max)`.
    pub fn jitter_range(&self) -> (f64, f64) {
        (self.jitter_min, self.jitter_max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Named presets recognised in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyPreset {
    #[default]
    Default,
    Aggressive,
    Conservative,
}

impl PolicyPreset {
    pub fn policy(self) -> RetryPolicy {
        match self {
            PolicyPreset::Default => RetryPolicy::DEFAULT,
            PolicyPreset::Aggressive => RetryPolicy::AGGRESSIVE,
            PolicyPreset::Conservative => RetryPolicy::CONSERVATIVE,
        }
    }
}

impl From<PolicyPreset> for RetryPolicy {
    fn from(preset: PolicyPreset) -> Self {
        preset.policy()
    }
}

/// Serialized form of a policy, delays in fractional seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicySpec {
    pub max_attempts: u32,
    pub base_delay_secs: f64,
    pub max_delay_secs: f64,
    pub backoff_multiplier: f64,
    pub jitter_min: f64,
    pub jitter_max: f64,
}

impl TryFrom<RetryPolicySpec> for RetryPolicy {
    type Error = ResilienceError;

    fn try_from(raw: RetryPolicySpec) -> Result<Self, Self::Error> {
        let base_delay = Duration::try_from_secs_f64(raw.base_delay_secs)
            .map_err(|e| ResilienceError::InvalidPolicy(format!("base_delay_secs: {}", e)))?;
        let max_delay = Duration::try_from_secs_f64(raw.max_delay_secs)
            .map_err(|e| ResilienceError::InvalidPolicy(format!("max_delay_secs: {}", e)))?;
        RetryPolicy::new(
            raw.max_attempts,
            base_delay,
            max_delay,
            raw.backoff_multiplier,
            (raw.jitter_min, raw.jitter_max),
        )
    }
}

impl From<RetryPolicy> for RetryPolicySpec {
    fn from(policy: RetryPolicy) -> Self {
        Self {
            max_attempts: policy.max_attempts,
            base_delay_secs: policy.base_delay.as_secs_f64(),
            max_delay_secs: policy.max_delay.as_secs_f64(),
            backoff_multiplier: policy.backoff_multiplier,
            jitter_min: policy.jitter_min,
            jitter_max: policy.jitter_max,
        }
    }
}
