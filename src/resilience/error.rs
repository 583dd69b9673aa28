//! Error taxonomy and retry classification.

use std::time::Duration;
use thiserror::Error;

/// Errors produced or classified by the resilience subsystem.
#[derive(Debug, Error)]
pub enum ResilienceError {
    /// No usable network path.
    #[error("network unavailable")]
    NetworkUnavailable,

    /// The operation did not finish before its deadline.
    #[error("operation timed out")]
    Timeout,

    /// Remote server answered with an error status.
    #[error("server error: status {0}")]
    ServerError(u16),

    /// Input was rejected. Never retried.
    #[error("validation failed: {0}")]
    ValidationFailure(String),

    /// The operation was cancelled before completing.
    #[error("operation cancelled")]
    Cancelled,

    /// Every allowed attempt failed.
    #[error("retries exhausted after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A rate limit denied the action.
    #[error("rate limit exceeded, retry after {retry_after:?}")]
    RateLimitExceeded { retry_after: Duration },

    /// A retry policy violated its structural constraints.
    #[error("invalid retry policy: {0}")]
    InvalidPolicy(String),

    /// A latency probe failed for a reason other than timeout.
    #[error("probe failed: {0}")]
    Probe(String),
}

/// Result type for resilience operations.
pub type ResilienceResult<T> = Result<T, ResilienceError>;

/// Classification used by network-aware retries.
///
/// Implement this for an operation's error type to use it with
/// [`RetryOrchestrator::retry_when_online`](crate::resilience::RetryOrchestrator::retry_when_online).
pub trait Retryable {
    /// Whether a failure with this error is worth another attempt.
    fn is_retryable(&self) -> bool;
}

impl Retryable for ResilienceError {
    fn is_retryable(&self) -> bool {
        match self {
            ResilienceError::NetworkUnavailable | ResilienceError::Timeout => true,
            ResilienceError::ServerError(code) => (500..600).contains(code),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ResilienceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ResilienceError::Timeout
        } else if err.is_connect() {
            ResilienceError::NetworkUnavailable
        } else if let Some(status) = err.status() {
            ResilienceError::ServerError(status.as_u16())
        } else {
            ResilienceError::Probe(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_classification() {
        assert!(ResilienceError::NetworkUnavailable.is_retryable());
        assert!(ResilienceError::Timeout.is_retryable());
        assert!(ResilienceError::ServerError(503).is_retryable());
        assert!(!ResilienceError::ServerError(404).is_retryable());
        assert!(!ResilienceError::ValidationFailure("bad".into()).is_retryable());
        assert!(!ResilienceError::Cancelled.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = ResilienceError::ServerError(502);
        assert_eq!(err.to_string(), "server error: status 502");

        let err = ResilienceError::RetriesExhausted {
            attempts: 3,
            source: Box::new(ResilienceError::Timeout),
        };
        assert_eq!(err.to_string(), "retries exhausted after 3 attempts: operation timed out");
    }
}
