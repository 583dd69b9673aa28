//! Terminal result of one retried operation.

use crate::resilience::error::ResilienceError;

/// Produced exactly once per `execute` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T, E> {
    /// The operation succeeded on attempt number `attempts`.
    Success { value: T, attempts: u32 },
    /// The last attempt failed and no further attempt was allowed.
    Failure { error: E, attempts: u32 },
    /// Cancellation was observed at a checkpoint.
    Cancelled,
}

impl<T, E> Outcome<T, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    /// Number of times the operation was invoked (zero when cancelled).
    pub fn attempts(&self) -> u32 {
        match self {
            Outcome::Success { attempts, .. } | Outcome::Failure { attempts, .. } => *attempts,
            Outcome::Cancelled => 0,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Success { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&E> {
        match self {
            Outcome::Failure { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U, E> {
        match self {
            Outcome::Success { value, attempts } => Outcome::Success { value: f(value), attempts },
            Outcome::Failure { error, attempts } => Outcome::Failure { error, attempts },
            Outcome::Cancelled => Outcome::Cancelled,
        }
    }
}

impl<T, E> Outcome<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Collapse into a `Result`, wrapping the last error in `RetriesExhausted`.
    pub fn into_result(self) -> Result<T, ResilienceError> {
        match self {
            Outcome::Success { value, .. } => Ok(value),
            Outcome::Failure { error, attempts } => Err(ResilienceError::RetriesExhausted {
                attempts,
                source: Box::new(error),
            }),
            Outcome::Cancelled => Err(ResilienceError::Cancelled),
        }
    }
}
