//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap an external call with a deadline
//! - Map elapsed deadlines to `ResilienceError::Timeout`
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - The orchestrator never imposes a deadline on its own; callers wrap the
//!   operation (or the whole `execute` future) with this helper

use std::future::Future;
use std::time::Duration;
use tokio::time;

use crate::resilience::error::ResilienceError;

/// Run `fut` with a deadline, converting expiry into `ResilienceError::Timeout`.
pub async fn with_deadline<F, T, E>(deadline: Duration, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<ResilienceError>,
{
    match time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(ResilienceError::Timeout.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires() {
        let result: Result<(), ResilienceError> = with_deadline(Duration::from_secs(1), async {
            time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(ResilienceError::Timeout)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_inner_error_passes_through() {
        let result: Result<(), ResilienceError> =
            with_deadline(Duration::from_secs(1), async { Err(ResilienceError::ServerError(500)) }).await;
        assert!(matches!(result, Err(ResilienceError::ServerError(500))));
    }
}
