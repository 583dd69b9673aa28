//! Exponential backoff with multiplicative jitter.

use std::time::Duration;
use rand::Rng;

use crate::resilience::policy::RetryPolicy;

/// Pre-jitter delay after a failed `attempt` (1-based).
///
/// `min(base_delay * multiplier^(attempt-1), max_delay)`
pub fn capped_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponent = (attempt - 1).min(i32::MAX as u32) as i32;
    let raw = policy.base_delay().as_secs_f64() * policy.backoff_multiplier().powi(exponent);
    let max = policy.max_delay().as_secs_f64();

    // powi overflows to infinity long before the cap matters
    if !raw.is_finite() || raw >= max {
        policy.max_delay()
    } else {
        Duration::try_from_secs_f64(raw).unwrap_or(policy.max_delay())
    }
}

/// Delay to sleep after a failed `attempt`, with jitter resampled on every call.
pub fn calculate_backoff(policy: &RetryPolicy, attempt: u32) -> Duration {
    let capped = capped_delay(policy, attempt);
    let (min, max) = policy.jitter_range();

    let factor = if max > min {
        rand::thread_rng().gen_range(min..=max)
    } else {
        min
    };

    // Saturates instead of overflowing when max_delay is effectively unbounded.
    Duration::try_from_secs_f64(capped.as_secs_f64() * factor).unwrap_or(Duration::MAX)
}
