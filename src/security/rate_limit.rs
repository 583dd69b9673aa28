//! Per-key sliding-window rate limiting.
//!
//! Every public method takes the same lock, purges timestamps older than
//! `now - window` for the key it touches, then reads or writes. Queries
//! therefore mutate state; nothing awaits while the lock is held. An entry
//! exactly `window` old has left the window.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::RateLimitRule;
use crate::observability::metrics;
use crate::resilience::error::ResilienceError;

/// Admission timestamps for one key, oldest first.
#[derive(Debug, Default)]
struct SlidingWindow {
    admitted: VecDeque<Instant>,
}

impl SlidingWindow {
    fn purge(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.admitted.front() {
            if now.saturating_duration_since(*oldest) >= window {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
    }

    fn try_admit(&mut self, now: Instant, max_requests: usize, window: Duration) -> bool {
        self.purge(now, window);
        if self.admitted.len() >= max_requests {
            return false;
        }
        self.admitted.push_back(now);
        true
    }
}

/// Sliding-window limiter keyed by caller-chosen strings (e.g. `sign_in:alice`).
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, SlidingWindow>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn windows(&self) -> MutexGuard<'_, HashMap<String, SlidingWindow>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit one request for `key` if fewer than `max_requests` were admitted
    /// within the trailing `window`.
    pub fn check_limit(&self, key: &str, max_requests: usize, window: Duration) -> bool {
        let now = Instant::now();
        let allowed = {
            let mut windows = self.windows();
            windows
                .entry(key.to_string())
                .or_default()
                .try_admit(now, max_requests, window)
        };

        if !allowed {
            tracing::warn!(key = %key, max_requests, window = ?window, "Rate limit exceeded");
        }
        metrics::record_rate_limit_decision(allowed);
        allowed
    }

    /// How many more requests `key` may make right now.
    pub fn remaining_attempts(&self, key: &str, max_requests: usize, window: Duration) -> usize {
        let now = Instant::now();
        let mut windows = self.windows();
        match windows.get_mut(key) {
            Some(state) => {
                state.purge(now, window);
                max_requests.saturating_sub(state.admitted.len())
            }
            None => max_requests,
        }
    }

    /// Time until the oldest admission leaves the window, or `None` if `key`
    /// has no admissions in it.
    pub fn time_until_reset(&self, key: &str, window: Duration) -> Option<Duration> {
        let now = Instant::now();
        let mut windows = self.windows();
        let state = windows.get_mut(key)?;
        state.purge(now, window);
        state
            .admitted
            .front()
            .map(|oldest| window.saturating_sub(now.saturating_duration_since(*oldest)))
    }

    /// Like `check_limit`, but turns a denial into `RateLimitExceeded` with
    /// the time until the window frees a slot.
    pub fn check_or_reject(
        &self,
        key: &str,
        max_requests: usize,
        window: Duration,
    ) -> Result<(), ResilienceError> {
        if self.check_limit(key, max_requests, window) {
            return Ok(());
        }
        let retry_after = self.time_until_reset(key, window).unwrap_or(window);
        Err(ResilienceError::RateLimitExceeded { retry_after })
    }

    pub fn check_rule(&self, rule: &RateLimitRule, key: &str) -> bool {
        self.check_limit(&rule.scoped_key(key), rule.max_requests, rule.window())
    }

    pub fn remaining_for_rule(&self, rule: &RateLimitRule, key: &str) -> usize {
        self.remaining_attempts(&rule.scoped_key(key), rule.max_requests, rule.window())
    }

    pub fn reset_rule(&self, rule: &RateLimitRule, key: &str) {
        self.reset(&rule.scoped_key(key));
    }

    /// Drop all state for `key`. Safe to call repeatedly.
    pub fn reset(&self, key: &str) {
        self.windows().remove(key);
    }

    pub fn clear_all(&self) {
        self.windows().clear();
    }

    /// Number of keys currently holding state, including emptied ones.
    pub fn tracked_keys(&self) -> usize {
        self.windows().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time;

    const WINDOW: Duration = Duration::from_secs(900);

    #[tokio::test(start_paused = true)]
    async fn test_sliding_window_admission() {
        let limiter = RateLimiter::new();
        for _ in 0..5 {
            assert!(limiter.check_limit("sign_in:a@b.c", 5, WINDOW));
        }
        assert!(!limiter.check_limit("sign_in:a@b.c", 5, WINDOW));
        assert_eq!(limiter.remaining_attempts("sign_in:a@b.c", 5, WINDOW), 0);

        time::advance(WINDOW).await;
        assert!(limiter.check_limit("sign_in:a@b.c", 5, WINDOW));
        assert_eq!(limiter.remaining_attempts("sign_in:a@b.c", 5, WINDOW), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_window_never_resets() {
        let limiter = RateLimiter::new();
        assert!(limiter.check_limit("forever", 1, Duration::MAX));
        time::advance(Duration::from_secs(3600)).await;
        assert!(!limiter.check_limit("forever", 1, Duration::MAX));

        let wait = limiter.time_until_reset("forever", Duration::MAX).unwrap();
        assert_eq!(wait, Duration::MAX - Duration::from_secs(3600));
        assert!(matches!(
            limiter.check_or_reject("forever", 1, Duration::MAX),
            Err(ResilienceError::RateLimitExceeded { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_slides_instead_of_resetting() {
        let limiter = RateLimiter::new();
        let window = Duration::from_secs(10);

        assert!(limiter.check_limit("k", 2, window));
        time::advance(Duration::from_secs(6)).await;
        assert!(limiter.check_limit("k", 2, window));
        assert!(!limiter.check_limit("k", 2, window));

        // Only the first admission has aged out.
        time::advance(Duration::from_secs(5)).await;
        assert!(limiter.check_limit("k", 2, window));
        assert!(!limiter.check_limit("k", 2, window));
    }

    #[tokio::test(start_paused = true)]
    async fn test_denial_does_not_record() {
        let limiter = RateLimiter::new();
        let window = Duration::from_secs(10);
        assert!(limiter.check_limit("k", 1, window));
        for _ in 0..10 {
            assert!(!limiter.check_limit("k", 1, window));
        }
        assert_eq!(limiter.time_until_reset("k", window), Some(window));
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_until_reset() {
        let limiter = RateLimiter::new();
        assert_eq!(limiter.time_until_reset("never-used", WINDOW), None);

        limiter.check_limit("upload", 3, WINDOW);
        time::advance(Duration::from_secs(100)).await;
        assert_eq!(limiter.time_until_reset("upload", WINDOW), Some(Duration::from_secs(800)));

        time::advance(Duration::from_secs(801)).await;
        assert_eq!(limiter.time_until_reset("upload", WINDOW), None);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_or_reject_reports_retry_after() {
        let limiter = RateLimiter::new();
        let window = Duration::from_secs(60);
        assert!(limiter.check_or_reject("post", 1, window).is_ok());
        time::advance(Duration::from_secs(20)).await;
        match limiter.check_or_reject("post", 1, window) {
            Err(ResilienceError::RateLimitExceeded { retry_after }) => {
                assert_eq!(retry_after, Duration::from_secs(40));
            }
            other => panic!("expected rate limit, got {:?}", other),
        }
    }

    #[test]
    fn test_reset_is_idempotent() {
        let limiter = RateLimiter::new();
        limiter.reset("ghost");
        assert!(limiter.check_limit("k", 1, WINDOW));
        limiter.reset("k");
        limiter.reset("k");
        assert!(limiter.check_limit("k", 1, WINDOW));
        limiter.clear_all();
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[test]
    fn test_rules_scope_keys() {
        let limiter = RateLimiter::new();
        let rule = RateLimitRule::new("sign_in", 2, 900);
        assert!(limiter.check_rule(&rule, "alice"));
        assert!(limiter.check_rule(&rule, "alice"));
        assert!(!limiter.check_rule(&rule, "alice"));
        assert!(limiter.check_rule(&rule, "bob"));
        assert_eq!(limiter.remaining_for_rule(&rule, "bob"), 1);

        limiter.reset_rule(&rule, "alice");
        assert_eq!(limiter.remaining_for_rule(&rule, "alice"), 2);
    }
}
