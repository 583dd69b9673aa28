//! Load testing for batch retries and the rate limiter.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};

use netguard::config::{OrchestratorConfig, RateLimitConfig};
use netguard::resilience::{Outcome, ResilienceError};
use netguard::security::RateLimiter;

mod common;
use common::InFlight;

#[tokio::test(start_paused = true)]
async fn test_batch_respects_concurrency() {
    let orchestrator = common::orchestrator(common::online_monitor(), OrchestratorConfig::default());
    let in_flight = InFlight::default();

    let operations: Vec<_> = (0..10)
        .map(|i| {
            let in_flight = in_flight.clone();
            let op = move || {
                let in_flight = in_flight.clone();
                async move {
                    in_flight.enter();
                    time::sleep(Duration::from_millis(100)).await;
                    in_flight.exit();
                    Ok::<_, ResilienceError>(i)
                }
            };
            (format!("item-{i}"), op)
        })
        .collect();

    let started = Instant::now();
    let results = orchestrator
        .retry_batch(operations, common::exact_policy(2, Duration::from_secs(1)), Some(3))
        .await;

    assert_eq!(results.len(), 10);
    assert!(in_flight.peak() <= 3);
    assert_eq!(in_flight.peak(), 3);
    for i in 0..10 {
        let outcome = &results[&format!("item-{i}")];
        assert_eq!(outcome.value(), Some(&i));
    }
    // Four chunks (3, 3, 3, 1), each waiting for its slowest member.
    common::assert_close(started.elapsed(), Duration::from_millis(400));
}

#[tokio::test(start_paused = true)]
async fn test_batch_isolates_failures() {
    let orchestrator = common::orchestrator(common::online_monitor(), OrchestratorConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));

    let operations: Vec<_> = (0..6)
        .map(|i| {
            let calls = calls.clone();
            let op = move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if i % 2 == 0 {
                        Err(ResilienceError::ServerError(500))
                    } else {
                        Ok(i)
                    }
                }
            };
            (format!("req-{i}"), op)
        })
        .collect();

    let results = orchestrator
        .retry_batch(operations, common::exact_policy(3, Duration::from_millis(50)), Some(4))
        .await;

    assert_eq!(results.len(), 6);
    let failed = results
        .values()
        .filter(|o| matches!(o, Outcome::Failure { attempts: 3, .. }))
        .count();
    assert_eq!(failed, 3);
    assert_eq!(results.values().filter(|o| o.is_success()).count(), 3);
    // Three failing ops × 3 attempts + three successes.
    assert_eq!(calls.load(Ordering::SeqCst), 12);
}

#[tokio::test(start_paused = true)]
async fn test_batch_zero_concurrency_runs_sequentially() {
    let orchestrator = common::orchestrator(common::online_monitor(), OrchestratorConfig::default());
    let in_flight = InFlight::default();

    let operations: Vec<_> = (0..3)
        .map(|i| {
            let in_flight = in_flight.clone();
            let op = move || {
                let in_flight = in_flight.clone();
                async move {
                    in_flight.enter();
                    time::sleep(Duration::from_millis(10)).await;
                    in_flight.exit();
                    Ok::<_, ResilienceError>(i)
                }
            };
            (format!("seq-{i}"), op)
        })
        .collect();

    let results = orchestrator
        .retry_batch(operations, common::exact_policy(1, Duration::from_secs(1)), Some(0))
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(in_flight.peak(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_batch_uses_configured_concurrency() {
    let config = OrchestratorConfig {
        batch_max_concurrency: 2,
        ..OrchestratorConfig::default()
    };
    let orchestrator = common::orchestrator(common::online_monitor(), config);
    let in_flight = InFlight::default();

    let operations: Vec<_> = (0..5)
        .map(|i| {
            let in_flight = in_flight.clone();
            let op = move || {
                let in_flight = in_flight.clone();
                async move {
                    in_flight.enter();
                    time::sleep(Duration::from_millis(100)).await;
                    in_flight.exit();
                    Ok::<_, ResilienceError>(i)
                }
            };
            (format!("cfg-{i}"), op)
        })
        .collect();

    let started = Instant::now();
    let results = orchestrator
        .retry_batch(operations, common::exact_policy(1, Duration::from_secs(1)), None)
        .await;

    assert_eq!(results.len(), 5);
    assert_eq!(in_flight.peak(), 2);
    // Three chunks (2, 2, 1).
    common::assert_close(started.elapsed(), Duration::from_millis(300));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rate_limiter_under_contention() {
    let limiter = Arc::new(RateLimiter::new());
    let window = Duration::from_secs(60);
    let concurrency = 20;
    let requests_per_task = 10;

    let mut handles = Vec::with_capacity(concurrency);
    for _ in 0..concurrency {
        let limiter = limiter.clone();
        handles.push(tokio::spawn(async move {
            let mut allowed = 0;
            for _ in 0..requests_per_task {
                if limiter.check_limit("shared", 25, window) {
                    allowed += 1;
                }
                tokio::task::yield_now().await;
            }
            allowed
        }));
    }

    let mut total_allowed = 0;
    for handle in handles {
        total_allowed += handle.await.unwrap();
    }

    assert_eq!(total_allowed, 25);
    assert_eq!(limiter.remaining_attempts("shared", 25, window), 0);
    assert_eq!(limiter.tracked_keys(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rate_limiter_keys_are_independent() {
    let limiter = Arc::new(RateLimiter::new());
    let rules = RateLimitConfig::default();
    let sign_in = rules.rule("sign_in").unwrap().clone();

    let mut handles = Vec::new();
    for user in 0..50 {
        let limiter = limiter.clone();
        let rule = sign_in.clone();
        handles.push(tokio::spawn(async move {
            let key = format!("user-{user}");
            let allowed = (0..rule.max_requests + 2)
                .filter(|_| limiter.check_rule(&rule, &key))
                .count();
            (allowed, limiter.remaining_for_rule(&rule, &key))
        }));
    }

    for handle in handles {
        let (allowed, remaining) = handle.await.unwrap();
        assert_eq!(allowed, sign_in.max_requests);
        assert_eq!(remaining, 0);
    }
    assert_eq!(limiter.tracked_keys(), 50);

    limiter.clear_all();
    assert_eq!(limiter.tracked_keys(), 0);
}
