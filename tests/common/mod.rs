//! Shared utilities for integration and load testing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::Instant;

use netguard::config::{NetworkMonitorConfig, OrchestratorConfig};
use netguard::network::{NetworkQualityMonitor, PathUpdate, TransportType};
use netguard::resilience::{ResilienceError, RetryOrchestrator, RetryPolicy};

/// Monitor with a satisfied wifi path, so network-aware retries start immediately.
#[allow(dead_code)]
pub fn online_monitor() -> Arc<NetworkQualityMonitor> {
    let monitor = Arc::new(NetworkQualityMonitor::new(NetworkMonitorConfig::default()));
    monitor.apply_path_update(PathUpdate::satisfied(TransportType::Wifi));
    monitor
}

/// Monitor that has never seen a path update.
#[allow(dead_code)]
pub fn offline_monitor() -> Arc<NetworkQualityMonitor> {
    Arc::new(NetworkQualityMonitor::new(NetworkMonitorConfig::default()))
}

#[allow(dead_code)]
pub fn orchestrator(monitor: Arc<NetworkQualityMonitor>, config: OrchestratorConfig) -> Arc<RetryOrchestrator> {
    Arc::new(RetryOrchestrator::new(monitor, config))
}

/// Jitter-free policy: delays are exactly base × multiplier^(n-1).
#[allow(dead_code)]
pub fn exact_policy(max_attempts: u32, base: Duration) -> RetryPolicy {
    RetryPolicy::new(max_attempts, base, Duration::from_secs(30), 2.0, (1.0, 1.0)).unwrap()
}

/// Paused-clock timer deadlines land on millisecond ticks.
#[allow(dead_code)]
pub fn assert_close(actual: Duration, expected: Duration) {
    let tolerance = Duration::from_millis(5);
    assert!(
        actual >= expected && actual <= expected + tolerance,
        "expected about {:?}, got {:?}",
        expected,
        actual
    );
}

/// An operation that fails a fixed number of times before succeeding, and
/// remembers when each call happened.
#[allow(dead_code)]
#[derive(Clone)]
pub struct ScriptedOperation {
    calls: Arc<AtomicU32>,
    failures: u32,
    error: fn() -> ResilienceError,
    started: Arc<Mutex<Vec<Instant>>>,
}

#[allow(dead_code)]
impl ScriptedOperation {
    pub fn failing(failures: u32, error: fn() -> ResilienceError) -> Self {
        Self {
            calls: Arc::new(AtomicU32::new(0)),
            failures,
            error,
            started: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn always_failing(error: fn() -> ResilienceError) -> Self {
        Self::failing(u32::MAX, error)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.started.lock().unwrap().clone()
    }

    /// Gaps between consecutive calls.
    pub fn gaps(&self) -> Vec<Duration> {
        self.call_times().windows(2).map(|w| w[1] - w[0]).collect()
    }

    pub fn run(&self) -> impl Future<Output = Result<u32, ResilienceError>> + Send + 'static {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.started.lock().unwrap().push(Instant::now());
        let failures = self.failures;
        let error = self.error;
        async move {
            if call <= failures {
                Err(error())
            } else {
                Ok(call)
            }
        }
    }
}

/// Tracks how many operations are running at once.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct InFlight {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl InFlight {
    pub fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    pub fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Start a programmable HTTP backend answering every request with the status
/// returned by `f`.
#[allow(dead_code)]
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = u16> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 1024];
                        let _ = socket.read(&mut buf).await;
                        let status = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            204 => "204 No Content",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                            status_text
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}
