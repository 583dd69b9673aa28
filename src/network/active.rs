//! Active latency sampling.
//!
//! # Responsibilities
//! - Define the probe used to measure round-trip latency
//! - Periodically sample latency while the link is usable
//!
//! # Design Decisions
//! - Probes are a trait so the monitor can be driven without a network
//! - Every probe runs under its own timeout, enforced by the monitor
//! - The sampling interval is re-read each cycle so reloads apply without restart

use std::sync::Arc;
use std::time::Duration;
use futures_util::future::BoxFuture;
use tokio::sync::broadcast;
use tokio::time;
use url::Url;

use crate::network::monitor::NetworkQualityMonitor;
use crate::resilience::error::{ResilienceError, ResilienceResult};

/// A minimal round trip whose duration is the latency sample.
pub trait LatencyProbe: Send + Sync {
    fn probe(&self) -> BoxFuture<'_, ResilienceResult<()>>;
}

/// HEAD request against a lightweight endpoint.
pub struct HttpProbe {
    client: reqwest::Client,
    url: Url,
}

impl HttpProbe {
    pub fn new(url: &str) -> ResilienceResult<Self> {
        let url = Url::parse(url)
            .map_err(|e| ResilienceError::Probe(format!("invalid probe URL '{}': {}", url, e)))?;
        let client = reqwest::Client::builder()
            .user_agent("netguard-latency-probe")
            .build()
            .map_err(|e| ResilienceError::Probe(e.to_string()))?;
        Ok(Self { client, url })
    }
}

impl LatencyProbe for HttpProbe {
    fn probe(&self) -> BoxFuture<'_, ResilienceResult<()>> {
        Box::pin(async move {
            let response = self.client.head(self.url.clone()).send().await?;
            let status = response.status();
            if status.is_server_error() {
                return Err(ResilienceError::ServerError(status.as_u16()));
            }
            Ok(())
        })
    }
}

impl std::fmt::Debug for HttpProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProbe").field("url", &self.url.as_str()).finish()
    }
}

/// Drives periodic latency sampling for a monitor.
pub struct LatencySampler {
    monitor: Arc<NetworkQualityMonitor>,
}

impl LatencySampler {
    pub fn new(monitor: Arc<NetworkQualityMonitor>) -> Self {
        Self { monitor }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.monitor.config().enabled {
            tracing::info!("Latency sampling disabled");
            return;
        }

        tracing::info!(
            interval = self.monitor.config().sample_interval_secs,
            url = %self.monitor.config().probe_url,
            "Latency sampler starting"
        );

        loop {
            let interval = self.monitor.config().sample_interval().max(Duration::from_secs(1));
            tokio::select! {
                _ = time::sleep(interval) => {
                    if self.monitor.is_online() {
                        let _ = self.monitor.sample_latency().await;
                    } else {
                        tracing::debug!(status = %self.monitor.status(), "Skipping latency sample while offline");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Latency sampler received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use crate::config::NetworkMonitorConfig;
    use crate::lifecycle::Shutdown;
    use crate::network::passive::PathUpdate;
    use crate::network::state::{ConnectivityState, TransportType};

    #[derive(Default)]
    struct CountingProbe {
        calls: AtomicU32,
    }

    impl LatencyProbe for CountingProbe {
        fn probe(&self) -> BoxFuture<'_, ResilienceResult<()>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sampler_only_probes_while_usable() {
        let probe = Arc::new(CountingProbe::default());
        let config = NetworkMonitorConfig {
            sample_interval_secs: 30,
            ..NetworkMonitorConfig::default()
        };
        let monitor = Arc::new(NetworkQualityMonitor::with_probe(config, probe.clone()));
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(LatencySampler::new(monitor.clone()).run(shutdown.subscribe()));

        // Ticks at 30s and 60s while unknown.
        time::sleep(Duration::from_secs(65)).await;
        assert_eq!(monitor.status(), ConnectivityState::Unknown);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);

        // Tick at 90s while disconnected.
        monitor.apply_path_update(PathUpdate::unsatisfied());
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);

        // Ticks at 120s and 150s once the path is satisfied.
        monitor.apply_path_update(PathUpdate::satisfied(TransportType::Wifi));
        time::sleep(Duration::from_secs(61)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
        assert_eq!(monitor.latency_samples().len(), 2);

        shutdown.trigger();
        time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sampler should stop on shutdown")
            .unwrap();
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_sampler_returns_immediately() {
        let config = NetworkMonitorConfig {
            enabled: false,
            ..NetworkMonitorConfig::default()
        };
        let monitor = Arc::new(NetworkQualityMonitor::new(config));
        let shutdown = Shutdown::new();
        LatencySampler::new(monitor).run(shutdown.subscribe()).await;
    }

    #[test]
    fn test_http_probe_rejects_bad_url() {
        assert!(matches!(HttpProbe::new("not a url"), Err(ResilienceError::Probe(_))));
        assert!(HttpProbe::new("http://127.0.0.1:9/health").is_ok());
    }
}
