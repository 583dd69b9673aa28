//! Connectivity quality monitor.
//!
//! Single writer, many readers: mutations go through a short critical section
//! on the link state, then the new snapshot is published on a `watch`
//! channel after that lock is released. Readers either poll the getters or
//! subscribe; getters may be called while a `watch` borrow is held, but
//! mutating methods may not.
//!
//! Lock order for writers: `publish`, then `link` (released), then the watch
//! channel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use arc_swap::ArcSwap;
use tokio::sync::watch;
use tokio::time::{self, Instant};

use crate::config::NetworkMonitorConfig;
use crate::network::active::LatencyProbe;
use crate::network::passive::PathUpdate;
use crate::network::state::{
    ConnectionQuality, ConnectivityState, LinkState, NetworkEvent, NetworkSnapshot, Thresholds,
};
use crate::observability::metrics;
use crate::resilience::error::{ResilienceError, ResilienceResult};

fn thresholds(config: &NetworkMonitorConfig) -> Thresholds {
    Thresholds {
        demote: config.demote_latency(),
        promote: config.promote_latency(),
    }
}

/// Maintains connectivity status, latency average and derived quality.
pub struct NetworkQualityMonitor {
    config: ArcSwap<NetworkMonitorConfig>,
    link: Mutex<LinkState>,
    // Serializes writers so snapshots are published in mutation order.
    publish: Mutex<()>,
    snapshot_tx: watch::Sender<NetworkSnapshot>,
    probe: Option<Arc<dyn LatencyProbe>>,
}

impl NetworkQualityMonitor {
    /// A monitor fed only by path updates and externally recorded samples.
    pub fn new(config: NetworkMonitorConfig) -> Self {
        Self::build(config, None)
    }

    /// A monitor that can sample latency itself.
    pub fn with_probe(config: NetworkMonitorConfig, probe: Arc<dyn LatencyProbe>) -> Self {
        Self::build(config, Some(probe))
    }

    fn build(config: NetworkMonitorConfig, probe: Option<Arc<dyn LatencyProbe>>) -> Self {
        let link = LinkState::new(config.latency_capacity, config.history_capacity, thresholds(&config));
        let (snapshot_tx, _) = watch::channel(link.snapshot());
        Self {
            config: ArcSwap::from_pointee(config),
            link: Mutex::new(link),
            publish: Mutex::new(()),
            snapshot_tx,
            probe,
        }
    }

    fn link(&self) -> MutexGuard<'_, LinkState> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> Arc<NetworkMonitorConfig> {
        self.config.load_full()
    }

    /// Swap in new thresholds, capacities and intervals.
    pub fn reconfigure(&self, config: NetworkMonitorConfig) {
        {
            let _publish = self.publish.lock().unwrap_or_else(PoisonError::into_inner);
            let snapshot = {
                let mut link = self.link();
                link.reconfigure(config.latency_capacity, config.history_capacity, thresholds(&config));
                link.snapshot()
            };
            self.snapshot_tx.send_replace(snapshot);
        }
        tracing::info!(
            sample_interval_secs = config.sample_interval_secs,
            demote_latency_ms = config.demote_latency_ms,
            promote_latency_ms = config.promote_latency_ms,
            "Network monitor reconfigured"
        );
        self.config.store(Arc::new(config));
    }

    pub fn apply_path_update(&self, update: PathUpdate) {
        self.mutate(|link| link.apply_path(update));
    }

    /// Record a latency sample measured elsewhere.
    pub fn record_latency(&self, sample: Duration) {
        metrics::record_probe_latency(sample);
        self.mutate(|link| link.record_latency(sample));
    }

    pub fn record_probe_failure(&self, error: &ResilienceError) {
        tracing::warn!(error = %error, "Latency probe failed");
        metrics::record_probe_failure();
        self.mutate(|link| link.record_probe_failure());
    }

    /// Run one probe under the configured timeout and record the result.
    pub async fn sample_latency(&self) -> ResilienceResult<Duration> {
        let probe = match &self.probe {
            Some(probe) => probe.clone(),
            None => return Err(ResilienceError::Probe("no latency probe configured".into())),
        };

        let timeout = self.config().probe_timeout();
        let started = Instant::now();
        let result = match time::timeout(timeout, probe.probe()).await {
            Ok(result) => result,
            Err(_) => Err(ResilienceError::Timeout),
        };

        match result {
            Ok(()) => {
                let latency = started.elapsed();
                tracing::debug!(latency = ?latency, "Latency sample recorded");
                self.record_latency(latency);
                Ok(latency)
            }
            Err(e) => {
                self.record_probe_failure(&e);
                Err(e)
            }
        }
    }

    /// Force an immediate probe; true if the link is usable afterwards.
    pub async fn retry_connection(&self) -> bool {
        let _ = self.sample_latency().await;
        self.is_online()
    }

    pub fn status(&self) -> ConnectivityState {
        self.link().status()
    }

    pub fn quality(&self) -> ConnectionQuality {
        self.link().quality()
    }

    pub fn average_latency(&self) -> Duration {
        self.link().average_latency()
    }

    /// Connected or slow.
    pub fn is_online(&self) -> bool {
        self.status().is_usable()
    }

    pub fn snapshot(&self) -> NetworkSnapshot {
        self.link().snapshot()
    }

    /// Receive every published snapshot. The current value is available immediately.
    pub fn subscribe(&self) -> watch::Receiver<NetworkSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Recorded transitions, oldest first.
    pub fn event_history(&self) -> Vec<NetworkEvent> {
        self.link().history().to_vec()
    }

    /// Rolling latency samples, oldest first.
    pub fn latency_samples(&self) -> Vec<Duration> {
        self.link().latencies().to_vec()
    }

    fn mutate(&self, f: impl FnOnce(&mut LinkState) -> Option<NetworkEvent>) {
        let (event, snapshot) = {
            let _publish = self.publish.lock().unwrap_or_else(PoisonError::into_inner);
            let (event, snapshot) = {
                let mut link = self.link();
                let event = f(&mut link);
                (event, link.snapshot())
            };
            self.snapshot_tx.send_replace(snapshot.clone());
            (event, snapshot)
        };

        if let Some(event) = event {
            tracing::info!(
                status = %event.status,
                transport = ?event.transport,
                expensive = event.is_expensive,
                constrained = event.is_constrained,
                quality = ?snapshot.quality,
                "Connectivity changed"
            );
            metrics::record_connectivity(event.status);
        }
    }
}

impl std::fmt::Debug for NetworkQualityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkQualityMonitor")
            .field("snapshot", &self.snapshot())
            .field("has_probe", &self.probe.is_some())
            .finish()
    }
}
