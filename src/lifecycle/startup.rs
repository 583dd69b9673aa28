//! Startup orchestration.
//!
//! # Responsibilities
//! - Construct the limiter, monitor and orchestrator once from validated config
//! - Start background tasks (latency sampling, reachability)
//! - Apply reloaded configuration to running components
//!
//! # Design Decisions
//! - Explicit instances shared by `Arc`; no process-wide globals
//! - Subsystems initialize in order: monitor first, orchestrator depends on it
//! - Background tasks stop on the shared shutdown broadcast

use std::net::SocketAddr;
use std::sync::Arc;
use arc_swap::ArcSwap;
use tokio::task::JoinHandle;

use crate::config::{RateLimitConfig, RateLimitRule, ResilienceConfig};
use crate::lifecycle::shutdown::Shutdown;
use crate::network::{LatencyProbe, LatencySampler, NetworkQualityMonitor, ReachabilityObserver};
use crate::resilience::RetryOrchestrator;
use crate::security::RateLimiter;

/// The resilience layer, wired together.
pub struct Services {
    pub limiter: Arc<RateLimiter>,
    pub monitor: Arc<NetworkQualityMonitor>,
    pub orchestrator: Arc<RetryOrchestrator>,
    rate_limits: ArcSwap<RateLimitConfig>,
}

impl Services {
    pub fn new(config: ResilienceConfig, probe: Option<Arc<dyn LatencyProbe>>) -> Self {
        let monitor = Arc::new(match probe {
            Some(probe) => NetworkQualityMonitor::with_probe(config.network.clone(), probe),
            None => NetworkQualityMonitor::new(config.network.clone()),
        });
        let orchestrator = Arc::new(RetryOrchestrator::new(monitor.clone(), config.orchestrator.clone()));

        tracing::info!(
            rules = config.rate_limits.rules.len(),
            default_preset = ?config.orchestrator.default_preset,
            "Resilience services initialized"
        );

        Self {
            limiter: Arc::new(RateLimiter::new()),
            monitor,
            orchestrator,
            rate_limits: ArcSwap::from_pointee(config.rate_limits),
        }
    }

    /// Look up a named rate-limit rule from the current configuration.
    pub fn rule(&self, name: &str) -> Option<RateLimitRule> {
        self.rate_limits.load().rule(name).cloned()
    }

    /// Start latency sampling and, if configured, reachability observation.
    pub fn spawn_background(&self, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        let sampler = LatencySampler::new(self.monitor.clone());
        handles.push(tokio::spawn(sampler.run(shutdown.subscribe())));

        let config = self.monitor.config();
        if let Some(addr) = &config.reachability_addr {
            match addr.parse::<SocketAddr>() {
                Ok(target) => {
                    let observer = ReachabilityObserver::new(self.monitor.clone(), target);
                    handles.push(tokio::spawn(observer.run(shutdown.subscribe())));
                }
                Err(e) => {
                    tracing::warn!(addr = %addr, error = %e, "Invalid reachability address, observer not started");
                }
            }
        }

        handles
    }

    /// Apply a reloaded configuration. Orchestrator settings take effect on restart.
    pub fn apply_reload(&self, config: ResilienceConfig) {
        self.monitor.reconfigure(config.network);
        self.rate_limits.store(Arc::new(config.rate_limits));
        tracing::info!("Configuration reload applied");
    }
}
