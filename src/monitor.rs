//! Periodic worker health sweeps.
//!
//! Each sweep copies the worker URLs under the read lock, probes every
//! sidecar's `/health` endpoint concurrently outside the lock, then applies
//! the outcomes and evicts workers that crossed the failure threshold.
//! A worker being busy is not a failure signal, and removal never
//! interrupts an in-flight job; the executor learns from its own call.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::registry::WorkerRegistry;

pub struct HealthMonitor {
    registry: Arc<RwLock<WorkerRegistry>>,
    client: reqwest::Client,
    period: Duration,
    max_failed_probes: u32,
    shutdown: CancellationToken,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<RwLock<WorkerRegistry>>,
        client: reqwest::Client,
        period: Duration,
        max_failed_probes: u32,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry,
            client,
            period,
            max_failed_probes,
            shutdown,
        }
    }

    /// Sweep on a fixed period until shutdown.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.period);

        loop {
            tokio::select! {
                _ = interval.tick() => self.sweep().await,
                _ = self.shutdown.cancelled() => {
                    tracing::debug!("Health monitor stopped");
                    return;
                }
            }
        }
    }

    /// One full pass over the registry.
    pub async fn sweep(&self) {
        let urls = self.registry.read().await.urls();
        if urls.is_empty() {
            return;
        }

        let probes = join_all(urls.iter().map(|url| self.probe(url))).await;

        let mut registry = self.registry.write().await;
        for (url, healthy) in urls.iter().zip(probes) {
            if healthy {
                registry.record_probe_success(url);
            } else {
                registry.record_probe_failure(url, self.max_failed_probes);
            }
        }

        for url in registry.evict_unhealthy() {
            tracing::warn!(worker = %url, "Worker evicted after repeated failed probes");
        }
    }

    /// Probe errors are absorbed here; the counter is the only signal.
    async fn probe(&self, url: &str) -> bool {
        match self.client.get(format!("{url}/health")).send().await {
            Ok(response) => response.status() == reqwest::StatusCode::OK,
            Err(err) => {
                tracing::debug!(worker = %url, error = %err, "Health probe failed");
                false
            }
        }
    }
}
