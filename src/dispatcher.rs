//! Dispatcher facade that wires the components together.
//!
//! Owns the worker registry, the bounded job queue, and the shared outbound
//! HTTP client; spawns the executor pool and the health monitor. Producers
//! and the HTTP edge interact only with this type.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::DispatcherConfig;
use crate::dispatch::executor::Executor;
use crate::dispatch::job::{Job, JobHandle};
use crate::dispatch::queue::{bounded, JobIntake, JobQueue};
use crate::dispatch::selector::Selector;
use crate::error::{DispatchError, Result};
use crate::monitor::HealthMonitor;
use crate::registry::stats::{leaderboard, LeaderboardEntry, PoolStats};
use crate::registry::WorkerRegistry;

pub struct Dispatcher {
    config: DispatcherConfig,
    registry: Arc<RwLock<WorkerRegistry>>,
    queue: JobQueue,
    intake: JobIntake,
    selector: Arc<Selector>,
    client: reqwest::Client,
    shutdown: CancellationToken,
    started: AtomicBool,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.outbound_timeout)
            .build()
            .map_err(|err| DispatchError::Config(format!("http client: {err}")))?;

        let registry = Arc::new(RwLock::new(WorkerRegistry::new()));
        let (queue, intake) = bounded(config.queue_size);
        let selector = Arc::new(Selector::new(
            registry.clone(),
            config.selector_backoff,
            config.selector_max_tries,
        ));

        Ok(Self {
            config,
            registry,
            queue,
            intake,
            selector,
            client,
            shutdown: CancellationToken::new(),
            started: AtomicBool::new(false),
        })
    }

    /// Spawn the executor pool and the health monitor. Idempotent.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        for id in 0..self.config.concurrent_executors {
            let executor = Executor {
                id,
                registry: self.registry.clone(),
                selector: self.selector.clone(),
                intake: self.intake.clone(),
                queue: self.queue.clone(),
                client: self.client.clone(),
                shutdown: self.shutdown.clone(),
            };
            tokio::spawn(executor.run());
        }

        let monitor = HealthMonitor::new(
            self.registry.clone(),
            self.client.clone(),
            self.config.heartbeat_period,
            self.config.max_failed_probes,
            self.shutdown.clone(),
        );
        tokio::spawn(monitor.run());

        tracing::info!(
            executors = self.config.concurrent_executors,
            queue_size = self.config.queue_size,
            heartbeat_period = ?self.config.heartbeat_period,
            "Dispatcher started"
        );
    }

    /// Stop executors and the monitor. Jobs still in the queue resolve as
    /// `QueueClosed` on their handles once the dispatcher is dropped.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Token that fires when the dispatcher shuts down. Executors and the
    /// monitor already run on it; the HTTP edge drains on the same token
    /// so the whole process stops together.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Tie the dispatcher's lifetime to SIGTERM/SIGINT: either signal
    /// triggers [`Dispatcher::shutdown`].
    pub fn shutdown_on_signal(&self) {
        use tokio::signal::unix::{signal, SignalKind};

        let token = self.shutdown.clone();
        tokio::spawn(async move {
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
            let mut sigint =
                signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, draining dispatcher");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT, draining dispatcher");
                }
            }

            token.cancel();
        });
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Idempotent registration surface: refreshes an existing record,
    /// preserving its history.
    pub async fn register_worker(&self, url: &str, model: &str) {
        self.registry.write().await.upsert(url, model);
    }

    pub async fn remove_worker(&self, url: &str) {
        self.registry.write().await.remove(url);
    }

    /// Create a job carrying the configured retry budget.
    pub fn job(&self, endpoint: impl Into<String>, body: serde_json::Value) -> (Job, JobHandle) {
        Job::new(endpoint, body, self.config.max_retries)
    }

    /// Enqueue, waiting for queue capacity up to the job's deadline.
    pub async fn enqueue(&self, job: Job) -> Result<()> {
        self.queue.enqueue(job).await.map_err(|(_, err)| err)
    }

    /// Enqueue without waiting; a full queue is an immediate `Overloaded`.
    pub fn try_enqueue(&self, job: Job) -> Result<()> {
        self.queue.try_enqueue(job).map_err(|(_, err)| err)
    }

    /// Convenience: build and enqueue a job, returning its handle.
    pub async fn submit(
        &self,
        endpoint: impl Into<String>,
        body: serde_json::Value,
    ) -> Result<JobHandle> {
        let (job, handle) = self.job(endpoint, body);
        self.enqueue(job).await?;
        Ok(handle)
    }

    pub async fn stats(&self) -> PoolStats {
        let snapshot = self.registry.read().await.snapshot();
        PoolStats::from_snapshot(&snapshot, self.queue.pending())
    }

    pub async fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let snapshot = self.registry.read().await.snapshot();
        leaderboard(&snapshot)
    }
}
