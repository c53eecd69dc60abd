//! Worker membership and per-worker statistics.
//!
//! The registry is the single shared authority over the worker set. It is a
//! plain synchronous structure; the dispatcher owns it behind one
//! `Arc<RwLock<WorkerRegistry>>` and every mutation goes through that lock.
//! Executors hold worker URLs, never references into the registry.

pub mod stats;
pub mod worker;

pub use stats::{LeaderboardEntry, PoolStats};
pub use worker::{WorkerRecord, WorkerStatus};

use chrono::Utc;

/// Registry of known workers, in insertion order.
///
/// URLs are unique. Insertion order is load-bearing: the selector scans it
/// round-robin and leaderboard ties fall back to it.
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: Vec<WorkerRecord>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker, or refresh it if the URL is already known.
    ///
    /// A refresh resets connectivity state (healthy, idle, heartbeat now,
    /// ping failures cleared) and overwrites the model tag, but preserves
    /// the start time and all counters so a flapping worker keeps its
    /// history.
    pub fn upsert(&mut self, url: &str, model: &str) {
        if let Some(w) = self.get_mut(url) {
            w.model = model.to_string();
            w.status = WorkerStatus::Healthy;
            w.busy = false;
            w.last_heartbeat = Utc::now();
            w.failed_pings = 0;
            tracing::info!(worker = %url, model = %model, "Worker refreshed");
            return;
        }

        self.workers
            .push(WorkerRecord::new(url.to_string(), model.to_string()));
        tracing::info!(worker = %url, model = %model, "Worker registered");
    }

    /// Remove a worker. No-op if the URL is unknown.
    pub fn remove(&mut self, url: &str) {
        self.workers.retain(|w| w.url != url);
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn get(&self, url: &str) -> Option<&WorkerRecord> {
        self.workers.iter().find(|w| w.url == url)
    }

    fn get_mut(&mut self, url: &str) -> Option<&mut WorkerRecord> {
        self.workers.iter_mut().find(|w| w.url == url)
    }

    /// URLs of all registered workers, in insertion order.
    pub fn urls(&self) -> Vec<String> {
        self.workers.iter().map(|w| w.url.clone()).collect()
    }

    /// Deep copy of every record, for the observability views.
    pub fn snapshot(&self) -> Vec<WorkerRecord> {
        self.workers.to_vec()
    }

    pub fn healthy_count(&self) -> usize {
        self.workers
            .iter()
            .filter(|w| w.status == WorkerStatus::Healthy)
            .count()
    }

    pub fn busy_count(&self) -> usize {
        self.workers.iter().filter(|w| w.busy).count()
    }

    /// Scan from `start` (wrapping) and claim the first healthy, idle
    /// worker. The busy flag is set before the lock is released, so a
    /// worker can be claimed by at most one executor at a time.
    pub fn try_acquire(&mut self, start: usize) -> Option<String> {
        if self.workers.is_empty() {
            return None;
        }
        let len = self.workers.len();
        for offset in 0..len {
            let idx = (start + offset) % len;
            if self.workers[idx].is_available() {
                self.workers[idx].busy = true;
                return Some(self.workers[idx].url.clone());
            }
        }
        None
    }

    /// Returns false if the worker is unknown or already busy.
    pub fn mark_busy(&mut self, url: &str) -> bool {
        match self.get_mut(url) {
            Some(w) if !w.busy => {
                w.busy = true;
                true
            }
            _ => false,
        }
    }

    pub fn clear_busy(&mut self, url: &str) {
        if let Some(w) = self.get_mut(url) {
            w.busy = false;
        }
    }

    /// Account a successful dispatch. Also re-affirms Healthy status: a
    /// worker that answers real traffic is alive regardless of what the
    /// last probe said.
    pub fn record_success(&mut self, url: &str, latency_ms: f64) {
        if let Some(w) = self.get_mut(url) {
            w.record_success(latency_ms);
        }
    }

    /// Account a failed dispatch. Deliberately does not change status;
    /// membership decisions belong to the health monitor.
    pub fn record_failure(&mut self, url: &str, reason: &str) {
        if let Some(w) = self.get_mut(url) {
            w.record_failure(reason);
        }
    }

    pub fn record_probe_success(&mut self, url: &str) {
        if let Some(w) = self.get_mut(url) {
            w.status = WorkerStatus::Healthy;
            w.failed_pings = 0;
            w.last_heartbeat = Utc::now();
        }
    }

    /// Bump the consecutive-failure counter; at `max_failed` the worker
    /// turns Unhealthy and the next `evict_unhealthy` call removes it.
    pub fn record_probe_failure(&mut self, url: &str, max_failed: u32) {
        if let Some(w) = self.get_mut(url) {
            w.failed_pings += 1;
            if w.failed_pings >= max_failed {
                w.status = WorkerStatus::Unhealthy;
            }
        }
    }

    /// Drop every Unhealthy worker, returning the removed URLs.
    pub fn evict_unhealthy(&mut self) -> Vec<String> {
        let evicted: Vec<String> = self
            .workers
            .iter()
            .filter(|w| w.status == WorkerStatus::Unhealthy)
            .map(|w| w.url.clone())
            .collect();
        self.workers.retain(|w| w.status != WorkerStatus::Unhealthy);
        evicted
    }
}
