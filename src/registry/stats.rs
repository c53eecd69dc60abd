//! Read-only observability views over the registry.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::registry::worker::WorkerRecord;

/// Snapshot of the whole pool, as served by `GET /stats`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub total_workers: usize,
    pub healthy_workers: usize,
    pub busy_workers: usize,
    pub pending_jobs: usize,
    pub workers: Vec<WorkerStatsView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatsView {
    pub url: String,
    pub model: String,
    pub status: String,
    pub busy: bool,
    pub last_heartbeat: DateTime<Utc>,
    pub total_jobs: u64,
    pub total_failures: u64,
    pub last_error: String,
}

impl From<&WorkerRecord> for WorkerStatsView {
    fn from(w: &WorkerRecord) -> Self {
        Self {
            url: w.url.clone(),
            model: w.model.clone(),
            status: w.status.to_string(),
            busy: w.busy,
            last_heartbeat: w.last_heartbeat,
            total_jobs: w.jobs_completed + w.jobs_failed,
            total_failures: w.jobs_failed,
            last_error: w.last_error.clone(),
        }
    }
}

impl PoolStats {
    pub fn from_snapshot(workers: &[WorkerRecord], pending_jobs: usize) -> Self {
        Self {
            total_workers: workers.len(),
            healthy_workers: workers
                .iter()
                .filter(|w| w.status == crate::registry::WorkerStatus::Healthy)
                .count(),
            busy_workers: workers.iter().filter(|w| w.busy).count(),
            pending_jobs,
            workers: workers.iter().map(WorkerStatsView::from).collect(),
        }
    }
}

/// One row of the performance leaderboard, as served by `GET /leaderboard`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub url: String,
    pub requests: u64,
    pub avg_response_ms: f64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub start_time: DateTime<Utc>,
    pub score: f64,
}

/// Build the leaderboard from a registry snapshot.
///
/// Ordering: workers that have served requests first, fastest mean latency
/// leading; workers with no requests yet trail, ordered by URL so the view
/// is deterministic.
pub fn leaderboard(workers: &[WorkerRecord]) -> Vec<LeaderboardEntry> {
    let now = Utc::now();
    let mut entries: Vec<LeaderboardEntry> = workers
        .iter()
        .map(|w| LeaderboardEntry {
            url: w.url.clone(),
            requests: w.requests,
            avg_response_ms: w.avg_response_ms,
            jobs_completed: w.jobs_completed,
            jobs_failed: w.jobs_failed,
            start_time: w.started_at,
            score: worker_score(w, now),
        })
        .collect();

    entries.sort_by(|a, b| match (a.requests > 0, b.requests > 0) {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        (true, true) => a
            .avg_response_ms
            .partial_cmp(&b.avg_response_ms)
            .unwrap_or(std::cmp::Ordering::Equal),
        (false, false) => a.url.cmp(&b.url),
    });

    entries
}

/// Composite performance score in [0, 100].
///
/// 70% success rate, 30% throughput, with 10 jobs/min saturating the
/// throughput term. Uptime is floored at one minute so a worker cannot
/// inflate its throughput by being seconds old. Workers with no finished
/// jobs sit at a neutral 50.
pub fn worker_score(w: &WorkerRecord, now: DateTime<Utc>) -> f64 {
    let total_jobs = w.jobs_completed + w.jobs_failed;
    if total_jobs == 0 {
        return 50.0;
    }

    let success_rate = w.jobs_completed as f64 / total_jobs as f64;

    let uptime_minutes = ((now - w.started_at).num_milliseconds() as f64 / 60_000.0).max(1.0);
    let throughput = (w.jobs_completed as f64 / uptime_minutes / 10.0).min(1.0);

    (0.7 * success_rate + 0.3 * throughput) * 100.0
}
