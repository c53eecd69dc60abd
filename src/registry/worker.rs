use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Healthy,
    Unhealthy,
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerStatus::Healthy => write!(f, "healthy"),
            WorkerStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// State tracked for one registered worker sidecar.
///
/// The URL is the worker's identity and never changes after creation.
/// Connectivity fields (status, busy, heartbeat, failed ping counter) are
/// reset on re-registration; history (start time, job counters, latency
/// mean) survives it.
#[derive(Debug, Clone)]
pub struct WorkerRecord {
    pub url: String,
    pub model: String,
    pub status: WorkerStatus,
    pub busy: bool,
    pub last_heartbeat: DateTime<Utc>,
    pub failed_pings: u32,
    pub started_at: DateTime<Utc>,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    /// Successful completions; denominator of the latency mean.
    pub requests: u64,
    /// Running arithmetic mean of successful-completion latency, in ms.
    pub avg_response_ms: f64,
    pub last_active: Option<DateTime<Utc>>,
    pub last_error: String,
}

impl WorkerRecord {
    pub fn new(url: String, model: String) -> Self {
        let now = Utc::now();
        Self {
            url,
            model,
            status: WorkerStatus::Healthy,
            busy: false,
            last_heartbeat: now,
            failed_pings: 0,
            started_at: now,
            jobs_completed: 0,
            jobs_failed: 0,
            requests: 0,
            avg_response_ms: 0.0,
            last_active: None,
            last_error: String::new(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == WorkerStatus::Healthy && !self.busy
    }

    /// Fold one success latency sample into the running mean.
    /// With n samples total, avg' = (avg * (n - 1) + x) / n.
    pub(crate) fn record_success(&mut self, latency_ms: f64) {
        self.jobs_completed += 1;
        self.requests += 1;
        let n = self.requests as f64;
        self.avg_response_ms = (self.avg_response_ms * (n - 1.0) + latency_ms) / n;
        self.last_active = Some(Utc::now());
        self.last_error.clear();
        self.status = WorkerStatus::Healthy;
    }

    pub(crate) fn record_failure(&mut self, reason: &str) {
        self.jobs_failed += 1;
        self.last_error = reason.to_string();
    }
}
