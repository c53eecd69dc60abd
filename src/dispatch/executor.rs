//! Executor pool: dequeues jobs, drives the outbound call to the chosen
//! worker, classifies the result, updates worker statistics, and applies
//! the retry policy.

use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::dispatch::job::Job;
use crate::dispatch::queue::{JobIntake, JobQueue};
use crate::dispatch::selector::Selector;
use crate::error::DispatchError;
use crate::registry::WorkerRegistry;

/// Outcome of one outbound `/execute` call.
enum CallOutcome {
    /// HTTP 200 with a JSON body carrying no error marker; bytes verbatim.
    Success(Vec<u8>),
    /// Transport error, non-200, unreadable/invalid body, or an in-band
    /// error reported by the worker runtime. Counts against the worker.
    Failure(String),
    /// The job's deadline fired mid-call. Not the worker's fault; no
    /// counters move.
    Cancelled,
}

/// One dispatcher-internal executor task.
pub struct Executor {
    pub(crate) id: usize,
    pub(crate) registry: Arc<RwLock<WorkerRegistry>>,
    pub(crate) selector: Arc<Selector>,
    pub(crate) intake: JobIntake,
    pub(crate) queue: JobQueue,
    pub(crate) client: reqwest::Client,
    pub(crate) shutdown: CancellationToken,
}

impl Executor {
    /// Endless dequeue/dispatch cycle; exits cleanly on shutdown.
    pub async fn run(self) {
        while let Some(job) = self.intake.next(&self.shutdown).await {
            self.handle(job).await;
        }
        tracing::debug!(executor = self.id, "Executor stopped");
    }

    async fn handle(&self, mut job: Job) {
        let url = match self.selector.acquire(&job.cancel).await {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(job_id = %job.id, error = %err, "No worker for job");
                job.fail(err);
                return;
            }
        };

        let attempt = job.retry_count + 1;
        tracing::debug!(
            job_id = %job.id,
            worker = %url,
            endpoint = %job.endpoint,
            attempt,
            "Dispatching job"
        );

        let started = Instant::now();
        let outcome = self.call_worker(&url, &job).await;

        // Busy is released on every path, including cancellation.
        self.registry.write().await.clear_busy(&url);

        match outcome {
            CallOutcome::Success(reply) => {
                let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                self.registry.write().await.record_success(&url, latency_ms);
                tracing::debug!(job_id = %job.id, worker = %url, latency_ms, "Job succeeded");
                job.succeed(reply);
            }
            CallOutcome::Cancelled => {
                tracing::debug!(job_id = %job.id, worker = %url, "Job cancelled mid-call");
                job.fail(DispatchError::Cancelled);
            }
            CallOutcome::Failure(reason) => {
                self.registry.write().await.record_failure(&url, &reason);
                tracing::warn!(job_id = %job.id, worker = %url, reason = %reason, "Job attempt failed");
                self.retry_or_fail(job, url, reason).await;
            }
        }
    }

    /// Re-enqueue the job at the tail if its retry budget allows, so the
    /// next attempt lands on whichever worker the selector picks then.
    /// Otherwise, or if re-enqueueing itself fails, the failure is final.
    async fn retry_or_fail(&self, mut job: Job, url: String, reason: String) {
        let failure = DispatchError::WorkerFailure { url, reason };

        if !job.retries_left() {
            job.fail(failure);
            return;
        }

        job.retry_count += 1;
        let job_id = job.id;
        let attempt = job.retry_count;
        match self.queue.enqueue(job).await {
            Ok(()) => {
                tracing::debug!(job_id = %job_id, attempt, "Job re-enqueued for retry");
            }
            Err((job, enqueue_err)) => {
                tracing::warn!(
                    job_id = %job_id,
                    error = %enqueue_err,
                    "Retry re-enqueue failed, surfacing original failure"
                );
                job.fail(failure);
            }
        }
    }

    async fn call_worker(&self, url: &str, job: &Job) -> CallOutcome {
        let envelope = json!({
            "endpoint": job.endpoint,
            "body": job.body,
        });

        let request = self
            .client
            .post(format!("{url}/execute"))
            .json(&envelope)
            .send();

        let response = tokio::select! {
            response = request => response,
            _ = job.cancel.cancelled() => return CallOutcome::Cancelled,
        };

        let response = match response {
            Ok(response) => response,
            Err(err) => return CallOutcome::Failure(format!("transport error: {err}")),
        };

        if response.status() != reqwest::StatusCode::OK {
            return CallOutcome::Failure(format!("worker returned status {}", response.status()));
        }

        let body = tokio::select! {
            body = response.bytes() => body,
            _ = job.cancel.cancelled() => return CallOutcome::Cancelled,
        };

        let body = match body {
            Ok(body) => body,
            Err(err) => return CallOutcome::Failure(format!("failed to read worker response: {err}")),
        };

        // The contract promises a JSON reply; the worker runtime reports
        // its own failures in-band through a top-level "error" field.
        match serde_json::from_slice::<serde_json::Value>(&body) {
            Ok(value) => {
                if let Some(message) = value.get("error").and_then(|e| e.as_str()) {
                    if !message.is_empty() {
                        return CallOutcome::Failure(format!("worker reported error: {message}"));
                    }
                }
                CallOutcome::Success(body.to_vec())
            }
            Err(err) => CallOutcome::Failure(format!("invalid JSON from worker: {err}")),
        }
    }
}
