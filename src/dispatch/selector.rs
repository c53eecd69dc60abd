use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::{DispatchError, Result};
use crate::registry::WorkerRegistry;

/// Picks a healthy, idle worker for a job.
///
/// Plain round-robin: each attempt scans the registry's insertion order
/// from a rotating cursor, so load spreads without any load-awareness that
/// would pollute the per-worker latency mean. When nothing is free the
/// selector backs off briefly and retries, up to a bounded number of
/// attempts.
pub struct Selector {
    registry: Arc<RwLock<WorkerRegistry>>,
    cursor: AtomicUsize,
    backoff: Duration,
    max_tries: u32,
}

impl Selector {
    pub fn new(registry: Arc<RwLock<WorkerRegistry>>, backoff: Duration, max_tries: u32) -> Self {
        Self {
            registry,
            cursor: AtomicUsize::new(0),
            backoff,
            max_tries,
        }
    }

    /// Claim a worker, marking it busy under the registry lock.
    ///
    /// Resolves to `NoWorkersAvailable` once the attempt budget is spent,
    /// or `Cancelled` if the job's deadline fires mid-backoff.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<String> {
        for attempt in 0..self.max_tries {
            if cancel.is_cancelled() {
                return Err(DispatchError::Cancelled);
            }

            let start = self.cursor.fetch_add(1, Ordering::Relaxed);
            if let Some(url) = self.registry.write().await.try_acquire(start) {
                if attempt > 0 {
                    tracing::trace!(worker = %url, attempt, "Worker acquired after backoff");
                }
                return Ok(url);
            }

            tokio::select! {
                _ = tokio::time::sleep(self.backoff) => {}
                _ = cancel.cancelled() => return Err(DispatchError::Cancelled),
            }
        }

        Err(DispatchError::NoWorkersAvailable)
    }
}
