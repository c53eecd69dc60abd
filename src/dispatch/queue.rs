use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::dispatch::job::Job;
use crate::error::DispatchError;

/// Build the bounded FIFO job queue.
///
/// Returns the producer half (cloneable, used by submitters and by
/// executors re-enqueueing retries) and the consumer half (shared by the
/// executor pool).
pub fn bounded(capacity: usize) -> (JobQueue, JobIntake) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        JobQueue { tx },
        JobIntake {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Producer half of the job queue.
#[derive(Debug, Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<Job>,
}

impl JobQueue {
    /// Enqueue, waiting for capacity if the queue is full.
    ///
    /// The wait is bounded by the job's own deadline: if its token fires
    /// first, the job is handed back with `Cancelled`. The job is also
    /// handed back (with `QueueClosed`) if the dispatcher has shut down.
    /// Returning the job on failure lets an executor that failed to
    /// re-enqueue a retry still emit on the job's error channel.
    pub async fn enqueue(&self, job: Job) -> Result<(), (Job, DispatchError)> {
        if job.cancel.is_cancelled() {
            return Err((job, DispatchError::Cancelled));
        }

        let cancel = job.cancel.clone();
        tokio::select! {
            permit = self.tx.reserve() => match permit {
                Ok(permit) => {
                    permit.send(job);
                    Ok(())
                }
                Err(_) => Err((job, DispatchError::QueueClosed)),
            },
            _ = cancel.cancelled() => Err((job, DispatchError::Cancelled)),
        }
    }

    /// Non-blocking enqueue: a full queue is an immediate `Overloaded`.
    pub fn try_enqueue(&self, job: Job) -> Result<(), (Job, DispatchError)> {
        self.tx.try_send(job).map_err(|err| match err {
            mpsc::error::TrySendError::Full(job) => (job, DispatchError::Overloaded),
            mpsc::error::TrySendError::Closed(job) => (job, DispatchError::QueueClosed),
        })
    }

    /// Number of jobs currently waiting in the queue.
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

/// Consumer half of the job queue, shared by all executors.
#[derive(Debug, Clone)]
pub struct JobIntake {
    rx: Arc<Mutex<mpsc::Receiver<Job>>>,
}

impl JobIntake {
    /// Receive the next job, or `None` on shutdown / closed queue.
    pub async fn next(&self, shutdown: &CancellationToken) -> Option<Job> {
        let mut rx = self.rx.lock().await;
        tokio::select! {
            job = rx.recv() => job,
            _ = shutdown.cancelled() => None,
        }
    }
}
