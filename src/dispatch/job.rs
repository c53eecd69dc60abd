use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::DispatchError;

/// A single unit of dispatchable work.
///
/// The endpoint is opaque to the dispatcher; it names what the remote
/// worker should do. The body travels verbatim. A job emits exactly one
/// outcome, on exactly one of its two channels; the consuming signatures
/// of [`Job::succeed`] and [`Job::fail`] enforce that.
#[derive(Debug)]
pub struct Job {
    pub id: Uuid,
    pub endpoint: String,
    pub body: serde_json::Value,
    pub retry_count: u32,
    pub max_retries: u32,
    /// Deadline/cancellation handle. Honored at enqueue and by the
    /// outbound call.
    pub cancel: CancellationToken,
    reply_tx: oneshot::Sender<Vec<u8>>,
    error_tx: oneshot::Sender<DispatchError>,
}

impl Job {
    pub fn new(
        endpoint: impl Into<String>,
        body: serde_json::Value,
        max_retries: u32,
    ) -> (Self, JobHandle) {
        let (reply_tx, reply_rx) = oneshot::channel();
        let (error_tx, error_rx) = oneshot::channel();

        let job = Self {
            id: Uuid::new_v4(),
            endpoint: endpoint.into(),
            body,
            retry_count: 0,
            max_retries,
            cancel: CancellationToken::new(),
            reply_tx,
            error_tx,
        };

        (job, JobHandle { reply_rx, error_rx })
    }

    /// Arm a deadline: the job's token fires after `timeout` unless the
    /// job finished first (a late cancel on a finished job is a no-op).
    pub fn cancel_after(&self, timeout: std::time::Duration) {
        let token = self.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            token.cancel();
        });
    }

    pub fn retries_left(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Deliver the reply blob. Terminal.
    pub(crate) fn succeed(self, reply: Vec<u8>) {
        let _ = self.reply_tx.send(reply);
    }

    /// Deliver a terminal failure.
    pub(crate) fn fail(self, error: DispatchError) {
        let _ = self.error_tx.send(error);
    }
}

/// Producer-side handle to a submitted job.
#[derive(Debug)]
pub struct JobHandle {
    reply_rx: oneshot::Receiver<Vec<u8>>,
    error_rx: oneshot::Receiver<DispatchError>,
}

impl JobHandle {
    /// Wait for the job's single outcome.
    ///
    /// If the job is dropped without emitting (dispatcher torn down while
    /// the job sat in the queue), this resolves to `QueueClosed`.
    pub async fn outcome(mut self) -> Result<Vec<u8>, DispatchError> {
        tokio::select! {
            reply = &mut self.reply_rx => match reply {
                Ok(bytes) => Ok(bytes),
                // Reply sender dropped; the error channel carries the outcome.
                Err(_) => match self.error_rx.await {
                    Ok(err) => Err(err),
                    Err(_) => Err(DispatchError::QueueClosed),
                },
            },
            error = &mut self.error_rx => match error {
                Ok(err) => Err(err),
                Err(_) => match self.reply_rx.await {
                    Ok(bytes) => Ok(bytes),
                    Err(_) => Err(DispatchError::QueueClosed),
                },
            },
        }
    }
}
