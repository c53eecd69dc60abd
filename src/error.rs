use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("no healthy workers available")]
    NoWorkersAvailable,

    #[error("job queue is at capacity")]
    Overloaded,

    #[error("job cancelled before completion")]
    Cancelled,

    #[error("dispatcher is shutting down")]
    QueueClosed,

    #[error("worker {url} failed: {reason}")]
    WorkerFailure { url: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
