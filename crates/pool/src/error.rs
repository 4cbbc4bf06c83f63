use thiserror::Error;

pub type Result<T> = std::result::Result<T, PoolError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Worker pool is closed")]
    Closed,

    #[error("Worker {slot} failed: {reason}")]
    WorkerFailed { slot: usize, reason: String },

    #[error("Worker pool unavailable: {0}")]
    Unavailable(String),

    #[error("Task failed: {0}")]
    Task(String),
}
