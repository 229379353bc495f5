//! Error types for the job queue system.

use thiserror::Error;

/// Errors that may occur while interacting with a queue backend.
#[derive(Debug, Error)]
pub enum JobQueueError {
    /// The backend cannot accept or report work: broker unreachable,
    /// connection lost, or the in-process queue is saturated.
    #[error("job queue backend is unavailable: {0}")]
    BackendUnavailable(String),

    #[error("invalid job data: {0}")]
    InvalidJob(String),

    #[error("job execution failed: {0}")]
    ExecutionFailed(String),
}

impl From<redis::RedisError> for JobQueueError {
    fn from(err: redis::RedisError) -> Self {
        Self::BackendUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for JobQueueError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidJob(err.to_string())
    }
}
