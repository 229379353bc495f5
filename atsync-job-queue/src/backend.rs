//! The contract every queue backend satisfies.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::JobQueueError;
use crate::executor::JobExecutor;
use crate::types::{Job, JobHandle, JobId};

/// Which concrete backend a [`QueueBackend`] trait object is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Fallback,
    Redis,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fallback => "fallback",
            Self::Redis => "redis",
        })
    }
}

/// Uniform interface over the in-process fallback queue and the Redis adapter.
#[async_trait]
pub trait QueueBackend: Send + Sync + fmt::Debug {
    fn kind(&self) -> BackendKind;

    /// Accept a job for asynchronous execution and return its handle.
    ///
    /// Returns as soon as the job is accepted, never waits for completion.
    async fn enqueue(&self, job_type: &str, payload: Value) -> Result<JobHandle, JobQueueError>;

    /// Point-in-time snapshot of the non-terminal jobs of `job_type`.
    ///
    /// Ordering is unspecified.
    async fn list_jobs(&self, job_type: &str) -> Result<Vec<Job>, JobQueueError>;

    /// Fetch a single job in any state, including terminal ones.
    async fn get_job(&self, job_type: &str, id: JobId) -> Result<Option<Job>, JobQueueError>;

    /// Bind the executor that runs jobs of `executor.job_type()`.
    async fn register_executor(&self, executor: Arc<dyn JobExecutor>);
}
