//! Job executor trait for implementing job handlers.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::JobQueueError;

/// Trait for implementing job executors.
///
/// Job executors handle the actual execution of jobs. Each job type should have
/// a corresponding executor implementation. Backends may call `execute` more
/// than once for the same job when an earlier attempt failed.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Returns the job type this executor handles.
    fn job_type(&self) -> &str;

    /// Execute the job with the given payload.
    async fn execute(&self, payload: Value) -> Result<(), JobQueueError>;
}

/// A no-op executor that immediately completes jobs.
#[derive(Debug, Default, Clone)]
pub struct NoOpExecutor {
    job_type: String,
}

impl NoOpExecutor {
    pub fn new(job_type: impl Into<String>) -> Self {
        Self {
            job_type: job_type.into(),
        }
    }
}

#[async_trait]
impl JobExecutor for NoOpExecutor {
    fn job_type(&self) -> &str {
        &self.job_type
    }

    async fn execute(&self, _payload: Value) -> Result<(), JobQueueError> {
        Ok(())
    }
}

/// What a backend does with a job after one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AttemptOutcome {
    Completed,
    /// Failed, but attempts remain. Carries the error message.
    Retry(String),
    /// Failed on the last allowed attempt.
    Failed(String),
}

impl AttemptOutcome {
    /// Classify the result of attempt number `attempt` (1-based).
    pub(crate) fn decide(
        result: Result<(), JobQueueError>,
        attempt: u32,
        max_attempts: u32,
    ) -> Self {
        match result {
            Ok(()) => Self::Completed,
            Err(err) if attempt >= max_attempts => Self::Failed(err.to_string()),
            Err(err) => Self::Retry(err.to_string()),
        }
    }
}

/// Run one attempt on its own task so a panicking executor counts as a
/// failed attempt instead of taking the worker down with it.
pub(crate) async fn run_attempt(
    executor: &Arc<dyn JobExecutor>,
    payload: Value,
) -> Result<(), JobQueueError> {
    let executor = Arc::clone(executor);
    match tokio::spawn(async move { executor.execute(payload).await }).await {
        Ok(result) => result,
        Err(err) if err.is_panic() => Err(JobQueueError::ExecutionFailed(
            "executor panicked".to_string(),
        )),
        Err(err) => Err(JobQueueError::ExecutionFailed(err.to_string())),
    }
}
