//! In-process queue used when no external broker is configured.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::backend::{BackendKind, QueueBackend};
use crate::error::JobQueueError;
use crate::executor::{run_attempt, AttemptOutcome, JobExecutor};
use crate::types::{Job, JobHandle, JobId, JobStatus};

/// Default cap on jobs that are pending or active at the same time.
pub const DEFAULT_MAX_PENDING: usize = 1000;
/// Default number of attempts before a job is marked failed.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default number of finished jobs kept for inspection.
pub const DEFAULT_RETAIN_FINISHED: usize = 1000;

/// Tuning for [`FallbackQueue`].
#[derive(Debug, Clone)]
pub struct FallbackOptions {
    pub max_pending: usize,
    pub max_attempts: u32,
    pub retain_finished: usize,
    /// Delay before retry `n` is `retry_backoff * n`.
    pub retry_backoff: Duration,
}

impl Default for FallbackOptions {
    fn default() -> Self {
        Self {
            max_pending: DEFAULT_MAX_PENDING,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retain_finished: DEFAULT_RETAIN_FINISHED,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// Internal storage optimized for both iteration and lookup by ID.
#[derive(Debug, Default)]
struct FallbackState {
    /// Job IDs in insertion order (oldest first).
    order: VecDeque<JobId>,
    jobs: HashMap<JobId, Job>,
}

impl FallbackState {
    fn insert(&mut self, job: Job) {
        self.order.push_back(job.id);
        self.jobs.insert(job.id, job);
    }

    /// Number of jobs that are still pending or active.
    fn open_count(&self) -> usize {
        self.jobs
            .values()
            .filter(|job| !job.status.is_terminal())
            .count()
    }

    /// Drop the oldest finished jobs until at most `retain` remain.
    fn evict_finished(&mut self, retain: usize) {
        let finished = self.jobs.len() - self.open_count();
        if finished <= retain {
            return;
        }
        let mut excess = finished - retain;
        let jobs = &mut self.jobs;
        self.order.retain(|id| {
            if excess == 0 {
                return true;
            }
            match jobs.get(id) {
                Some(job) if job.status.is_terminal() => {
                    jobs.remove(id);
                    excess -= 1;
                    false
                }
                _ => true,
            }
        });
    }
}

/// In-memory queue that runs registered executors on the tokio runtime.
///
/// Failed attempts are retried up to `max_attempts`; the job stays visible to
/// [`QueueBackend::list_jobs`] while retrying and to [`QueueBackend::get_job`]
/// after it fails for good. Nothing survives a process restart.
#[derive(Clone)]
pub struct FallbackQueue {
    state: Arc<RwLock<FallbackState>>,
    executors: Arc<RwLock<HashMap<String, Arc<dyn JobExecutor>>>>,
    last_id: Arc<AtomicU64>,
    options: FallbackOptions,
}

impl fmt::Debug for FallbackQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackQueue")
            .field("state", &"<RwLock<FallbackState>>")
            .field(
                "executors",
                &"<RwLock<HashMap<String, Arc<dyn JobExecutor>>>>",
            )
            .field("options", &self.options)
            .finish()
    }
}

impl Default for FallbackQueue {
    fn default() -> Self {
        Self::new(FallbackOptions::default())
    }
}

impl FallbackQueue {
    pub fn new(options: FallbackOptions) -> Self {
        Self {
            state: Arc::new(RwLock::new(FallbackState::default())),
            executors: Arc::new(RwLock::new(HashMap::new())),
            last_id: Arc::new(AtomicU64::new(0)),
            options,
        }
    }

    fn spawn_run(&self, id: JobId, executor: Arc<dyn JobExecutor>) {
        let queue = self.clone();
        tokio::spawn(async move { queue.run_job(id, executor).await });
    }

    /// Move a pending job to active and hand back its payload.
    ///
    /// Returns `None` when the job is gone or another task already claimed it.
    async fn claim(&self, id: JobId) -> Option<Value> {
        let mut state = self.state.write().await;
        let job = state.jobs.get_mut(&id)?;
        if job.status != JobStatus::Pending {
            return None;
        }
        job.start_attempt();
        Some(job.payload.clone())
    }

    async fn run_job(&self, id: JobId, executor: Arc<dyn JobExecutor>) {
        let Some(payload) = self.claim(id).await else {
            return;
        };
        let job_type = executor.job_type().to_owned();
        let mut attempt: u32 = 1;

        loop {
            debug!(job_id = id, job_type = %job_type, attempt, "running job");
            let result = run_attempt(&executor, payload.clone()).await;
            match AttemptOutcome::decide(result, attempt, self.options.max_attempts) {
                AttemptOutcome::Completed => {
                    self.finish(id, |job| job.complete()).await;
                    info!(job_id = id, job_type = %job_type, attempt, "job completed");
                    return;
                }
                AttemptOutcome::Failed(reason) => {
                    warn!(job_id = id, job_type = %job_type, attempt, error = %reason, "job failed, no attempts left");
                    self.finish(id, move |job| job.fail(reason)).await;
                    return;
                }
                AttemptOutcome::Retry(reason) => {
                    warn!(job_id = id, job_type = %job_type, attempt, error = %reason, "job attempt failed, retrying");
                    {
                        let mut state = self.state.write().await;
                        if let Some(job) = state.jobs.get_mut(&id) {
                            job.failed_reason = Some(reason);
                        }
                    }
                    tokio::time::sleep(self.options.retry_backoff * attempt).await;
                    attempt += 1;
                    let mut state = self.state.write().await;
                    match state.jobs.get_mut(&id) {
                        Some(job) => job.start_attempt(),
                        None => return,
                    }
                }
            }
        }
    }

    async fn finish(&self, id: JobId, mark: impl FnOnce(&mut Job)) {
        let mut state = self.state.write().await;
        if let Some(job) = state.jobs.get_mut(&id) {
            mark(job);
        }
        state.evict_finished(self.options.retain_finished);
    }
}

#[async_trait]
impl QueueBackend for FallbackQueue {
    fn kind(&self) -> BackendKind {
        BackendKind::Fallback
    }

    async fn enqueue(&self, job_type: &str, payload: Value) -> Result<JobHandle, JobQueueError> {
        let handle = {
            let mut state = self.state.write().await;
            let open = state.open_count();
            if open >= self.options.max_pending {
                return Err(JobQueueError::BackendUnavailable(format!(
                    "fallback queue is saturated ({open} jobs in flight)"
                )));
            }
            let id = self.last_id.fetch_add(1, Ordering::Relaxed) + 1;
            let job = Job::new(id, job_type, payload);
            let handle = job.handle();
            state.insert(job);
            handle
        };
        debug!(job_id = handle.id, job_type, "job enqueued on fallback queue");

        let executor = self.executors.read().await.get(job_type).cloned();
        match executor {
            Some(executor) => self.spawn_run(handle.id, executor),
            None => debug!(job_type, "no executor registered yet, job stays pending"),
        }

        Ok(handle)
    }

    async fn list_jobs(&self, job_type: &str) -> Result<Vec<Job>, JobQueueError> {
        let state = self.state.read().await;
        Ok(state
            .jobs
            .values()
            .filter(|job| job.name == job_type && !job.status.is_terminal())
            .cloned()
            .collect())
    }

    async fn get_job(&self, job_type: &str, id: JobId) -> Result<Option<Job>, JobQueueError> {
        let state = self.state.read().await;
        Ok(state.jobs.get(&id).filter(|job| job.name == job_type).cloned())
    }

    async fn register_executor(&self, executor: Arc<dyn JobExecutor>) {
        let job_type = executor.job_type().to_owned();
        self.executors
            .write()
            .await
            .insert(job_type.clone(), Arc::clone(&executor));

        let waiting: Vec<JobId> = {
            let state = self.state.read().await;
            state
                .order
                .iter()
                .filter_map(|id| state.jobs.get(id))
                .filter(|job| job.name == job_type && job.status == JobStatus::Pending)
                .map(|job| job.id)
                .collect()
        };
        if !waiting.is_empty() {
            info!(job_type = %job_type, count = waiting.len(), "starting jobs queued before executor registration");
        }
        for id in waiting {
            self.spawn_run(id, Arc::clone(&executor));
        }
    }
}
