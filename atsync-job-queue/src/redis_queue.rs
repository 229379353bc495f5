//! Redis-backed queue adapter.
//!
//! Key layout, per job type `t` under a configurable prefix `p`:
//!
//! - `p:t:id` counter handing out job ids
//! - `p:t:{id}` hash with `name`, `data`, `status`, `attempts`, `created_at`,
//!   `finished_at`, `failed_reason`
//! - `p:t:wait` list of ids waiting for a worker
//! - `p:t:active` list of ids a worker is holding
//! - `p:t:open` set of non-terminal ids
//! - `p:t:finished` list of terminal ids, newest first, capped at
//!   `retain_finished`

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::backend::{BackendKind, QueueBackend};
use crate::error::JobQueueError;
use crate::executor::{run_attempt, AttemptOutcome, JobExecutor};
use crate::types::{Job, JobHandle, JobId, JobStatus};

pub const DEFAULT_KEY_PREFIX: &str = "atsync";

const OUTCOME_WRITE_TRIES: u32 = 3;

/// Tuning for [`RedisQueue`].
#[derive(Debug, Clone)]
pub struct RedisOptions {
    pub key_prefix: String,
    pub max_attempts: u32,
    /// Finished job hashes kept per job type; older ones are deleted.
    pub retain_finished: usize,
    /// How long an idle worker waits before polling the wait list again.
    pub poll_interval: Duration,
}

impl Default for RedisOptions {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            max_attempts: crate::fallback::DEFAULT_MAX_ATTEMPTS,
            retain_finished: crate::fallback::DEFAULT_RETAIN_FINISHED,
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Queue adapter publishing jobs to a Redis broker.
///
/// Connection loss surfaces as [`JobQueueError::BackendUnavailable`]; the
/// adapter itself never retries a command; reconnection is left to the
/// [`ConnectionManager`].
#[derive(Clone)]
pub struct RedisQueue {
    conn: ConnectionManager,
    options: RedisOptions,
    executors: Arc<RwLock<HashMap<String, Arc<dyn JobExecutor>>>>,
}

impl fmt::Debug for RedisQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisQueue")
            .field("conn", &"<ConnectionManager>")
            .field("options", &self.options)
            .finish()
    }
}

impl RedisQueue {
    /// Open a managed connection to the broker at `url`.
    pub async fn connect(url: &str, options: RedisOptions) -> Result<Self, JobQueueError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!(key_prefix = %options.key_prefix, "connected to redis job broker");
        Ok(Self {
            conn,
            options,
            executors: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    fn key(&self, job_type: &str, suffix: &str) -> String {
        format!("{}:{}:{}", self.options.key_prefix, job_type, suffix)
    }

    fn job_key(&self, job_type: &str, id: JobId) -> String {
        self.key(job_type, &id.to_string())
    }

    async fn fetch_job(&self, job_type: &str, id: JobId) -> Result<Option<Job>, JobQueueError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(self.job_key(job_type, id))
            .query_async(&mut conn)
            .await?;
        if fields.is_empty() {
            return Ok(None);
        }
        job_from_fields(id, &fields).map(Some)
    }

    /// Put ids left in the active list by a dead worker back on the wait list.
    ///
    /// Runs once when the first worker for `job_type` starts in this process.
    /// A job another live process is still running gets a second attempt.
    async fn requeue_stalled(&self, job_type: &str) -> Result<usize, JobQueueError> {
        let wait = self.key(job_type, "wait");
        let active = self.key(job_type, "active");
        let mut conn = self.conn.clone();
        let mut moved = 0;

        loop {
            let next: Option<JobId> = redis::cmd("RPOPLPUSH")
                .arg(&active)
                .arg(&wait)
                .query_async(&mut conn)
                .await?;
            let Some(id) = next else {
                break;
            };
            redis::cmd("HSET")
                .arg(self.job_key(job_type, id))
                .arg("status")
                .arg(JobStatus::Pending.as_str())
                .query_async::<()>(&mut conn)
                .await?;
            moved += 1;
        }
        Ok(moved)
    }

    /// Pull jobs of `job_type` off the wait list until the process exits.
    async fn work(self, job_type: String) {
        let wait = self.key(&job_type, "wait");
        let active = self.key(&job_type, "active");

        match self.requeue_stalled(&job_type).await {
            Ok(0) => {}
            Ok(moved) => warn!(job_type = %job_type, moved, "requeued jobs stalled in active list"),
            Err(err) => warn!(job_type = %job_type, error = %err, "could not requeue stalled jobs"),
        }
        info!(job_type = %job_type, "redis worker started");

        loop {
            let mut conn = self.conn.clone();
            let next: Result<Option<JobId>, redis::RedisError> = redis::cmd("RPOPLPUSH")
                .arg(&wait)
                .arg(&active)
                .query_async(&mut conn)
                .await;
            match next {
                Ok(Some(id)) => {
                    if let Err(err) = self.process(&job_type, id).await {
                        warn!(job_type = %job_type, job_id = id, error = %err, "redis worker could not process job");
                    }
                }
                Ok(None) => tokio::time::sleep(self.options.poll_interval).await,
                Err(err) => {
                    warn!(job_type = %job_type, error = %err, "redis worker poll failed");
                    tokio::time::sleep(self.options.poll_interval).await;
                }
            }
        }
    }

    async fn process(&self, job_type: &str, id: JobId) -> Result<(), JobQueueError> {
        let job_key = self.job_key(job_type, id);
        let active = self.key(job_type, "active");
        let mut conn = self.conn.clone();

        let (attempts, data): (u32, Option<String>) = redis::pipe()
            .atomic()
            .cmd("HSET")
            .arg(&job_key)
            .arg("status")
            .arg(JobStatus::Active.as_str())
            .ignore()
            .cmd("HINCRBY")
            .arg(&job_key)
            .arg("attempts")
            .arg(1)
            .cmd("HGET")
            .arg(&job_key)
            .arg("data")
            .query_async(&mut conn)
            .await?;

        let payload: Value = match data {
            Some(raw) => serde_json::from_str(&raw)?,
            None => {
                redis::pipe()
                    .atomic()
                    .cmd("LREM")
                    .arg(&active)
                    .arg(0)
                    .arg(id)
                    .ignore()
                    .cmd("SREM")
                    .arg(self.key(job_type, "open"))
                    .arg(id)
                    .ignore()
                    .query_async::<()>(&mut conn)
                    .await?;
                return Err(JobQueueError::InvalidJob(format!("job {id} has no data")));
            }
        };

        let executor = self.executors.read().await.get(job_type).cloned();
        let Some(executor) = executor else {
            // Put it back for whichever worker owns an executor.
            redis::pipe()
                .atomic()
                .cmd("HSET")
                .arg(&job_key)
                .arg("status")
                .arg(JobStatus::Pending.as_str())
                .ignore()
                .cmd("LREM")
                .arg(&active)
                .arg(0)
                .arg(id)
                .ignore()
                .cmd("RPUSH")
                .arg(self.key(job_type, "wait"))
                .arg(id)
                .ignore()
                .query_async::<()>(&mut conn)
                .await?;
            return Ok(());
        };

        debug!(job_type, job_id = id, attempt = attempts, "running job");
        let result = run_attempt(&executor, payload).await;
        let outcome = AttemptOutcome::decide(result, attempts, self.options.max_attempts);
        match &outcome {
            AttemptOutcome::Completed => {
                info!(job_type, job_id = id, attempt = attempts, "job completed")
            }
            AttemptOutcome::Failed(reason) => {
                warn!(job_type, job_id = id, attempt = attempts, error = %reason, "job failed, no attempts left")
            }
            AttemptOutcome::Retry(reason) => {
                warn!(job_type, job_id = id, attempt = attempts, error = %reason, "job attempt failed, requeueing")
            }
        }

        let pipe = self.outcome_pipeline(job_type, id, &outcome, &Utc::now().to_rfc3339());
        let mut tries = 0;
        loop {
            tries += 1;
            match pipe.query_async::<()>(&mut conn).await {
                Ok(()) => break,
                Err(err) if tries < OUTCOME_WRITE_TRIES => {
                    warn!(job_type, job_id = id, error = %err, "recording job outcome failed, retrying");
                    tokio::time::sleep(self.options.poll_interval).await;
                }
                Err(err) => return Err(err.into()),
            }
        }

        if !matches!(outcome, AttemptOutcome::Retry(_)) {
            self.trim_finished(job_type).await?;
        }
        Ok(())
    }

    /// Atomic write that moves a job out of the active list according to
    /// `outcome`.
    fn outcome_pipeline(
        &self,
        job_type: &str,
        id: JobId,
        outcome: &AttemptOutcome,
        now: &str,
    ) -> redis::Pipeline {
        let job_key = self.job_key(job_type, id);
        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("LREM")
            .arg(self.key(job_type, "active"))
            .arg(0)
            .arg(id)
            .ignore();

        match outcome {
            AttemptOutcome::Completed => {
                pipe.cmd("HSET")
                    .arg(&job_key)
                    .arg("status")
                    .arg(JobStatus::Completed.as_str())
                    .arg("finished_at")
                    .arg(now)
                    .ignore()
                    .cmd("HDEL")
                    .arg(&job_key)
                    .arg("failed_reason")
                    .ignore();
            }
            AttemptOutcome::Failed(reason) => {
                pipe.cmd("HSET")
                    .arg(&job_key)
                    .arg("status")
                    .arg(JobStatus::Failed.as_str())
                    .arg("finished_at")
                    .arg(now)
                    .arg("failed_reason")
                    .arg(reason)
                    .ignore();
            }
            AttemptOutcome::Retry(reason) => {
                pipe.cmd("HSET")
                    .arg(&job_key)
                    .arg("status")
                    .arg(JobStatus::Pending.as_str())
                    .arg("failed_reason")
                    .arg(reason)
                    .ignore()
                    .cmd("LPUSH")
                    .arg(self.key(job_type, "wait"))
                    .arg(id)
                    .ignore();
                return pipe;
            }
        }

        pipe.cmd("SREM")
            .arg(self.key(job_type, "open"))
            .arg(id)
            .ignore()
            .cmd("LPUSH")
            .arg(self.key(job_type, "finished"))
            .arg(id)
            .ignore();
        pipe
    }

    /// Delete the oldest finished job hashes beyond `retain_finished`.
    async fn trim_finished(&self, job_type: &str) -> Result<(), JobQueueError> {
        let finished = self.key(job_type, "finished");
        let mut conn = self.conn.clone();

        let len: usize = redis::cmd("LLEN")
            .arg(&finished)
            .query_async(&mut conn)
            .await?;
        if len <= self.options.retain_finished {
            return Ok(());
        }

        let evicted: Option<Vec<JobId>> = redis::cmd("RPOP")
            .arg(&finished)
            .arg(len - self.options.retain_finished)
            .query_async(&mut conn)
            .await?;
        let evicted = evicted.unwrap_or_default();
        if evicted.is_empty() {
            return Ok(());
        }

        let mut del = redis::cmd("DEL");
        for id in &evicted {
            del.arg(self.job_key(job_type, *id));
        }
        del.query_async::<()>(&mut conn).await?;
        debug!(job_type, count = evicted.len(), "evicted finished jobs");
        Ok(())
    }

    /// Drop ids from the open set whose hash is gone or unreadable.
    async fn forget_open(&self, job_type: &str, ids: &[JobId]) -> Result<(), JobQueueError> {
        let mut conn = self.conn.clone();
        let mut srem = redis::cmd("SREM");
        srem.arg(self.key(job_type, "open"));
        for id in ids {
            srem.arg(*id);
        }
        srem.query_async::<()>(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl QueueBackend for RedisQueue {
    fn kind(&self) -> BackendKind {
        BackendKind::Redis
    }

    async fn enqueue(&self, job_type: &str, payload: Value) -> Result<JobHandle, JobQueueError> {
        let data = serde_json::to_string(&payload)?;
        let mut conn = self.conn.clone();

        let id: JobId = redis::cmd("INCR")
            .arg(self.key(job_type, "id"))
            .query_async(&mut conn)
            .await?;

        redis::pipe()
            .atomic()
            .cmd("HSET")
            .arg(self.job_key(job_type, id))
            .arg("name")
            .arg(job_type)
            .arg("data")
            .arg(&data)
            .arg("status")
            .arg(JobStatus::Pending.as_str())
            .arg("attempts")
            .arg(0)
            .arg("created_at")
            .arg(Utc::now().to_rfc3339())
            .ignore()
            .cmd("SADD")
            .arg(self.key(job_type, "open"))
            .arg(id)
            .ignore()
            .cmd("LPUSH")
            .arg(self.key(job_type, "wait"))
            .arg(id)
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;

        debug!(job_id = id, job_type, "job published to redis");
        Ok(JobHandle {
            id,
            name: job_type.to_string(),
        })
    }

    async fn list_jobs(&self, job_type: &str) -> Result<Vec<Job>, JobQueueError> {
        let mut conn = self.conn.clone();
        let ids: Vec<JobId> = redis::cmd("SMEMBERS")
            .arg(self.key(job_type, "open"))
            .query_async(&mut conn)
            .await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for id in &ids {
            pipe.cmd("HGETALL").arg(self.job_key(job_type, *id));
        }
        let rows: Vec<HashMap<String, String>> = pipe.query_async(&mut conn).await?;

        let mut jobs = Vec::with_capacity(ids.len());
        let mut stale = Vec::new();
        for (id, fields) in ids.into_iter().zip(rows) {
            if fields.is_empty() {
                stale.push(id);
                continue;
            }
            match job_from_fields(id, &fields) {
                Ok(job) if !job.status.is_terminal() => jobs.push(job),
                Ok(_) => stale.push(id),
                Err(err) => {
                    warn!(job_type, job_id = id, error = %err, "dropping unreadable job from open set");
                    stale.push(id);
                }
            }
        }
        if !stale.is_empty() {
            self.forget_open(job_type, &stale).await?;
        }
        Ok(jobs)
    }

    async fn get_job(&self, job_type: &str, id: JobId) -> Result<Option<Job>, JobQueueError> {
        self.fetch_job(job_type, id).await
    }

    async fn register_executor(&self, executor: Arc<dyn JobExecutor>) {
        let job_type = executor.job_type().to_owned();
        let previous = self
            .executors
            .write()
            .await
            .insert(job_type.clone(), executor);
        if previous.is_none() {
            tokio::spawn(self.clone().work(job_type));
        }
    }
}

/// Rebuild a [`Job`] from the fields of its Redis hash.
fn job_from_fields(id: JobId, fields: &HashMap<String, String>) -> Result<Job, JobQueueError> {
    let field = |name: &str| {
        fields
            .get(name)
            .ok_or_else(|| JobQueueError::InvalidJob(format!("job {id} is missing `{name}`")))
    };
    let timestamp = |raw: &str| {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| JobQueueError::InvalidJob(format!("job {id} has a bad timestamp: {e}")))
    };

    let attempts_made = match fields.get("attempts") {
        Some(raw) => raw
            .parse()
            .map_err(|e| JobQueueError::InvalidJob(format!("job {id} has bad attempts: {e}")))?,
        None => 0,
    };

    Ok(Job {
        id,
        name: field("name")?.clone(),
        payload: serde_json::from_str(field("data")?)?,
        status: field("status")?.parse()?,
        attempts_made,
        created_at: timestamp(field("created_at")?.as_str())?,
        finished_at: fields
            .get("finished_at")
            .map(|raw| timestamp(raw.as_str()))
            .transpose()?,
        failed_reason: fields.get("failed_reason").cloned(),
    })
}
