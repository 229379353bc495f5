//! Building import jobs from requests and submitting them to the queue.

mod base_url;
mod guard;

pub use base_url::{BaseUrlPolicy, DEFAULT_CALLBACK_PORT};
pub use guard::{SyncPermit, SyncTriggerGuard, SYNC_ID_FIELD};

use std::fmt;
use std::sync::Arc;

use atsync_job_queue::{JobHandle, JobQueueError, QueueBackend};
use atsync_jobs::job_types;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::sync_source::{StoreError, SyncSource, SyncSourceStore};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Sync already in progress")]
    Conflict { sync_id: String },
    #[error("sync source {sync_id} not found")]
    NotFound { sync_id: String },
    #[error(transparent)]
    Queue(#[from] JobQueueError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Submits import jobs through the backend chosen at startup.
pub struct JobDispatcher {
    backend: Arc<dyn QueueBackend>,
    sources: Arc<dyn SyncSourceStore>,
    guard: SyncTriggerGuard,
    base_url: BaseUrlPolicy,
}

impl fmt::Debug for JobDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobDispatcher")
            .field("backend", &self.backend)
            .field("sources", &"<dyn SyncSourceStore>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl JobDispatcher {
    pub fn new(
        backend: Arc<dyn QueueBackend>,
        sources: Arc<dyn SyncSourceStore>,
        base_url: BaseUrlPolicy,
    ) -> Self {
        Self {
            backend,
            sources,
            guard: SyncTriggerGuard::new(),
            base_url,
        }
    }

    pub fn backend(&self) -> &Arc<dyn QueueBackend> {
        &self.backend
    }

    /// Enqueue an import with the request body as payload, unchecked.
    pub async fn dispatch_import(&self, body: Value) -> Result<JobHandle, DispatchError> {
        let handle = self.backend.enqueue(job_types::AT_IMPORT, body).await?;
        info!(job_id = handle.id, job_type = %handle.name, "import job enqueued");
        Ok(handle)
    }

    /// Enqueue an import for a stored sync source, unless one is in flight.
    ///
    /// `site_url` is the URL the triggering request arrived on; it becomes the
    /// job's `baseURL` unless the policy forces a loopback address.
    pub async fn trigger_sync(
        &self,
        sync_id: &str,
        site_url: &str,
    ) -> Result<JobHandle, DispatchError> {
        let _permit = self.guard.acquire(sync_id).await;
        self.guard
            .ensure_idle(self.backend.as_ref(), job_types::AT_IMPORT, sync_id)
            .await?;

        let source = self
            .sources
            .get(sync_id)
            .await?
            .ok_or_else(|| DispatchError::NotFound {
                sync_id: sync_id.to_string(),
            })?;
        let user = self.sources.user_for(&source).await?;

        let payload = sync_payload(&source, user, self.base_url.resolve(site_url));
        let handle = self.backend.enqueue(job_types::AT_IMPORT, payload).await?;
        info!(sync_id, job_id = handle.id, backend = %self.backend.kind(), "sync import enqueued");
        Ok(handle)
    }

    /// Acknowledge an abort request. Running imports are not cancelled.
    pub async fn abort_sync(&self, sync_id: &str) {
        debug!(sync_id, "abort requested; cancellation is not supported");
    }
}

/// Build the payload of a sync-triggered import.
///
/// Source details go in first so the fixed keys always win. `authToken` is
/// deliberately empty: the worker obtains its own credential.
pub fn sync_payload(source: &SyncSource, user: Option<Value>, base_url: String) -> Value {
    let mut payload: Map<String, Value> = source.details.clone();
    payload.insert(SYNC_ID_FIELD.into(), Value::String(source.id.clone()));
    payload.insert("projectId".into(), Value::String(source.project_id.clone()));
    payload.insert("baseId".into(), Value::String(source.base_id.clone()));
    payload.insert("authToken".into(), Value::String(String::new()));
    payload.insert("baseURL".into(), Value::String(base_url));
    payload.insert("user".into(), user.unwrap_or(Value::Null));
    Value::Object(payload)
}
