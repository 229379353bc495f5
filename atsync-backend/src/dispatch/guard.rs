//! Rejects a sync trigger while an import for the same sync is in flight.

use std::sync::Arc;

use atsync_job_queue::QueueBackend;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use super::DispatchError;

/// Payload field carrying the sync identifier.
pub const SYNC_ID_FIELD: &str = "syncId";

/// Per-sync lock plus in-flight job check.
///
/// Holding the [`SyncPermit`] across the check and the enqueue makes the pair
/// atomic for triggers handled by this process. Triggers arriving through
/// another process sharing the same Redis broker are still only checked
/// against the job snapshot.
#[derive(Debug, Default)]
pub struct SyncTriggerGuard {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

/// Exclusive right to trigger one sync. Released on drop.
pub struct SyncPermit {
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    sync_id: String,
}

impl Drop for SyncPermit {
    fn drop(&mut self) {
        self.guard.take();
        // Forget the lock once nobody else is holding or waiting on it.
        self.locks
            .remove_if(&self.sync_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl SyncTriggerGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `sync_id`.
    pub async fn acquire(&self, sync_id: &str) -> SyncPermit {
        let lock = self
            .locks
            .entry(sync_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        SyncPermit {
            guard: Some(guard),
            locks: Arc::clone(&self.locks),
            sync_id: sync_id.to_string(),
        }
    }

    /// Fail with [`DispatchError::Conflict`] if a non-terminal job of
    /// `job_type` already targets `sync_id`.
    pub async fn ensure_idle(
        &self,
        backend: &dyn QueueBackend,
        job_type: &str,
        sync_id: &str,
    ) -> Result<(), DispatchError> {
        let jobs = backend.list_jobs(job_type).await?;
        let running = jobs.iter().find(|job| {
            job.payload_field(SYNC_ID_FIELD)
                .and_then(|v| v.as_str())
                .is_some_and(|id| id == sync_id)
        });

        match running {
            Some(job) => {
                debug!(sync_id, job_id = job.id, status = %job.status, "sync already has a job in flight");
                Err(DispatchError::Conflict {
                    sync_id: sync_id.to_string(),
                })
            }
            None => Ok(()),
        }
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.len()
    }
}
