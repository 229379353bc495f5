//! Core types for the job queue system.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::JobQueueError;

/// Backend-assigned job identifier. Ids increase monotonically per backend.
pub type JobId = u64;

/// Status of a job, owned by the backend that holds it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Active,
    Completed,
    Failed,
}

impl JobStatus {
    /// Returns true if this status represents a terminal state.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = JobQueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(JobQueueError::InvalidJob(format!(
                "unknown job status: {other}"
            ))),
        }
    }
}

/// The caller-facing projection of a job: id and type name only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub id: JobId,
    pub name: String,
}

/// A unit of asynchronous work tracked by a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub payload: Value,
    pub status: JobStatus,
    pub attempts_made: u32,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub failed_reason: Option<String>,
}

impl Job {
    /// Create a new pending job.
    #[inline]
    pub fn new(id: JobId, name: impl Into<String>, payload: Value) -> Self {
        Self {
            id,
            name: name.into(),
            payload,
            status: JobStatus::Pending,
            attempts_made: 0,
            created_at: Utc::now(),
            finished_at: None,
            failed_reason: None,
        }
    }

    #[inline]
    pub fn handle(&self) -> JobHandle {
        JobHandle {
            id: self.id,
            name: self.name.clone(),
        }
    }

    /// Look up a top-level field of an object payload.
    #[inline]
    pub fn payload_field(&self, key: &str) -> Option<&Value> {
        self.payload.as_object().and_then(|map| map.get(key))
    }

    /// Mark the job as picked up by a worker for another attempt.
    #[inline]
    pub fn start_attempt(&mut self) {
        self.status = JobStatus::Active;
        self.attempts_made += 1;
    }

    /// Mark the job as completed.
    #[inline]
    pub fn complete(&mut self) {
        self.status = JobStatus::Completed;
        self.finished_at = Some(Utc::now());
        self.failed_reason = None;
    }

    /// Mark the job as failed with an error message.
    #[inline]
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.finished_at = Some(Utc::now());
        self.failed_reason = Some(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            JobStatus::Pending,
            JobStatus::Active,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("waiting".parse::<JobStatus>().is_err());
    }

    #[test]
    fn job_lifecycle() {
        let mut job = Job::new(7, "at-import", json!({ "syncId": "s1" }));
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.payload_field("syncId"), Some(&json!("s1")));

        job.start_attempt();
        assert_eq!(job.status, JobStatus::Active);
        assert_eq!(job.attempts_made, 1);
        assert!(!job.status.is_terminal());

        job.fail("boom");
        assert!(job.status.is_terminal());
        assert_eq!(job.failed_reason.as_deref(), Some("boom"));
        assert!(job.finished_at.is_some());

        assert_eq!(
            job.handle(),
            JobHandle {
                id: 7,
                name: "at-import".to_string()
            }
        );
    }

    #[test]
    fn payload_field_on_non_object_payload() {
        let job = Job::new(1, "at-import", json!([1, 2, 3]));
        assert!(job.payload_field("syncId").is_none());
    }
}
