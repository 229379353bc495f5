//! Airtable import job.

use atsync_job_queue::{async_trait, JobExecutor, JobQueueError};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::JobError;
use crate::job_types;

/// Fields of an `at-import` payload that the executor looks at.
///
/// Everything else the caller sent (sync-source details, import options)
/// lands in `options` untouched.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtImportPayload {
    pub sync_id: Option<String>,
    pub project_id: Option<String>,
    pub base_id: Option<String>,
    /// Always empty for sync-triggered jobs; the worker acquires its own credential.
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(rename = "baseURL")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub user: Option<Value>,
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl AtImportPayload {
    /// Parse and check a raw job payload.
    pub fn parse(payload: Value) -> Result<Self, JobError> {
        if !payload.is_object() {
            return Err(JobError::InvalidPayload(
                "import payload must be a JSON object".into(),
            ));
        }
        let parsed: Self =
            serde_json::from_value(payload).map_err(|e| JobError::InvalidPayload(e.to_string()))?;

        if let Some(base_url) = parsed.base_url.as_deref() {
            url::Url::parse(base_url).map_err(|e| {
                JobError::InvalidPayload(format!("baseURL `{base_url}` is not a valid URL: {e}"))
            })?;
        }
        Ok(parsed)
    }

    /// True when the job came from a sync trigger rather than a direct import.
    #[inline]
    pub fn is_sync(&self) -> bool {
        self.sync_id.is_some()
    }
}

/// Executor for `at-import` jobs.
///
/// Placeholder: it only validates the payload and logs it, then reports the
/// job completed. No data is transferred, and on the Redis backend the job
/// is consumed here, so no other worker sees it.
#[derive(Debug, Default)]
pub struct AtImportExecutor {}

impl AtImportExecutor {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobExecutor for AtImportExecutor {
    fn job_type(&self) -> &str {
        job_types::AT_IMPORT
    }

    async fn execute(&self, payload: Value) -> Result<(), JobQueueError> {
        let parsed = AtImportPayload::parse(payload)
            .map_err(|e| JobQueueError::ExecutionFailed(e.to_string()))?;

        info!(
            sync_id = ?parsed.sync_id,
            project_id = ?parsed.project_id,
            base_id = ?parsed.base_id,
            base_url = ?parsed.base_url,
            option_keys = parsed.options.len(),
            "executing at-import job"
        );

        if parsed.is_sync() && parsed.user.as_ref().map_or(true, Value::is_null) {
            warn!(sync_id = ?parsed.sync_id, "sync import has no owning user attached");
        }

        info!("at-import job validated; no transfer performed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_at_import_executor_sync_payload() {
        let executor = AtImportExecutor::new();
        assert_eq!(executor.job_type(), "at-import");

        let payload = json!({
            "syncId": "sync_1",
            "projectId": "p_1",
            "baseId": "b_1",
            "authToken": "",
            "baseURL": "http://localhost:8080",
            "user": { "id": "u_1" },
            "apiKey": "key",
            "shareId": "shr123"
        });

        let result = executor.execute(payload).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_at_import_executor_direct_payload() {
        let executor = AtImportExecutor::new();
        let result = executor.execute(json!({ "key": "abc" })).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_at_import_executor_rejects_non_object() {
        let executor = AtImportExecutor::new();
        let err = executor.execute(json!("abc")).await.unwrap_err();
        assert!(matches!(err, JobQueueError::ExecutionFailed(_)));
    }

    #[test]
    fn parse_keeps_extra_fields_as_options() {
        let parsed = AtImportPayload::parse(json!({
            "syncId": "s",
            "shareId": "shr1",
            "options": { "syncViews": true }
        }))
        .unwrap();
        assert!(parsed.is_sync());
        assert_eq!(parsed.options.get("shareId"), Some(&json!("shr1")));
        assert!(parsed.options.contains_key("options"));
        assert!(!parsed.options.contains_key("syncId"));
    }

    #[test]
    fn parse_rejects_bad_base_url() {
        let err = AtImportPayload::parse(json!({ "baseURL": "not a url" })).unwrap_err();
        assert!(err.to_string().contains("baseURL"));
    }

    #[test]
    fn parse_rejects_non_string_sync_id() {
        assert!(AtImportPayload::parse(json!({ "syncId": 5 })).is_err());
    }
}
