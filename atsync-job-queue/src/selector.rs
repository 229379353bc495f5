//! One-time choice between the fallback queue and the Redis adapter.

use std::sync::Arc;

use tracing::info;

use crate::backend::QueueBackend;
use crate::error::JobQueueError;
use crate::fallback::{FallbackOptions, FallbackQueue};
use crate::redis_queue::{RedisOptions, RedisQueue};

/// Everything needed to build a backend at startup.
#[derive(Debug, Clone, Default)]
pub struct QueueSettings {
    /// Broker address; its presence alone selects the Redis adapter.
    pub redis_url: Option<String>,
    pub fallback: FallbackOptions,
    pub redis: RedisOptions,
}

/// Build the process-wide backend.
///
/// Call once at startup and share the returned `Arc`; the choice is never
/// re-evaluated, so a broker address that shows up later has no effect.
pub async fn select_backend(
    settings: &QueueSettings,
) -> Result<Arc<dyn QueueBackend>, JobQueueError> {
    match settings.redis_url.as_deref() {
        Some(url) if !url.trim().is_empty() => {
            let queue = RedisQueue::connect(url, settings.redis.clone()).await?;
            info!(backend = "redis", "job queue backend selected");
            Ok(Arc::new(queue))
        }
        _ => {
            info!(backend = "fallback", "no broker configured, using in-process job queue");
            Ok(Arc::new(FallbackQueue::new(settings.fallback.clone())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;

    #[tokio::test]
    async fn no_broker_selects_fallback() {
        let backend = select_backend(&QueueSettings::default()).await.unwrap();
        assert_eq!(backend.kind(), BackendKind::Fallback);
    }

    #[tokio::test]
    async fn blank_broker_url_selects_fallback() {
        let settings = QueueSettings {
            redis_url: Some("  ".to_string()),
            ..QueueSettings::default()
        };
        let backend = select_backend(&settings).await.unwrap();
        assert_eq!(backend.kind(), BackendKind::Fallback);
    }

    #[tokio::test]
    async fn malformed_broker_url_is_unavailable() {
        let settings = QueueSettings {
            redis_url: Some("not a url".to_string()),
            ..QueueSettings::default()
        };
        let err = select_backend(&settings).await.unwrap_err();
        assert!(matches!(err, JobQueueError::BackendUnavailable(_)));
    }
}
