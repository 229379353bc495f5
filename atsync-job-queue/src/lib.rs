//! Queue backends for atsync import jobs.
//!
//! Two interchangeable backends implement [`QueueBackend`]: the in-process
//! [`FallbackQueue`] and the Redis-backed [`RedisQueue`]. [`select_backend`]
//! picks one at startup depending on whether a broker URL is configured; the
//! rest of the service only ever sees an `Arc<dyn QueueBackend>`.
//!
//! # Architecture
//!
//! - [`QueueBackend`] - enqueue, list and look up jobs; bind executors
//! - [`JobExecutor`] - trait for implementing job handlers
//! - [`Job`] / [`JobHandle`] - a tracked job and its caller-facing projection
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use atsync_job_queue::{async_trait, select_backend, JobExecutor, JobQueueError, QueueSettings};
//! use serde_json::json;
//!
//! struct MyJobExecutor;
//!
//! #[async_trait]
//! impl JobExecutor for MyJobExecutor {
//!     fn job_type(&self) -> &str {
//!         "my.job"
//!     }
//!
//!     async fn execute(&self, payload: serde_json::Value) -> Result<(), JobQueueError> {
//!         println!("Executing job with payload: {}", payload);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = select_backend(&QueueSettings::default()).await.unwrap();
//!     backend.register_executor(Arc::new(MyJobExecutor)).await;
//!
//!     let handle = backend.enqueue("my.job", json!({"key": "value"})).await.unwrap();
//!     println!("Enqueued job {} ({})", handle.id, handle.name);
//! }
//! ```

mod backend;
mod error;
mod executor;
mod fallback;
mod redis_queue;
mod selector;
mod types;

pub use backend::{BackendKind, QueueBackend};
pub use error::JobQueueError;
pub use executor::{JobExecutor, NoOpExecutor};
pub use fallback::{
    FallbackOptions, FallbackQueue, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_PENDING,
    DEFAULT_RETAIN_FINISHED,
};
pub use redis_queue::{RedisOptions, RedisQueue, DEFAULT_KEY_PREFIX};
pub use selector::{select_backend, QueueSettings};
pub use types::{Job, JobHandle, JobId, JobStatus};

// Re-export async_trait for convenience when implementing JobExecutor
pub use async_trait::async_trait;
