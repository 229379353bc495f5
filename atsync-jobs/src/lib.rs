//! Concrete job implementations for atsync.
//!
//! This crate provides implementations of the [`JobExecutor`](atsync_job_queue::JobExecutor)
//! trait for the job types the service enqueues.
//!
//! # Job Types
//!
//! - `at-import` - Import (or re-sync) an Airtable base into a project
//!
//! # Usage
//!
//! ```rust,no_run
//! use atsync_job_queue::{select_backend, QueueSettings};
//! use atsync_jobs::register_all_executors;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = select_backend(&QueueSettings::default()).await.unwrap();
//!     register_all_executors(backend.as_ref()).await;
//! }
//! ```

mod at_import;
mod error;

pub use at_import::{AtImportExecutor, AtImportPayload};
pub use error::JobError;

use std::sync::Arc;

use atsync_job_queue::QueueBackend;

/// Register all available job executors with the active backend.
pub async fn register_all_executors(backend: &dyn QueueBackend) {
    backend
        .register_executor(Arc::new(AtImportExecutor::new()))
        .await;
}

/// Job type constants for type-safe job references.
pub mod job_types {
    pub const AT_IMPORT: &str = "at-import";
}
