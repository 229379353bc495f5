use std::io::Write;
use std::sync::Arc;

use atsync_backend::dispatch::{BaseUrlPolicy, JobDispatcher};
use atsync_backend::sync_source::{InMemorySyncSourceStore, SyncSourceStore};
use atsync_job_queue::{select_backend, BackendKind, QueueSettings};
use serde_json::json;

// Kept as the only env-touching test in this binary.
#[tokio::test]
async fn backend_choice_is_fixed_at_startup() {
    std::env::remove_var("ATSYNC_REDIS_URL");
    let cfg = atsync_config::load_config::<&std::path::Path>(None).expect("config");
    assert!(cfg.redis_url.is_none());

    let settings = QueueSettings {
        redis_url: cfg.redis_url.clone(),
        ..QueueSettings::default()
    };
    let backend = select_backend(&settings).await.expect("backend");
    let dispatcher = JobDispatcher::new(
        backend,
        Arc::new(InMemorySyncSourceStore::new()),
        BaseUrlPolicy::SiteUrl,
    );

    std::env::set_var("ATSYNC_REDIS_URL", "redis://127.0.0.1:6399");
    let handle = dispatcher
        .dispatch_import(json!({ "key": "abc" }))
        .await
        .expect("import");
    std::env::remove_var("ATSYNC_REDIS_URL");

    assert_eq!(dispatcher.backend().kind(), BackendKind::Fallback);
    let job = dispatcher
        .backend()
        .get_job("at-import", handle.id)
        .await
        .unwrap()
        .expect("job stored in fallback queue");
    assert_eq!(job.payload, json!({ "key": "abc" }));
}

#[tokio::test]
async fn sync_sources_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"sources":[{{"id":"s1","project_id":"p1","base_id":"b1","fk_user_id":"u1"}}],
            "users":[{{"id":"u1","email":"owner@example.com"}}]}}"#
    )
    .unwrap();

    let store = InMemorySyncSourceStore::from_json_file(file.path()).unwrap();
    assert_eq!(store.len().await, 1);

    let source = store.get("s1").await.unwrap().expect("source");
    assert!(source.details.is_empty());
    let user = store.user_for(&source).await.unwrap().expect("user");
    assert_eq!(user["email"], "owner@example.com");
}
