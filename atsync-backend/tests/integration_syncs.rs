use std::collections::HashMap;
use std::sync::Arc;

use atsync_backend::dispatch::{BaseUrlPolicy, JobDispatcher};
use atsync_backend::error::ApiError;
use atsync_backend::handlers::syncs;
use atsync_backend::state::{AppState, SiteSettings};
use atsync_backend::sync_source::{InMemorySyncSourceStore, SyncSource};
use atsync_job_queue::{FallbackQueue, QueueBackend};
use axum::extract::Path;
use axum::http::{HeaderMap, HeaderValue};
use serde_json::{json, Map, Value};

async fn seeded_store() -> Arc<InMemorySyncSourceStore> {
    let store = InMemorySyncSourceStore::new();
    let mut details = Map::new();
    details.insert("shareId".into(), json!("shr1"));
    store
        .insert_source(SyncSource {
            id: "s1".into(),
            project_id: "p1".into(),
            base_id: "b1".into(),
            fk_user_id: Some("u1".into()),
            details,
        })
        .await;
    store
        .insert_user("u1", json!({ "id": "u1", "email": "owner@example.com" }))
        .await;
    Arc::new(store)
}

async fn app_state(queue: FallbackQueue, policy: BaseUrlPolicy) -> Arc<AppState> {
    let dispatcher = JobDispatcher::new(Arc::new(queue), seeded_store().await, policy);
    Arc::new(AppState::new(
        dispatcher,
        SiteSettings {
            public_url: None,
            port: 8080,
        },
    ))
}

fn sync_path(sync_id: &str) -> Path<HashMap<String, String>> {
    Path(HashMap::from([("syncId".to_string(), sync_id.to_string())]))
}

fn host_headers(host: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("host", HeaderValue::from_str(host).unwrap());
    headers
}

#[tokio::test]
async fn trigger_enqueues_sync_payload() {
    let queue = FallbackQueue::default();
    let state = app_state(queue.clone(), BaseUrlPolicy::SiteUrl).await;

    let res = syncs::trigger_sync(
        axum::Extension(state),
        host_headers("app.example.com"),
        sync_path("s1"),
    )
    .await
    .expect("trigger");
    assert_eq!(res.0["name"], "at-import");

    let jobs = queue.list_jobs("at-import").await.unwrap();
    assert_eq!(jobs.len(), 1);
    let payload = &jobs[0].payload;
    assert_eq!(payload["syncId"], "s1");
    assert_eq!(payload["projectId"], "p1");
    assert_eq!(payload["baseId"], "b1");
    assert_eq!(payload["authToken"], "");
    assert_eq!(payload["shareId"], "shr1");
    assert_eq!(payload["baseURL"], "http://app.example.com");
    assert_eq!(payload["user"]["email"], "owner@example.com");
}

#[tokio::test]
async fn second_trigger_conflicts_while_first_is_open() {
    let queue = FallbackQueue::default();
    let state = app_state(queue.clone(), BaseUrlPolicy::SiteUrl).await;

    syncs::trigger_sync(axum::Extension(state.clone()), HeaderMap::new(), sync_path("s1"))
        .await
        .expect("first trigger");
    let err = syncs::trigger_sync(axum::Extension(state), HeaderMap::new(), sync_path("s1"))
        .await
        .unwrap_err();

    match err {
        ApiError::Conflict(msg) => assert_eq!(msg, "Sync already in progress"),
        other => panic!("expected conflict, got {other:?}"),
    }
    assert_eq!(queue.list_jobs("at-import").await.unwrap().len(), 1);
}

#[tokio::test]
async fn direct_import_with_sync_id_blocks_trigger() {
    let queue = FallbackQueue::default();
    let state = app_state(queue.clone(), BaseUrlPolicy::SiteUrl).await;

    state
        .dispatcher
        .dispatch_import(json!({ "syncId": "s1" }))
        .await
        .expect("import");
    let err = syncs::trigger_sync(axum::Extension(state), HeaderMap::new(), sync_path("s1"))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Conflict(_)));
}

#[tokio::test]
async fn unknown_sync_source_is_not_found() {
    let queue = FallbackQueue::default();
    let state = app_state(queue.clone(), BaseUrlPolicy::SiteUrl).await;

    let err = syncs::trigger_sync(axum::Extension(state), HeaderMap::new(), sync_path("nope"))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::NotFound(_)));
    assert!(queue.list_jobs("at-import").await.unwrap().is_empty());
}

#[tokio::test]
async fn container_mode_uses_loopback_base_url() {
    let queue = FallbackQueue::default();
    let state = app_state(queue.clone(), BaseUrlPolicy::new(true, None)).await;

    syncs::trigger_sync(
        axum::Extension(state),
        host_headers("app.example.com"),
        sync_path("s1"),
    )
    .await
    .expect("trigger");

    let jobs = queue.list_jobs("at-import").await.unwrap();
    assert_eq!(jobs[0].payload["baseURL"], "http://localhost:8080");
}

#[tokio::test]
async fn container_mode_honours_configured_port() {
    let queue = FallbackQueue::default();
    let state = app_state(queue.clone(), BaseUrlPolicy::new(true, Some(4000))).await;

    syncs::trigger_sync(axum::Extension(state), HeaderMap::new(), sync_path("s1"))
        .await
        .expect("trigger");

    let jobs = queue.list_jobs("at-import").await.unwrap();
    assert_eq!(jobs[0].payload["baseURL"], "http://localhost:4000");
}

#[tokio::test]
async fn concurrent_triggers_enqueue_one_job() {
    let queue = FallbackQueue::default();
    let state = app_state(queue.clone(), BaseUrlPolicy::SiteUrl).await;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let state = state.clone();
        tasks.push(tokio::spawn(async move {
            syncs::trigger_sync(axum::Extension(state), HeaderMap::new(), sync_path("s1")).await
        }));
    }

    let mut accepted = 0;
    let mut conflicts = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(ApiError::Conflict(_)) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(accepted, 1);
    assert_eq!(conflicts, 7);
    assert_eq!(queue.list_jobs("at-import").await.unwrap().len(), 1);
}

#[tokio::test]
async fn abort_returns_empty_object() {
    let queue = FallbackQueue::default();
    let state = app_state(queue.clone(), BaseUrlPolicy::SiteUrl).await;

    let res = syncs::abort_sync(axum::Extension(state.clone()), sync_path("s1")).await;
    assert_eq!(res.0, json!({}));

    syncs::trigger_sync(axum::Extension(state.clone()), HeaderMap::new(), sync_path("s1"))
        .await
        .expect("trigger");
    let res = syncs::abort_sync(axum::Extension(state), sync_path("s1")).await;
    assert_eq!(res.0, Value::Object(Map::new()));

    // The open job is left untouched.
    assert_eq!(queue.list_jobs("at-import").await.unwrap().len(), 1);
}
