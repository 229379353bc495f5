use std::sync::Arc;

use atsync_backend::build_router;
use atsync_backend::dispatch::{BaseUrlPolicy, JobDispatcher};
use atsync_backend::state::{AppState, SiteSettings};
use atsync_backend::sync_source::InMemorySyncSourceStore;
use atsync_job_queue::{FallbackQueue, QueueBackend};
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

const SOURCES: &str = r#"{
    "sources": [
        { "id": "s1", "project_id": "p1", "base_id": "b1", "fk_user_id": "u1",
          "details": { "shareId": "shr1" } }
    ],
    "users": [ { "id": "u1", "email": "owner@example.com" } ]
}"#;

fn router(queue: FallbackQueue, public_url: Option<&str>) -> Router {
    let store = InMemorySyncSourceStore::from_json_str(SOURCES).expect("seed");
    let dispatcher = JobDispatcher::new(Arc::new(queue), Arc::new(store), BaseUrlPolicy::SiteUrl);
    let state = AppState::new(
        dispatcher,
        SiteSettings {
            public_url: public_url.map(str::to_string),
            port: 8080,
        },
    );
    build_router(Arc::new(state))
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(res: axum::response::Response) -> Value {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let app = router(FallbackQueue::default(), None);
    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn import_route_returns_handle() {
    let queue = FallbackQueue::default();
    let app = router(queue.clone(), None);

    let res = app
        .oneshot(post("/api/v1/db/meta/import/airtable", r#"{"key":"abc"}"#))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["name"], "at-import");
    assert!(body["id"].is_u64());

    let jobs = queue.list_jobs("at-import").await.unwrap();
    assert_eq!(jobs[0].payload, json!({ "key": "abc" }));
}

#[tokio::test]
async fn malformed_import_body_is_bad_request() {
    let queue = FallbackQueue::default();
    let app = router(queue.clone(), None);

    let res = app
        .oneshot(post("/api/v1/db/meta/import/airtable", "{not json"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(res).await["error"].is_string());
    assert!(queue.list_jobs("at-import").await.unwrap().is_empty());
}

#[tokio::test]
async fn trigger_then_conflict_over_http() {
    let queue = FallbackQueue::default();
    let app = router(queue.clone(), Some("https://sync.example.com/"));

    let res = app
        .clone()
        .oneshot(post("/api/v1/db/meta/syncs/s1/trigger", ""))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .oneshot(post("/api/v1/db/meta/syncs/s1/trigger", ""))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(res).await["error"], "Sync already in progress");

    let jobs = queue.list_jobs("at-import").await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].payload["baseURL"], "https://sync.example.com");
    assert_eq!(jobs[0].payload["shareId"], "shr1");
}

#[tokio::test]
async fn trigger_unknown_source_is_404() {
    let app = router(FallbackQueue::default(), None);
    let res = app
        .oneshot(post("/api/v1/db/meta/syncs/missing/trigger", ""))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn abort_route_returns_empty_object() {
    let app = router(FallbackQueue::default(), None);
    let res = app
        .oneshot(post("/api/v1/db/meta/syncs/s1/abort", ""))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await, json!({}));
}
