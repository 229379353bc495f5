use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit, extract::Extension, response::IntoResponse, routing::get,
    routing::post, Router,
};

use crate::handlers::{imports, syncs};
use crate::state::AppState;

// Import requests carry options, not data; 1 MB is plenty.
const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Build the primary axum router with the provided shared application state.
///
/// All routes live under `/api`.
pub fn build_router(state: Arc<AppState>) -> Router {
    let router = Router::new()
        .route(
            "/v1/db/meta/import/airtable",
            post(imports::import_airtable),
        )
        .route(
            "/v1/db/meta/syncs/{syncId}/trigger",
            post(syncs::trigger_sync),
        )
        .route("/v1/db/meta/syncs/{syncId}/abort", post(syncs::abort_sync))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT))
        .layer(Extension(state));

    Router::new().nest("/api", router)
}

async fn health_handler() -> impl IntoResponse {
    // Liveness: always return 200 OK when process is alive.
    (axum::http::StatusCode::OK, "OK")
}
