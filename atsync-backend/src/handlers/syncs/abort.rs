use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// POST /v1/db/meta/syncs/{syncId}/abort
/// Acknowledge an abort. Nothing is cancelled; the response is always `{}`.
pub async fn abort_sync(
    Extension(state): Extension<Arc<AppState>>,
    Path(path): Path<HashMap<String, String>>,
) -> Json<Value> {
    if let Some(sync_id) = path.get("syncId") {
        state.dispatcher.abort_sync(sync_id).await;
    }
    Json(json!({}))
}
