use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::Value;

use crate::handlers::utils::{job_handle_to_payload, site_url_from_headers};
use crate::{error::ApiError, state::AppState};

/// POST /v1/db/meta/syncs/{syncId}/trigger
/// Enqueue an import for a stored sync source unless one is already running.
pub async fn trigger_sync(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(path): Path<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let sync_id = path
        .get("syncId")
        .ok_or_else(|| ApiError::bad_request("missing syncId path parameter"))?;

    let site_url = site_url_from_headers(&headers, &state.site);
    let handle = state.dispatcher.trigger_sync(sync_id, &site_url).await?;

    Ok(Json(job_handle_to_payload(&handle)))
}
