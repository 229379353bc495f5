use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::Extension;
use axum::Json;
use serde_json::Value;

use crate::handlers::utils::job_handle_to_payload;
use crate::{error::ApiError, state::AppState};

/// POST /v1/db/meta/import/airtable
/// Enqueue an import job with the request body as its payload.
pub async fn import_airtable(
    Extension(state): Extension<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body?;

    let handle = state.dispatcher.dispatch_import(body).await?;

    Ok(Json(job_handle_to_payload(&handle)))
}
