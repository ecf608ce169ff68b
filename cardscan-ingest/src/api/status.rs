//! Batch and file status endpoints

use crate::error::{ApiError, ApiResult};
use crate::AppState;
use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use uuid::Uuid;

/// GET /api/v1/status/:batch_id
pub async fn batch_status(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let summary = state
        .queues
        .summary(batch_id)
        .await
        .ok_or_else(|| ApiError::NotFound("Batch not found".to_string()))?;

    Ok(Json(json!({
        "batch_id": batch_id,
        "summary": summary,
        "processing": state.orchestrator.is_running(batch_id).await,
    })))
}

/// GET /api/v1/files/:batch_id
pub async fn batch_files(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    if !state.queues.contains(batch_id).await {
        return Err(ApiError::NotFound("Batch not found".to_string()));
    }
    let files = state.queues.input_queue(batch_id).await;
    Ok(Json(json!({ "batch_id": batch_id, "files": files })))
}

/// GET /api/v1/files/:batch_id/:file_id
///
/// Input and (when completed) output snapshots for one file.
pub async fn file_pair(
    State(state): State<AppState>,
    Path((batch_id, file_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<serde_json::Value>> {
    let pair = state
        .queues
        .file_pair(batch_id, file_id)
        .await
        .ok_or_else(|| ApiError::NotFound("File not found".to_string()))?;

    Ok(Json(json!({ "batch_id": batch_id, "pair": pair })))
}

/// Build status routes
pub fn status_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/status/:batch_id", get(batch_status))
        .route("/api/v1/files/:batch_id", get(batch_files))
        .route("/api/v1/files/:batch_id/:file_id", get(file_pair))
}
