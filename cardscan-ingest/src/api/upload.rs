//! Batch upload endpoint

use crate::error::{ApiError, ApiResult};
use crate::models::FileTask;
use crate::store::{detect_kind, MAX_UPLOAD_BYTES};
use crate::AppState;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub batch_id: Uuid,
    pub total_files: usize,
    pub files: Vec<UploadedFile>,
}

#[derive(Debug, Serialize)]
pub struct UploadedFile {
    pub file_id: Uuid,
    pub filename: String,
    pub position: usize,
}

/// POST /api/v1/upload
///
/// Accepts a multipart batch of images/PDFs, stores them and initializes the
/// batch's input queue. Count and size caps are enforced here, before any
/// processing slot exists for the batch.
pub async fn upload_batch(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let batch_id = Uuid::new_v4();
    let mut pending: Vec<(String, Vec<u8>)> = Vec::new();
    let mut total_bytes = 0usize;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?
            .to_vec();

        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(ApiError::BadRequest(format!(
                "File {} exceeds the 20MB limit",
                filename
            )));
        }
        total_bytes += bytes.len();
        if total_bytes > MAX_UPLOAD_BYTES {
            return Err(ApiError::BadRequest(
                "Total batch size exceeds the 20MB limit".to_string(),
            ));
        }

        pending.push((filename, bytes));
    }

    if pending.is_empty() {
        return Err(ApiError::BadRequest("No files in upload".to_string()));
    }
    if !state.resources.validate_batch_size(pending.len()) {
        return Err(ApiError::BadRequest(format!(
            "Maximum {} files allowed, got {}",
            state.resources.limits().max_files_per_batch,
            pending.len()
        )));
    }

    let mut tasks = Vec::with_capacity(pending.len());
    for (position, (filename, bytes)) in pending.into_iter().enumerate() {
        let Some(kind) = detect_kind(&filename, &bytes) else {
            return Err(ApiError::BadRequest(format!(
                "Unsupported file type: {}",
                filename
            )));
        };
        let path = state.store.save(batch_id, &filename, &bytes).await?;
        tasks.push(FileTask::new(filename, path, kind, position + 1));
    }

    let files = tasks
        .iter()
        .map(|t| UploadedFile {
            file_id: t.file_id,
            filename: t.filename.clone(),
            position: t.position,
        })
        .collect();
    let total_files = tasks.len();

    state.queues.initialize_batch(batch_id, tasks).await;

    info!(batch_id = %batch_id, files = total_files, "Batch uploaded");

    Ok(Json(UploadResponse {
        batch_id,
        total_files,
        files,
    }))
}

/// DELETE /api/v1/batch/:batch_id
///
/// Archive a finished batch: drops queue state and stored uploads. Only
/// batches with no file still waiting or processing can be archived.
pub async fn archive_batch(
    State(state): State<AppState>,
    axum::extract::Path(batch_id): axum::extract::Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let summary = state
        .queues
        .summary(batch_id)
        .await
        .ok_or_else(|| ApiError::NotFound("Batch not found".to_string()))?;

    if summary.waiting + summary.processing > 0 {
        return Err(ApiError::Conflict(
            "Batch still has files in flight".to_string(),
        ));
    }

    state.queues.clear_batch(batch_id).await;
    state.store.remove_batch(batch_id).await?;

    Ok(Json(json!({ "status": "archived", "batch_id": batch_id })))
}

/// Build upload routes
pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/upload", post(upload_batch))
        .route(
            "/api/v1/batch/:batch_id",
            axum::routing::delete(archive_batch),
        )
        // Multipart framing overhead on top of the batch cap
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 1024 * 1024))
}
