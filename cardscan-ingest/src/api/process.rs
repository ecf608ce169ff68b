//! Batch processing control

use crate::error::{ApiError, ApiResult};
use crate::orchestrator::DriveMode;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ProcessParams {
    /// "fanout" (default) or "sequential"
    pub mode: Option<String>,
}

/// POST /api/v1/process/:batch_id
///
/// Admits the batch and starts driving it in the background. Oversized
/// batches are refused here, synchronously, before any slot is taken; a
/// batch already being driven answers 409. Admission may still have to wait
/// for a batch slot - that wait happens in the spawned driver, not in this
/// handler.
pub async fn start_processing(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
    Query(params): Query<ProcessParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let input = state.queues.input_queue(batch_id).await;
    if input.is_empty() {
        return Err(ApiError::NotFound("Batch not found".to_string()));
    }
    if !state.resources.validate_batch_size(input.len()) {
        return Err(ApiError::BadRequest(format!(
            "Batch of {} files exceeds the {}-file limit",
            input.len(),
            state.resources.limits().max_files_per_batch
        )));
    }

    let mode = match params.mode.as_deref() {
        Some("sequential") => DriveMode::Sequential,
        Some("fanout") | None => DriveMode::FanOut,
        Some(other) => {
            return Err(ApiError::BadRequest(format!(
                "Unknown processing mode: {}",
                other
            )))
        }
    };

    if !state.orchestrator.try_claim(batch_id).await {
        return Err(ApiError::Conflict(
            "Batch is already being processed".to_string(),
        ));
    }

    info!(batch_id = %batch_id, mode = ?mode, "Processing requested");

    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        if let Err(e) = orchestrator.run_batch(batch_id, mode).await {
            error!(batch_id = %batch_id, error = %e, "Batch admission failed");
        }
    });

    Ok(Json(json!({
        "status": "processing_started",
        "batch_id": batch_id,
        "total_files": input.len(),
    })))
}

/// GET /api/v1/system/stats
///
/// Snapshot of admission-control state: active batches and free slots.
pub async fn system_stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.resources.system_stats();
    Json(json!(stats))
}

/// Build processing routes
pub fn process_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/process/:batch_id", post(start_processing))
        .route("/api/v1/system/stats", get(system_stats))
}
