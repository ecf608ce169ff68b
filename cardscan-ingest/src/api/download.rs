//! Export download endpoints

use crate::error::{ApiError, ApiResult};
use crate::export::{outputs_to_csv, outputs_to_vcf};
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use uuid::Uuid;

/// Completed batches only; in-flight downloads would truncate silently
async fn finished_outputs(
    state: &AppState,
    batch_id: Uuid,
) -> ApiResult<Vec<crate::models::OutputRow>> {
    let summary = state
        .queues
        .summary(batch_id)
        .await
        .ok_or_else(|| ApiError::NotFound("Batch not found".to_string()))?;

    if summary.waiting + summary.processing > 0 {
        return Err(ApiError::BadRequest(
            "Processing not completed".to_string(),
        ));
    }

    let outputs = state.queues.all_outputs(batch_id).await;
    if outputs.is_empty() {
        return Err(ApiError::NotFound("No extracted data found".to_string()));
    }
    Ok(outputs)
}

fn attachment(content_type: &str, filename: String, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

/// GET /api/v1/download/:batch_id - CSV export, generated on demand
pub async fn download_csv(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> ApiResult<Response> {
    let outputs = finished_outputs(&state, batch_id).await?;
    let csv = outputs_to_csv(&outputs);
    Ok(attachment(
        "text/csv",
        format!("{}_extracted_data.csv", batch_id),
        csv,
    ))
}

/// GET /api/v1/download/:batch_id/vcf - vCard export
pub async fn download_vcf(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> ApiResult<Response> {
    let outputs = finished_outputs(&state, batch_id).await?;
    let vcf = outputs_to_vcf(&outputs);
    Ok(attachment(
        "text/vcard",
        format!("{}_contacts.vcf", batch_id),
        vcf,
    ))
}

/// Build download routes
pub fn download_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/download/:batch_id", get(download_csv))
        .route("/api/v1/download/:batch_id/vcf", get(download_vcf))
}
