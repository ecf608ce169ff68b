//! Server-Sent Events stream for live batch progress
//!
//! Each connected client becomes a channel-backed subscriber of the
//! broadcaster. The first message is an initial batch/file-status snapshot;
//! afterwards the stream forwards whatever the pipeline broadcasts. A client
//! that goes away is pruned by the broadcaster on its next failed send.

use crate::broadcast::ChannelSubscriber;
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use cardscan_common::events::{BatchEvent, FileStatusInfo};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Buffered events per subscriber before lossy dropping kicks in
const SUBSCRIBER_CAPACITY: usize = 64;

/// GET /api/v1/events/:batch_id - SSE event stream for batch progress
pub async fn batch_event_stream(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let files = state.queues.input_queue(batch_id).await;
    if files.is_empty() {
        return Err(ApiError::NotFound("Batch not found".to_string()));
    }

    info!(batch_id = %batch_id, "New SSE client connected");

    let (subscriber, mut rx) = ChannelSubscriber::new(SUBSCRIBER_CAPACITY);
    state.broadcaster.connect(batch_id, subscriber.clone()).await;

    // Initial snapshot goes only to the new client
    let snapshot = BatchEvent::InitialStatus {
        batch_id,
        total_files: files.len(),
        files: files
            .iter()
            .map(|f| FileStatusInfo {
                file_id: f.file_id,
                filename: f.filename.clone(),
                status: f.status,
            })
            .collect(),
        message: "Connected. Processing updates will stream here.".to_string(),
    };
    if state
        .broadcaster
        .send_to(&subscriber, &snapshot)
        .await
        .is_err()
    {
        warn!(batch_id = %batch_id, "SSE client gone before initial snapshot");
    }

    let stream = async_stream::stream! {
        while let Some(text) = rx.recv().await {
            yield Ok(Event::default().data(text));
        }
        // Channel closed: broadcaster pruned us or is gone
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    ))
}

/// Build event-stream routes
pub fn event_routes() -> Router<AppState> {
    Router::new().route("/api/v1/events/:batch_id", get(batch_event_stream))
}
