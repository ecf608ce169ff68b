//! cardscan-ingest library interface
//!
//! Exposes the ingest pipeline and its HTTP surface for integration testing.

pub mod api;
pub mod broadcast;
pub mod error;
pub mod export;
pub mod models;
pub mod orchestrator;
pub mod pages;
pub mod pipeline;
pub mod queue;
pub mod resource;
pub mod store;
pub mod vision;

pub use crate::error::{ApiError, ApiResult};

use crate::broadcast::Broadcaster;
use crate::orchestrator::BatchOrchestrator;
use crate::pages::DocumentPager;
use crate::queue::QueueManager;
use crate::resource::ResourceManager;
use crate::store::UploadStore;
use crate::vision::{CardExtractor, CardValidator};
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
///
/// Every component is an explicit store object created at startup and
/// injected here; nothing is process-global, so tests can build as many
/// independent instances as they like.
#[derive(Clone)]
pub struct AppState {
    pub resources: ResourceManager,
    pub queues: QueueManager,
    pub broadcaster: Broadcaster,
    pub orchestrator: Arc<BatchOrchestrator>,
    pub store: UploadStore,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Wire up the full component graph around the given collaborators.
    pub fn new(
        resources: ResourceManager,
        store: UploadStore,
        pager: Arc<dyn DocumentPager>,
        validator: Arc<dyn CardValidator>,
        extractor: Arc<dyn CardExtractor>,
    ) -> Self {
        let queues = QueueManager::new();
        let broadcaster = Broadcaster::new();
        let orchestrator = Arc::new(BatchOrchestrator::new(
            resources.clone(),
            queues.clone(),
            broadcaster.clone(),
            pager,
            validator,
            extractor,
        ));

        Self {
            resources,
            queues,
            broadcaster,
            orchestrator,
            store,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::upload_routes())
        .merge(api::process_routes())
        .merge(api::status_routes())
        .merge(api::event_routes())
        .merge(api::download_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
