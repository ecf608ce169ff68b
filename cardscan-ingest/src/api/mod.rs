//! HTTP API handlers for cardscan-ingest
//!
//! REST endpoints for upload/processing/status plus an SSE stream for live
//! batch progress.

pub mod download;
pub mod events;
pub mod health;
pub mod process;
pub mod status;
pub mod upload;

pub use download::download_routes;
pub use events::event_routes;
pub use health::health_routes;
pub use process::process_routes;
pub use status::status_routes;
pub use upload::upload_routes;
