//! cardscan-ingest - Document Ingest Service
//!
//! Accepts batches of scanned business cards (images/PDFs), drives them
//! through a concurrency-controlled extraction pipeline against a vision
//! model, and streams per-file progress to connected clients. Results are
//! exportable as CSV or VCF once a batch completes. All state is in-memory;
//! nothing survives a restart.

use anyhow::Result;
use cardscan_common::config::TomlConfig;
use cardscan_ingest::pages::LocalPager;
use cardscan_ingest::resource::ResourceManager;
use cardscan_ingest::store::UploadStore;
use cardscan_ingest::vision::VisionClient;
use cardscan_ingest::AppState;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting cardscan-ingest service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = TomlConfig::load()?;
    let storage_root = config.storage_root();
    tokio::fs::create_dir_all(&storage_root).await?;
    info!("Upload storage: {}", storage_root.display());

    let vision = Arc::new(VisionClient::new(config.vision.clone())?);
    let state = AppState::new(
        ResourceManager::new(config.limits.clone()),
        UploadStore::new(storage_root),
        Arc::new(LocalPager::new()),
        vision.clone(),
        vision,
    );

    let app = cardscan_ingest::build_router(state);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
