//! Shared test fixtures: stub collaborators and app wiring

use async_trait::async_trait;
use cardscan_common::config::Limits;
use cardscan_common::ContactRecord;
use cardscan_ingest::models::FileTask;
use cardscan_ingest::pages::{DocumentPager, PageImage};
use cardscan_ingest::resource::ResourceManager;
use cardscan_ingest::store::UploadStore;
use cardscan_ingest::vision::{CardExtractor, CardValidator, ValidationVerdict};
use cardscan_ingest::AppState;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Minimal JPEG header; enough for content sniffing
pub const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];

/// Pager that fabricates a single page without touching disk
pub struct StubPager;

#[async_trait]
impl DocumentPager for StubPager {
    async fn pages(&self, _task: &FileTask) -> anyhow::Result<Vec<PageImage>> {
        Ok(vec![PageImage {
            bytes: JPEG_MAGIC.to_vec(),
            mime_type: "image/jpeg".to_string(),
        }])
    }
}

/// Validator accepting everything
pub struct AcceptAllValidator;

#[async_trait]
impl CardValidator for AcceptAllValidator {
    async fn validate(&self, _page: &PageImage) -> anyhow::Result<ValidationVerdict> {
        Ok(ValidationVerdict {
            is_acceptable: true,
            confidence: "High".to_string(),
            reasoning: "stub".to_string(),
        })
    }
}

/// Extractor returning one unique full record per call, with optional
/// simulated latency and a call counter for concurrency assertions.
pub struct CountingExtractor {
    pub calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub delay: Duration,
}

impl CountingExtractor {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            delay,
        })
    }
}

#[async_trait]
impl CardExtractor for CountingExtractor {
    async fn extract(&self, _page: &PageImage) -> anyhow::Result<Vec<ContactRecord>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        Ok(vec![ContactRecord {
            name: format!("Contact {}", n),
            phone: format!("98765432{:02}", n % 100),
            email: format!("contact{}@example.com", n),
            company: "Acme".to_string(),
            designation: "Director".to_string(),
            address: "1 Main St".to_string(),
        }])
    }
}

/// Full app state around stub collaborators
pub fn stub_app_state(limits: Limits, extractor: Arc<CountingExtractor>) -> AppState {
    let dir = tempfile::tempdir().expect("tempdir");
    AppState::new(
        ResourceManager::new(limits),
        UploadStore::new(dir.into_path()),
        Arc::new(StubPager),
        Arc::new(AcceptAllValidator),
        extractor,
    )
}

/// Tight limits so concurrency effects are observable in tests
pub fn test_limits() -> Limits {
    Limits {
        max_concurrent_batches: 2,
        max_files_per_batch: 50,
        max_total_concurrent_files: 4,
        max_concurrent_files_per_batch: 3,
    }
}
