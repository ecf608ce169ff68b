//! Batch-level orchestration
//!
//! Pulls work from the queue layer and drives the pipeline under resource
//! admission. Two drivers: sequential (one file at a time per batch) and
//! fan-out (a bounded per-batch window of concurrent files, each still gated
//! by the global file-slot pool). Either way the batch slot is held for the
//! whole run and returned when the batch drains; output order is completion
//! order, not submission order. There is no cancellation: an abandoned batch
//! keeps its slots until the driver task ends.

use crate::broadcast::Broadcaster;
use crate::error::AdmissionError;
use crate::pages::DocumentPager;
use crate::pipeline::{FileOutcome, FileProcessor};
use crate::queue::QueueManager;
use crate::resource::ResourceManager;
use crate::vision::{CardExtractor, CardValidator};
use cardscan_common::events::BatchEvent;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

/// How the orchestrator walks a batch's input queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriveMode {
    /// One file at a time, in submission order
    Sequential,
    /// Up to the per-batch window of files concurrently
    #[default]
    FanOut,
}

/// Composes queues, resources, broadcaster and pipeline into batch runs
pub struct BatchOrchestrator {
    resources: ResourceManager,
    queues: QueueManager,
    broadcaster: Broadcaster,
    pager: Arc<dyn DocumentPager>,
    validator: Arc<dyn CardValidator>,
    extractor: Arc<dyn CardExtractor>,
    /// Batches currently being driven (double-start guard)
    active: Mutex<HashSet<Uuid>>,
}

impl BatchOrchestrator {
    pub fn new(
        resources: ResourceManager,
        queues: QueueManager,
        broadcaster: Broadcaster,
        pager: Arc<dyn DocumentPager>,
        validator: Arc<dyn CardValidator>,
        extractor: Arc<dyn CardExtractor>,
    ) -> Self {
        Self {
            resources,
            queues,
            broadcaster,
            pager,
            validator,
            extractor,
            active: Mutex::new(HashSet::new()),
        }
    }

    /// Whether a batch is currently being driven
    pub async fn is_running(&self, batch_id: Uuid) -> bool {
        self.active.lock().await.contains(&batch_id)
    }

    /// Mark a batch as running; false when it already is
    pub async fn try_claim(&self, batch_id: Uuid) -> bool {
        self.active.lock().await.insert(batch_id)
    }

    /// Run one batch to completion.
    ///
    /// Size rejection is synchronous, before any slot is taken; afterwards
    /// the call suspends until a batch slot frees, drives every file, then
    /// broadcasts completion and releases the slot. Call `try_claim` first
    /// when double-starts must be refused.
    pub async fn run_batch(&self, batch_id: Uuid, mode: DriveMode) -> Result<(), AdmissionError> {
        let total = self.queues.input_queue(batch_id).await.len();

        let result = self.admit_and_drive(batch_id, total, mode).await;
        self.active.lock().await.remove(&batch_id);
        result
    }

    async fn admit_and_drive(
        &self,
        batch_id: Uuid,
        total: usize,
        mode: DriveMode,
    ) -> Result<(), AdmissionError> {
        let slot = self.resources.acquire_batch_slot(batch_id, total).await?;

        info!(
            batch_id = %batch_id,
            files = total,
            mode = ?mode,
            "Starting batch processing"
        );

        let processor = Arc::new(FileProcessor::new(
            batch_id,
            self.resources.clone(),
            self.queues.clone(),
            self.broadcaster.clone(),
            Arc::clone(&self.pager),
            Arc::clone(&self.validator),
            Arc::clone(&self.extractor),
        ));

        match mode {
            DriveMode::Sequential => self.drive_sequential(&processor).await,
            DriveMode::FanOut => self.drive_fanout(&processor).await,
        }

        self.send_batch_complete(batch_id).await;
        slot.release();

        info!(batch_id = %batch_id, "Batch processing finished");
        Ok(())
    }

    /// Process all files in the batch one by one
    async fn drive_sequential(&self, processor: &Arc<FileProcessor>) {
        let batch_id = processor.batch_id();
        while let Some(task) = self.queues.next_waiting(batch_id).await {
            let outcome = processor.process_file(&task).await;
            log_outcome(batch_id, &task.filename, &outcome);
        }
    }

    /// Process files with a bounded per-batch window; each task still has to
    /// win a global file slot inside the pipeline.
    async fn drive_fanout(&self, processor: &Arc<FileProcessor>) {
        let batch_id = processor.batch_id();
        let window = Arc::new(Semaphore::new(
            self.resources.limits().max_concurrent_files_per_batch.max(1),
        ));
        let mut tasks = JoinSet::new();

        loop {
            let permit = Arc::clone(&window)
                .acquire_owned()
                .await
                .expect("window semaphore closed");
            let Some(task) = self.queues.next_waiting(batch_id).await else {
                break;
            };
            let processor = Arc::clone(processor);
            tasks.spawn(async move {
                let outcome = processor.process_file(&task).await;
                log_outcome(batch_id, &task.filename, &outcome);
                drop(permit);
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(batch_id = %batch_id, error = %e, "File task panicked");
            }
        }
    }

    async fn send_batch_complete(&self, batch_id: Uuid) {
        let Some(summary) = self.queues.summary(batch_id).await else {
            return;
        };
        self.broadcaster
            .broadcast(
                batch_id,
                &BatchEvent::BatchComplete {
                    batch_id,
                    summary,
                    download_url: format!("/api/v1/download/{}", batch_id),
                    message: "All files processed".to_string(),
                },
            )
            .await;
    }
}

fn log_outcome(batch_id: Uuid, filename: &str, outcome: &FileOutcome) {
    match outcome {
        FileOutcome::Completed { accepted } => info!(
            batch_id = %batch_id,
            file = filename,
            accepted = accepted,
            "File completed"
        ),
        FileOutcome::Invalid => info!(batch_id = %batch_id, file = filename, "File invalid"),
        FileOutcome::ExtractionFailed => {
            info!(batch_id = %batch_id, file = filename, "File extraction failed")
        }
        FileOutcome::Failed { error } => {
            warn!(batch_id = %batch_id, file = filename, error = %error, "File failed")
        }
    }
}
