//! Drives one file through the complete processing cycle
//!
//! Stage order: claim a global file slot, validate the first page, extract
//! every page, repair fragmentation (multi-page combine or multi-card
//! consolidation), filter by completeness, dedup against the batch, append
//! the accepted record to the output queue. Each transition updates the input
//! queue and is broadcast to subscribers. Validation and acceptance
//! rejections are ordinary terminal outcomes; only collaborator faults and
//! unexpected errors mark the file failed, and neither touches sibling files.

use crate::broadcast::Broadcaster;
use crate::error::PipelineError;
use crate::models::FileTask;
use crate::pages::DocumentPager;
use crate::pipeline::merge::{combine_pages, consolidate_cards};
use crate::queue::QueueManager;
use crate::resource::ResourceManager;
use crate::vision::{CardExtractor, CardValidator};
use cardscan_common::events::{BatchEvent, FileStatus};
use cardscan_common::ContactRecord;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Terminal result of one file's run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// File finished; `accepted` is true when a record reached the output queue
    Completed { accepted: bool },
    /// Validator rejected the document
    Invalid,
    /// Extraction produced nothing usable
    ExtractionFailed,
    /// Unexpected error; message already logged and broadcast
    Failed { error: String },
}

/// Processes the files of one batch
pub struct FileProcessor {
    batch_id: Uuid,
    resources: ResourceManager,
    queues: QueueManager,
    broadcaster: Broadcaster,
    pager: Arc<dyn DocumentPager>,
    validator: Arc<dyn CardValidator>,
    extractor: Arc<dyn CardExtractor>,
    /// Dedup keys of records already accepted in this batch
    seen_keys: Mutex<HashSet<String>>,
}

impl FileProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        batch_id: Uuid,
        resources: ResourceManager,
        queues: QueueManager,
        broadcaster: Broadcaster,
        pager: Arc<dyn DocumentPager>,
        validator: Arc<dyn CardValidator>,
        extractor: Arc<dyn CardExtractor>,
    ) -> Self {
        Self {
            batch_id,
            resources,
            queues,
            broadcaster,
            pager,
            validator,
            extractor,
            seen_keys: Mutex::new(HashSet::new()),
        }
    }

    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    /// Process one file through the complete cycle.
    ///
    /// Holds a global file slot for the duration; the slot guard returns the
    /// permit on every exit path, including panics in collaborator calls.
    pub async fn process_file(&self, task: &FileTask) -> FileOutcome {
        let _slot = self.resources.acquire_file_slot(self.batch_id).await;
        let started = Instant::now();

        match self.run_stages(task, started).await {
            Ok(outcome) => outcome,
            Err(PipelineError::Extraction(message)) => {
                warn!(
                    batch_id = %self.batch_id,
                    file = %task.filename,
                    error = %message,
                    "Extraction collaborator failed"
                );
                self.extraction_failed(task).await
            }
            Err(e @ PipelineError::Internal(_)) => {
                let message = e.to_string();
                error!(
                    batch_id = %self.batch_id,
                    file = %task.filename,
                    error = %message,
                    "File processing failed"
                );
                self.queues
                    .update_status(self.batch_id, task.file_id, FileStatus::Failed)
                    .await;
                self.broadcaster
                    .broadcast(
                        self.batch_id,
                        &BatchEvent::Error {
                            batch_id: self.batch_id,
                            file_id: task.file_id,
                            filename: task.filename.clone(),
                            error: message.clone(),
                            timestamp: Utc::now(),
                        },
                    )
                    .await;
                self.broadcast_summary().await;
                FileOutcome::Failed { error: message }
            }
        }
    }

    async fn run_stages(
        &self,
        task: &FileTask,
        started: Instant,
    ) -> Result<FileOutcome, PipelineError> {
        // Stage 1: start
        self.send_file_update(task, FileStatus::Processing, "started", 0)
            .await;

        // Stage 2: validation
        self.set_status(task, FileStatus::Validating).await;
        self.send_file_update(task, FileStatus::Validating, "validation", 25)
            .await;

        let pages = match self.pager.pages(task).await {
            Ok(pages) if !pages.is_empty() => pages,
            Ok(_) => {
                return Err(PipelineError::Extraction(
                    "document yielded no pages".to_string(),
                ))
            }
            Err(e) => return Err(PipelineError::Extraction(e.to_string())),
        };

        let verdict = self
            .validator
            .validate(&pages[0])
            .await
            .map_err(PipelineError::Internal)?;

        self.broadcaster
            .broadcast(
                self.batch_id,
                &BatchEvent::ValidationResult {
                    batch_id: self.batch_id,
                    file_id: task.file_id,
                    filename: task.filename.clone(),
                    is_valid: verdict.is_acceptable,
                    confidence: verdict.confidence.clone(),
                    reasoning: verdict.reasoning.clone(),
                },
            )
            .await;

        if !verdict.is_acceptable {
            self.set_status(task, FileStatus::Invalid).await;
            self.send_file_update(task, FileStatus::Invalid, "validation_failed", 100)
                .await;
            self.broadcast_summary().await;
            return Ok(FileOutcome::Invalid);
        }

        // Stage 3: extraction, one call per page
        self.set_status(task, FileStatus::Extracting).await;
        self.send_file_update(task, FileStatus::Extracting, "extraction", 50)
            .await;

        let multi_page = pages.len() > 1;
        let mut raw: Vec<ContactRecord> = Vec::new();
        for page in &pages {
            let fields = self
                .extractor
                .extract(page)
                .await
                .map_err(|e| PipelineError::Extraction(e.to_string()))?;
            raw.extend(fields);
        }

        if raw.is_empty() {
            return Ok(self.extraction_failed(task).await);
        }

        // Stage 4: merge fragments into canonical records
        self.set_status(task, FileStatus::ProcessingData).await;
        self.send_file_update(task, FileStatus::ProcessingData, "processing_data", 75)
            .await;

        // Pages of one document describe one contact; cards within one
        // image are separate contacts with possible phone continuations.
        let records = if multi_page {
            combine_pages(raw)
        } else {
            consolidate_cards(raw)
        };

        // Stage 5: dedup + acceptance
        let mut accepted: Vec<ContactRecord> = Vec::new();
        {
            let mut seen = self.seen_keys.lock().await;
            for record in records {
                if !record.is_acceptable() {
                    info!(
                        batch_id = %self.batch_id,
                        file = %task.filename,
                        na_fields = record.na_count(),
                        "Skipped record with too many absent fields"
                    );
                    continue;
                }
                if !seen.insert(record.dedup_key()) {
                    info!(
                        batch_id = %self.batch_id,
                        file = %task.filename,
                        "Skipped duplicate record"
                    );
                    continue;
                }
                accepted.push(record);
            }
        }

        let processing_time = started.elapsed().as_secs_f64();

        let Some(record) = accepted.first().cloned() else {
            // Nothing survived filtering; the file itself still completes
            self.set_status(task, FileStatus::Completed).await;
            self.send_file_update(task, FileStatus::Completed, "completed", 100)
                .await;
            self.broadcast_summary().await;
            return Ok(FileOutcome::Completed { accepted: false });
        };
        if accepted.len() > 1 {
            info!(
                batch_id = %self.batch_id,
                file = %task.filename,
                extra = accepted.len() - 1,
                "Multiple accepted records; output queue keeps the first"
            );
        }

        // Stage 6: completion
        self.queues
            .push_output(self.batch_id, task.file_id, record.clone(), processing_time)
            .await;

        self.broadcaster
            .broadcast(
                self.batch_id,
                &BatchEvent::ExtractionComplete {
                    batch_id: self.batch_id,
                    file_id: task.file_id,
                    filename: task.filename.clone(),
                    status: FileStatus::Completed,
                    extracted_data: record,
                    processing_time,
                },
            )
            .await;
        self.broadcast_summary().await;

        Ok(FileOutcome::Completed { accepted: true })
    }

    async fn extraction_failed(&self, task: &FileTask) -> FileOutcome {
        self.set_status(task, FileStatus::ExtractionFailed).await;
        self.send_file_update(task, FileStatus::ExtractionFailed, "extraction_failed", 100)
            .await;
        self.broadcast_summary().await;
        FileOutcome::ExtractionFailed
    }

    async fn set_status(&self, task: &FileTask, status: FileStatus) {
        self.queues
            .update_status(self.batch_id, task.file_id, status)
            .await;
    }

    async fn send_file_update(&self, task: &FileTask, status: FileStatus, stage: &str, progress: u8) {
        self.broadcaster
            .broadcast(
                self.batch_id,
                &BatchEvent::FileUpdate {
                    batch_id: self.batch_id,
                    file_id: task.file_id,
                    filename: task.filename.clone(),
                    status,
                    stage: stage.to_string(),
                    progress,
                },
            )
            .await;
    }

    async fn broadcast_summary(&self) {
        if let Some(summary) = self.queues.summary(self.batch_id).await {
            self.broadcaster
                .broadcast(
                    self.batch_id,
                    &BatchEvent::BatchUpdate {
                        batch_id: self.batch_id,
                        summary,
                    },
                )
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileKind;
    use crate::pages::PageImage;
    use crate::vision::ValidationVerdict;
    use async_trait::async_trait;
    use cardscan_common::config::Limits;
    use cardscan_common::record::NA;
    use std::path::PathBuf;

    struct StubPager {
        pages: usize,
    }

    #[async_trait]
    impl DocumentPager for StubPager {
        async fn pages(&self, _task: &FileTask) -> anyhow::Result<Vec<PageImage>> {
            Ok((0..self.pages)
                .map(|_| PageImage {
                    bytes: vec![0xFF, 0xD8],
                    mime_type: "image/jpeg".into(),
                })
                .collect())
        }
    }

    struct StubValidator {
        accept: bool,
    }

    #[async_trait]
    impl CardValidator for StubValidator {
        async fn validate(&self, _page: &PageImage) -> anyhow::Result<ValidationVerdict> {
            Ok(ValidationVerdict {
                is_acceptable: self.accept,
                confidence: "High".into(),
                reasoning: "stub".into(),
            })
        }
    }

    enum StubBehavior {
        Records(Vec<ContactRecord>),
        Empty,
        Error,
    }

    struct StubExtractor {
        behavior: StubBehavior,
    }

    #[async_trait]
    impl CardExtractor for StubExtractor {
        async fn extract(&self, _page: &PageImage) -> anyhow::Result<Vec<ContactRecord>> {
            match &self.behavior {
                StubBehavior::Records(records) => Ok(records.clone()),
                StubBehavior::Empty => Ok(Vec::new()),
                StubBehavior::Error => anyhow::bail!("upstream unavailable"),
            }
        }
    }

    fn full_record() -> ContactRecord {
        ContactRecord {
            name: "Jane Doe".into(),
            phone: "9876543210".into(),
            email: "jane@acme.example".into(),
            company: "Acme".into(),
            designation: "Director".into(),
            address: "1 Main St".into(),
        }
    }

    async fn processor_with(
        accept: bool,
        pages: usize,
        behavior: StubBehavior,
    ) -> (FileProcessor, QueueManager, FileTask, Uuid) {
        let batch_id = Uuid::new_v4();
        let queues = QueueManager::new();
        let task = FileTask::new(
            "card.jpg".into(),
            PathBuf::from("/tmp/card.jpg"),
            FileKind::Image,
            1,
        );
        queues.initialize_batch(batch_id, vec![task.clone()]).await;
        let task = queues.next_waiting(batch_id).await.unwrap();

        let processor = FileProcessor::new(
            batch_id,
            ResourceManager::new(Limits::default()),
            queues.clone(),
            Broadcaster::new(),
            Arc::new(StubPager { pages }),
            Arc::new(StubValidator { accept }),
            Arc::new(StubExtractor { behavior }),
        );
        (processor, queues, task, batch_id)
    }

    #[tokio::test]
    async fn completed_file_lands_in_output_queue() {
        let (processor, queues, task, batch_id) =
            processor_with(true, 1, StubBehavior::Records(vec![full_record()])).await;

        let outcome = processor.process_file(&task).await;
        assert_eq!(outcome, FileOutcome::Completed { accepted: true });

        let pair = queues.file_pair(batch_id, task.file_id).await.unwrap();
        assert_eq!(pair.input.status, FileStatus::Completed);
        assert_eq!(pair.output.unwrap().extracted_data.name, "Jane Doe");
    }

    #[tokio::test]
    async fn rejected_validation_is_terminal_invalid() {
        let (processor, queues, task, batch_id) =
            processor_with(false, 1, StubBehavior::Records(vec![full_record()])).await;

        let outcome = processor.process_file(&task).await;
        assert_eq!(outcome, FileOutcome::Invalid);

        let summary = queues.summary(batch_id).await.unwrap();
        assert_eq!(summary.failed, 1);
        assert!(queues
            .file_pair(batch_id, task.file_id)
            .await
            .unwrap()
            .output
            .is_none());
    }

    #[tokio::test]
    async fn extraction_error_marks_extraction_failed() {
        let (processor, queues, task, batch_id) =
            processor_with(true, 1, StubBehavior::Error).await;

        let outcome = processor.process_file(&task).await;
        assert_eq!(outcome, FileOutcome::ExtractionFailed);
        let pair = queues.file_pair(batch_id, task.file_id).await.unwrap();
        assert_eq!(pair.input.status, FileStatus::ExtractionFailed);
    }

    #[tokio::test]
    async fn empty_extraction_marks_extraction_failed() {
        let (processor, _, task, _) = processor_with(true, 1, StubBehavior::Empty).await;
        assert_eq!(
            processor.process_file(&task).await,
            FileOutcome::ExtractionFailed
        );
    }

    #[tokio::test]
    async fn unacceptable_record_completes_without_output() {
        let sparse = ContactRecord {
            name: "Jane Doe".into(),
            ..ContactRecord::default()
        };
        let (processor, queues, task, batch_id) =
            processor_with(true, 1, StubBehavior::Records(vec![sparse])).await;

        let outcome = processor.process_file(&task).await;
        assert_eq!(outcome, FileOutcome::Completed { accepted: false });

        let pair = queues.file_pair(batch_id, task.file_id).await.unwrap();
        assert_eq!(pair.input.status, FileStatus::Completed);
        assert!(pair.output.is_none());
        assert!(queues.all_outputs(batch_id).await.is_empty());
    }

    #[tokio::test]
    async fn multi_page_fragments_merge_into_one_record() {
        let mut back = ContactRecord::default();
        back.phone = "9123456780".into();
        back.address = "1 Main St".into();
        let front = ContactRecord {
            name: "Jane Doe".into(),
            phone: "9876543210".into(),
            email: "jane@acme.example".into(),
            company: "Acme".into(),
            designation: NA.into(),
            address: NA.into(),
        };
        // Stub returns both fragments for each of the 2 pages; union dedup
        // collapses the repeats.
        let (processor, queues, task, batch_id) = processor_with(
            true,
            2,
            StubBehavior::Records(vec![front, back]),
        )
        .await;

        let outcome = processor.process_file(&task).await;
        assert_eq!(outcome, FileOutcome::Completed { accepted: true });

        let outputs = queues.all_outputs(batch_id).await;
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].record.phone, "9876543210,9123456780");
        assert_eq!(outputs[0].record.address, "1 Main St");
    }

    #[tokio::test]
    async fn duplicate_records_across_files_are_dropped() {
        let batch_id = Uuid::new_v4();
        let queues = QueueManager::new();
        let tasks: Vec<FileTask> = (0..2)
            .map(|i| {
                FileTask::new(
                    format!("card{}.jpg", i),
                    PathBuf::from(format!("/tmp/card{}.jpg", i)),
                    FileKind::Image,
                    0,
                )
            })
            .collect();
        queues.initialize_batch(batch_id, tasks).await;

        let processor = FileProcessor::new(
            batch_id,
            ResourceManager::new(Limits::default()),
            queues.clone(),
            Broadcaster::new(),
            Arc::new(StubPager { pages: 1 }),
            Arc::new(StubValidator { accept: true }),
            Arc::new(StubExtractor {
                behavior: StubBehavior::Records(vec![full_record()]),
            }),
        );

        let first = queues.next_waiting(batch_id).await.unwrap();
        assert_eq!(
            processor.process_file(&first).await,
            FileOutcome::Completed { accepted: true }
        );

        // Same record extracted from the second file: deduplicated
        let second = queues.next_waiting(batch_id).await.unwrap();
        assert_eq!(
            processor.process_file(&second).await,
            FileOutcome::Completed { accepted: false }
        );
        assert_eq!(queues.all_outputs(batch_id).await.len(), 1);
    }
}
