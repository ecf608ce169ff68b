//! Per-batch dual-queue tracking
//!
//! Each batch owns an input queue (files awaiting or undergoing processing)
//! and an output queue (completed results, append-only, in completion order).
//! All state for a batch lives behind that batch's own mutex; the outer map
//! is only locked to find or create the batch entry. Every value returned to
//! callers is an owned snapshot.

use crate::models::{FilePair, FileTask, OutputEntry, OutputRow};
use cardscan_common::events::{BatchSummary, FileStatus};
use cardscan_common::ContactRecord;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::warn;
use uuid::Uuid;

#[derive(Default)]
struct BatchQueues {
    input: Vec<FileTask>,
    output: Vec<OutputEntry>,
    current_file_id: Option<Uuid>,
}

impl BatchQueues {
    fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            total: self.input.len(),
            waiting: 0,
            processing: 0,
            completed: 0,
            failed: 0,
            current_file_id: self.current_file_id,
        };
        for task in &self.input {
            match task.status {
                FileStatus::Waiting => summary.waiting += 1,
                FileStatus::Completed => summary.completed += 1,
                FileStatus::Invalid | FileStatus::ExtractionFailed | FileStatus::Failed => {
                    summary.failed += 1
                }
                // Every active stage counts as processing
                FileStatus::Processing
                | FileStatus::Validating
                | FileStatus::Extracting
                | FileStatus::ProcessingData => summary.processing += 1,
            }
        }
        summary
    }
}

/// Dual queue system tracking every file of every active batch
#[derive(Clone, Default)]
pub struct QueueManager {
    batches: Arc<RwLock<HashMap<Uuid, Arc<Mutex<BatchQueues>>>>>,
}

impl QueueManager {
    pub fn new() -> Self {
        Self::default()
    }

    async fn batch(&self, batch_id: Uuid) -> Option<Arc<Mutex<BatchQueues>>> {
        self.batches.read().await.get(&batch_id).cloned()
    }

    /// Initialize batch with input queue; positions are 1-based submission order
    pub async fn initialize_batch(&self, batch_id: Uuid, mut files: Vec<FileTask>) {
        for (i, task) in files.iter_mut().enumerate() {
            task.status = FileStatus::Waiting;
            task.position = i + 1;
        }
        let queues = Arc::new(Mutex::new(BatchQueues {
            input: files,
            output: Vec::new(),
            current_file_id: None,
        }));
        self.batches.write().await.insert(batch_id, queues);
    }

    /// Atomically claim the next waiting file, transitioning it to
    /// `processing` and recording it as the batch's current file.
    ///
    /// `None` means no file is waiting - the drained-batch signal for
    /// sequential drivers.
    pub async fn next_waiting(&self, batch_id: Uuid) -> Option<FileTask> {
        let queues = self.batch(batch_id).await?;
        let mut queues = queues.lock().await;
        let current = queues
            .input
            .iter_mut()
            .find(|task| task.status == FileStatus::Waiting)?;
        current.status = FileStatus::Processing;
        let snapshot = current.clone();
        queues.current_file_id = Some(snapshot.file_id);
        Some(snapshot)
    }

    /// Update file status in the input queue
    pub async fn update_status(&self, batch_id: Uuid, file_id: Uuid, status: FileStatus) {
        let Some(queues) = self.batch(batch_id).await else {
            return;
        };
        let mut queues = queues.lock().await;
        if let Some(task) = queues.input.iter_mut().find(|t| t.file_id == file_id) {
            task.status = status;
        }
    }

    /// Append a completed file's result to the output queue, keyed by the
    /// SAME file id as its input entry, and mark the input completed.
    ///
    /// Requires a matching input entry. A second push for the same file id is
    /// ignored with a warning: the output queue is append-only and exports
    /// key on file id, so duplicates would corrupt batch accounting.
    pub async fn push_output(
        &self,
        batch_id: Uuid,
        file_id: Uuid,
        extracted_data: ContactRecord,
        processing_time: f64,
    ) {
        let Some(queues) = self.batch(batch_id).await else {
            return;
        };
        let mut queues = queues.lock().await;

        if queues.output.iter().any(|o| o.file_id == file_id) {
            warn!(batch_id = %batch_id, file_id = %file_id, "Duplicate output push ignored");
            return;
        }
        let Some(task) = queues.input.iter_mut().find(|t| t.file_id == file_id) else {
            warn!(batch_id = %batch_id, file_id = %file_id, "Output push for unknown file");
            return;
        };

        task.status = FileStatus::Completed;
        let filename = task.filename.clone();
        queues.output.push(OutputEntry {
            file_id,
            filename,
            extracted_data,
            processing_time,
            completed_at: Utc::now(),
        });
    }

    /// Get both input and output snapshots for one file id
    pub async fn file_pair(&self, batch_id: Uuid, file_id: Uuid) -> Option<FilePair> {
        let queues = self.batch(batch_id).await?;
        let queues = queues.lock().await;
        let input = queues.input.iter().find(|t| t.file_id == file_id)?.clone();
        let output = queues.output.iter().find(|o| o.file_id == file_id).cloned();
        Some(FilePair { input, output })
    }

    /// Aggregate counts, recomputed by scanning the input queue.
    ///
    /// O(n) over the batch; fine for batches capped at a few hundred files.
    pub async fn summary(&self, batch_id: Uuid) -> Option<BatchSummary> {
        let queues = self.batch(batch_id).await?;
        let queues = queues.lock().await;
        Some(queues.summary())
    }

    /// Snapshot of the full input queue
    pub async fn input_queue(&self, batch_id: Uuid) -> Vec<FileTask> {
        match self.batch(batch_id).await {
            Some(queues) => queues.lock().await.input.clone(),
            None => Vec::new(),
        }
    }

    /// Flattened outputs for export collaborators, in completion order
    pub async fn all_outputs(&self, batch_id: Uuid) -> Vec<OutputRow> {
        match self.batch(batch_id).await {
            Some(queues) => queues
                .lock()
                .await
                .output
                .iter()
                .map(|o| OutputRow {
                    file_id: o.file_id,
                    filename: o.filename.clone(),
                    record: o.extracted_data.clone(),
                })
                .collect(),
            None => Vec::new(),
        }
    }

    /// Raw output entries (with durations and completion times)
    pub async fn output_queue(&self, batch_id: Uuid) -> Vec<OutputEntry> {
        match self.batch(batch_id).await {
            Some(queues) => queues.lock().await.output.clone(),
            None => Vec::new(),
        }
    }

    /// Whether a batch is known to the queue layer
    pub async fn contains(&self, batch_id: Uuid) -> bool {
        self.batches.read().await.contains_key(&batch_id)
    }

    /// Drop a batch whose outputs have been read; frees all its tracking state
    pub async fn clear_batch(&self, batch_id: Uuid) {
        self.batches.write().await.remove(&batch_id);
    }
}
