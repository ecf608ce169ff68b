//! Data model for batches and per-file tracking

use cardscan_common::events::FileStatus;
use cardscan_common::ContactRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Kind of uploaded document, decided at upload time from the sniffed type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Image,
    Pdf,
}

/// One file's entry in a batch input queue.
///
/// Exclusively owned by its batch; every mutation goes through the
/// QueueManager under the batch's lock. Values handed out of the queue layer
/// are snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTask {
    pub file_id: Uuid,
    pub filename: String,
    /// Where the uploaded bytes live on disk
    pub path: PathBuf,
    pub kind: FileKind,
    pub status: FileStatus,
    /// 1-based submission-order position
    pub position: usize,
    pub uploaded_at: DateTime<Utc>,
}

impl FileTask {
    pub fn new(filename: String, path: PathBuf, kind: FileKind, position: usize) -> Self {
        Self {
            file_id: Uuid::new_v4(),
            filename,
            path,
            kind,
            status: FileStatus::Waiting,
            position,
            uploaded_at: Utc::now(),
        }
    }
}

/// A completed file's result in the output queue.
///
/// Keyed by the same file id as the input entry; appended exactly once and
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputEntry {
    pub file_id: Uuid,
    pub filename: String,
    pub extracted_data: ContactRecord,
    /// Wall-clock processing duration in seconds
    pub processing_time: f64,
    pub completed_at: DateTime<Utc>,
}

/// Input and (optional) output snapshots for one file id
#[derive(Debug, Clone, Serialize)]
pub struct FilePair {
    pub input: FileTask,
    pub output: Option<OutputEntry>,
}

/// Flattened export view over an output entry
#[derive(Debug, Clone, Serialize)]
pub struct OutputRow {
    pub file_id: Uuid,
    pub filename: String,
    #[serde(flatten)]
    pub record: ContactRecord,
}
