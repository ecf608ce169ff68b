//! Event types for the cardscan push-update system
//!
//! Provides the shared `BatchEvent` enum broadcast to batch subscribers, plus
//! the supporting status/summary types shared between the queue layer and the
//! HTTP API. Events serialize with a `type` tag so clients can dispatch on
//! the wire without knowing the Rust enum.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::ContactRecord;

/// Per-file processing state.
///
/// Lifecycle: `waiting → processing → validating → {invalid | extracting}
/// → {extraction_failed | processing_data} → {completed | failed}`.
/// Terminal states are never re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Waiting,
    Processing,
    Validating,
    Extracting,
    ProcessingData,
    Completed,
    Invalid,
    ExtractionFailed,
    Failed,
}

impl FileStatus {
    /// Terminal states keep their value for the lifetime of the batch.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            FileStatus::Completed
                | FileStatus::Invalid
                | FileStatus::ExtractionFailed
                | FileStatus::Failed
        )
    }

    /// Wire name (snake_case, matching serde serialization)
    pub fn as_str(self) -> &'static str {
        match self {
            FileStatus::Waiting => "waiting",
            FileStatus::Processing => "processing",
            FileStatus::Validating => "validating",
            FileStatus::Extracting => "extracting",
            FileStatus::ProcessingData => "processing_data",
            FileStatus::Completed => "completed",
            FileStatus::Invalid => "invalid",
            FileStatus::ExtractionFailed => "extraction_failed",
            FileStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate batch counts, recomputed from the input queue on demand.
///
/// Invariant: `waiting + processing + completed + failed == total`, where
/// `processing` covers every active (non-terminal, non-waiting) state and
/// `failed` covers every unsuccessful terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub waiting: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub current_file_id: Option<Uuid>,
}

/// Per-file line in the initial snapshot sent to a new subscriber
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStatusInfo {
    pub file_id: Uuid,
    pub filename: String,
    pub status: FileStatus,
}

/// Events broadcast to subscribers of a batch.
///
/// Tag names and payload shapes are the service's wire contract; the push
/// transport (SSE, WebSocket, test harness) just forwards the serialized
/// text. Best-effort delivery: a subscriber that cannot be reached is pruned,
/// never retried.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchEvent {
    /// First message after connect: full batch/file-status snapshot
    InitialStatus {
        batch_id: Uuid,
        total_files: usize,
        files: Vec<FileStatusInfo>,
        message: String,
    },

    /// A file moved to a new stage of the pipeline
    FileUpdate {
        batch_id: Uuid,
        file_id: Uuid,
        filename: String,
        status: FileStatus,
        stage: String,
        /// Coarse stage progress: 0, 25, 50, 75, 100
        progress: u8,
    },

    /// Outcome of the document-validation stage
    ValidationResult {
        batch_id: Uuid,
        file_id: Uuid,
        filename: String,
        is_valid: bool,
        confidence: String,
        reasoning: String,
    },

    /// A file finished successfully; carries the accepted record
    ExtractionComplete {
        batch_id: Uuid,
        file_id: Uuid,
        filename: String,
        status: FileStatus,
        extracted_data: ContactRecord,
        processing_time: f64,
    },

    /// Aggregate counts changed
    BatchUpdate {
        batch_id: Uuid,
        summary: BatchSummary,
    },

    /// All files in the batch reached a terminal state
    BatchComplete {
        batch_id: Uuid,
        summary: BatchSummary,
        download_url: String,
        message: String,
    },

    /// A file failed with an unexpected error
    Error {
        batch_id: Uuid,
        file_id: Uuid,
        filename: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl BatchEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            BatchEvent::InitialStatus { .. } => "initial_status",
            BatchEvent::FileUpdate { .. } => "file_update",
            BatchEvent::ValidationResult { .. } => "validation_result",
            BatchEvent::ExtractionComplete { .. } => "extraction_complete",
            BatchEvent::BatchUpdate { .. } => "batch_update",
            BatchEvent::BatchComplete { .. } => "batch_complete",
            BatchEvent::Error { .. } => "error",
        }
    }

    /// Batch this event belongs to
    pub fn batch_id(&self) -> Uuid {
        match self {
            BatchEvent::InitialStatus { batch_id, .. }
            | BatchEvent::FileUpdate { batch_id, .. }
            | BatchEvent::ValidationResult { batch_id, .. }
            | BatchEvent::ExtractionComplete { batch_id, .. }
            | BatchEvent::BatchUpdate { batch_id, .. }
            | BatchEvent::BatchComplete { batch_id, .. }
            | BatchEvent::Error { batch_id, .. } => *batch_id,
        }
    }
}
