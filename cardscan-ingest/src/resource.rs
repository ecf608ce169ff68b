//! Global admission control for batches and file operations
//!
//! Two independent tiers bound the work in flight: batch slots cap how many
//! users are being served at once, and a global file-slot pool caps extraction
//! calls across all batches so one large batch cannot monopolize the system.
//! Slot acquisition suspends the caller until capacity frees; there is no
//! timeout and no documented wakeup fairness beyond the semaphore's own
//! waiter queue. Both tiers hand out RAII guards, so a slot is returned on
//! every exit path.

use crate::error::AdmissionError;
use cardscan_common::config::Limits;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;
use uuid::Uuid;

/// Bookkeeping for one admitted batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchStats {
    pub files_count: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// File slots granted to this batch so far
    pub processed_files: usize,
}

/// Snapshot of current resource usage
#[derive(Debug, Clone, Serialize)]
pub struct SystemStats {
    pub active_batches: usize,
    pub max_concurrent_batches: usize,
    pub available_batch_slots: usize,
    pub available_file_slots: usize,
    pub active_batch_details: HashMap<Uuid, BatchStats>,
}

struct Inner {
    limits: Limits,
    batch_slots: Arc<Semaphore>,
    file_slots: Arc<Semaphore>,
    // Active/completed maps only; permits themselves live in the guards
    state: Mutex<StatsState>,
}

#[derive(Default)]
struct StatsState {
    active: HashMap<Uuid, BatchStats>,
    completed: HashMap<Uuid, BatchStats>,
}

/// Manages system resources and ensures fair allocation across users
#[derive(Clone)]
pub struct ResourceManager {
    inner: Arc<Inner>,
}

impl ResourceManager {
    pub fn new(limits: Limits) -> Self {
        Self {
            inner: Arc::new(Inner {
                batch_slots: Arc::new(Semaphore::new(limits.max_concurrent_batches)),
                file_slots: Arc::new(Semaphore::new(limits.max_total_concurrent_files)),
                state: Mutex::new(StatsState::default()),
                limits,
            }),
        }
    }

    pub fn limits(&self) -> &Limits {
        &self.inner.limits
    }

    /// Validate if batch size is within limits
    pub fn validate_batch_size(&self, files_count: usize) -> bool {
        files_count <= self.inner.limits.max_files_per_batch
    }

    /// Acquire a slot for batch processing.
    ///
    /// Oversized batches are rejected synchronously before any slot is taken.
    /// Otherwise suspends until one of the batch slots frees, then records
    /// the batch as active with a zeroed processed-file counter. The returned
    /// guard frees the slot and moves the batch to completed stats when
    /// dropped or explicitly released.
    pub async fn acquire_batch_slot(
        &self,
        batch_id: Uuid,
        files_count: usize,
    ) -> Result<BatchSlot, AdmissionError> {
        if !self.validate_batch_size(files_count) {
            return Err(AdmissionError::BatchTooLarge {
                count: files_count,
                limit: self.inner.limits.max_files_per_batch,
            });
        }

        let permit = self
            .inner
            .batch_slots
            .clone()
            .acquire_owned()
            .await
            .expect("batch semaphore closed");

        {
            let mut state = self.inner.state.lock().expect("resource state poisoned");
            state.active.insert(
                batch_id,
                BatchStats {
                    files_count,
                    start_time: Utc::now(),
                    end_time: None,
                    processed_files: 0,
                },
            );
        }

        debug!(batch_id = %batch_id, files = files_count, "Batch slot acquired");

        Ok(BatchSlot {
            batch_id,
            inner: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Acquire a slot for processing a single file.
    ///
    /// Suspends until one of the global file slots frees; counts the grant
    /// against the owning batch. The slot returns to the pool when the guard
    /// drops, whatever the outcome of the file.
    pub async fn acquire_file_slot(&self, batch_id: Uuid) -> FileSlot {
        let permit = self
            .inner
            .file_slots
            .clone()
            .acquire_owned()
            .await
            .expect("file semaphore closed");

        {
            let mut state = self.inner.state.lock().expect("resource state poisoned");
            if let Some(stats) = state.active.get_mut(&batch_id) {
                stats.processed_files += 1;
            }
        }

        FileSlot {
            batch_id,
            _permit: permit,
        }
    }

    /// Get current system resource usage statistics
    pub fn system_stats(&self) -> SystemStats {
        let state = self.inner.state.lock().expect("resource state poisoned");
        SystemStats {
            active_batches: state.active.len(),
            max_concurrent_batches: self.inner.limits.max_concurrent_batches,
            available_batch_slots: self.inner.batch_slots.available_permits(),
            available_file_slots: self.inner.file_slots.available_permits(),
            active_batch_details: state.active.clone(),
        }
    }

    /// Stats for batches that have released their slot
    pub fn completed_stats(&self, batch_id: Uuid) -> Option<BatchStats> {
        let state = self.inner.state.lock().expect("resource state poisoned");
        state.completed.get(&batch_id).cloned()
    }
}

/// RAII guard for an admitted batch.
///
/// Dropping the guard stamps the end time, moves the batch from active to
/// completed stats and frees the slot, waking at most one waiter.
pub struct BatchSlot {
    batch_id: Uuid,
    inner: Arc<Inner>,
    _permit: OwnedSemaphorePermit,
}

impl std::fmt::Debug for BatchSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchSlot")
            .field("batch_id", &self.batch_id)
            .finish_non_exhaustive()
    }
}

impl BatchSlot {
    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    /// Release batch slot when processing is complete
    pub fn release(self) {
        // Drop does the work
    }
}

impl Drop for BatchSlot {
    fn drop(&mut self) {
        if let Ok(mut state) = self.inner.state.lock() {
            if let Some(mut stats) = state.active.remove(&self.batch_id) {
                stats.end_time = Some(Utc::now());
                state.completed.insert(self.batch_id, stats);
            }
        }
        debug!(batch_id = %self.batch_id, "Batch slot released");
    }
}

/// RAII guard for one in-flight file operation
pub struct FileSlot {
    batch_id: Uuid,
    _permit: OwnedSemaphorePermit,
}

impl FileSlot {
    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }
}
