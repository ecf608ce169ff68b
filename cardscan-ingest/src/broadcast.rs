//! Fan-out of batch events to push subscribers
//!
//! The broadcaster keeps a per-batch registry of opaque subscribers and is
//! agnostic to the wire protocol behind them. Delivery is best-effort: the
//! subscriber list is snapshotted under the registry lock, sends happen
//! outside it, and any subscriber whose send fails is dropped from the
//! registry after the pass. No retries, no buffering beyond what the
//! transport itself provides.

use async_trait::async_trait;
use cardscan_common::events::BatchEvent;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

/// The subscriber's transport is gone; it will be pruned.
#[derive(Debug, thiserror::Error)]
#[error("subscriber disconnected")]
pub struct SubscriberClosed;

/// An opaque push channel to one connected client.
///
/// `send` takes serialized event text; implementations decide what a failed
/// send means, but returning an error marks the subscriber dead.
#[async_trait]
pub trait Subscriber: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), SubscriberClosed>;
}

/// Manage push subscribers for real-time batch updates
#[derive(Clone, Default)]
pub struct Broadcaster {
    subscribers: Arc<Mutex<HashMap<Uuid, Vec<Arc<dyn Subscriber>>>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber for a batch.
    ///
    /// The caller is expected to push an initial status snapshot through the
    /// returned handle right after connecting.
    pub async fn connect(&self, batch_id: Uuid, subscriber: Arc<dyn Subscriber>) {
        let mut subscribers = self.subscribers.lock().await;
        subscribers.entry(batch_id).or_default().push(subscriber);
        debug!(batch_id = %batch_id, "Subscriber connected");
    }

    /// Remove a subscriber; drops the batch entry once empty
    pub async fn disconnect(&self, batch_id: Uuid, subscriber: &Arc<dyn Subscriber>) {
        let mut subscribers = self.subscribers.lock().await;
        if let Some(list) = subscribers.get_mut(&batch_id) {
            list.retain(|s| !Arc::ptr_eq(s, subscriber));
            if list.is_empty() {
                subscribers.remove(&batch_id);
            }
        }
        debug!(batch_id = %batch_id, "Subscriber disconnected");
    }

    /// Broadcast an event to every subscriber of a batch.
    ///
    /// Serializes once, sends to a snapshot of the registry taken under lock,
    /// and prunes subscribers whose send failed.
    pub async fn broadcast(&self, batch_id: Uuid, event: &BatchEvent) {
        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(e) => {
                warn!(batch_id = %batch_id, error = %e, "Failed to serialize event");
                return;
            }
        };

        // Snapshot under lock, send outside it
        let snapshot: Vec<Arc<dyn Subscriber>> = {
            let subscribers = self.subscribers.lock().await;
            match subscribers.get(&batch_id) {
                Some(list) => list.clone(),
                None => return,
            }
        };

        let mut dead: Vec<Arc<dyn Subscriber>> = Vec::new();
        for subscriber in &snapshot {
            if subscriber.send(&text).await.is_err() {
                dead.push(Arc::clone(subscriber));
            }
        }

        if !dead.is_empty() {
            debug!(
                batch_id = %batch_id,
                pruned = dead.len(),
                event = event.event_type(),
                "Pruning dead subscribers"
            );
            let mut subscribers = self.subscribers.lock().await;
            if let Some(list) = subscribers.get_mut(&batch_id) {
                list.retain(|s| !dead.iter().any(|d| Arc::ptr_eq(s, d)));
                if list.is_empty() {
                    subscribers.remove(&batch_id);
                }
            }
        }
    }

    /// Send one event to a single subscriber (used for the initial snapshot)
    pub async fn send_to(
        &self,
        subscriber: &Arc<dyn Subscriber>,
        event: &BatchEvent,
    ) -> Result<(), SubscriberClosed> {
        let text = serde_json::to_string(event).map_err(|_| SubscriberClosed)?;
        subscriber.send(&text).await
    }

    /// Number of live subscribers for a batch (diagnostics)
    pub async fn subscriber_count(&self, batch_id: Uuid) -> usize {
        self.subscribers
            .lock()
            .await
            .get(&batch_id)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

/// Channel-backed subscriber used by the SSE transport.
///
/// A full channel drops the message (best-effort, the client is lagging);
/// a closed channel means the client is gone and the subscriber gets pruned.
pub struct ChannelSubscriber {
    tx: mpsc::Sender<String>,
}

impl ChannelSubscriber {
    pub fn new(capacity: usize) -> (Arc<dyn Subscriber>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl Subscriber for ChannelSubscriber {
    async fn send(&self, text: &str) -> Result<(), SubscriberClosed> {
        match self.tx.try_send(text.to_string()) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SubscriberClosed),
        }
    }
}
