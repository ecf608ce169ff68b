//! End-to-end batch runs against stub collaborators

mod helpers;

use cardscan_common::events::BatchEvent;
use cardscan_ingest::broadcast::ChannelSubscriber;
use cardscan_ingest::models::{FileKind, FileTask};
use cardscan_ingest::orchestrator::DriveMode;
use helpers::{stub_app_state, test_limits, CountingExtractor};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;
use uuid::Uuid;

fn make_tasks(n: usize) -> Vec<FileTask> {
    (0..n)
        .map(|i| {
            FileTask::new(
                format!("card{}.jpg", i),
                PathBuf::from(format!("/tmp/card{}.jpg", i)),
                FileKind::Image,
                0,
            )
        })
        .collect()
}

#[tokio::test]
async fn sequential_driver_completes_every_file() {
    let extractor = CountingExtractor::new(Duration::ZERO);
    let state = stub_app_state(test_limits(), extractor.clone());
    let batch_id = Uuid::new_v4();
    state.queues.initialize_batch(batch_id, make_tasks(5)).await;

    state
        .orchestrator
        .run_batch(batch_id, DriveMode::Sequential)
        .await
        .unwrap();

    let summary = state.queues.summary(batch_id).await.unwrap();
    assert_eq!(summary.completed, 5);
    assert_eq!(summary.waiting + summary.processing + summary.failed, 0);
    assert_eq!(state.queues.all_outputs(batch_id).await.len(), 5);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 5);

    // Batch slot returned and stats archived
    let stats = state.resources.system_stats();
    assert_eq!(stats.active_batches, 0);
    assert!(state.resources.completed_stats(batch_id).is_some());
}

#[tokio::test]
async fn fanout_driver_respects_both_admission_tiers() {
    let limits = test_limits();
    let window = limits.max_concurrent_files_per_batch;
    let extractor = CountingExtractor::new(Duration::from_millis(20));
    let state = stub_app_state(limits, extractor.clone());
    let batch_id = Uuid::new_v4();
    state.queues.initialize_batch(batch_id, make_tasks(12)).await;

    state
        .orchestrator
        .run_batch(batch_id, DriveMode::FanOut)
        .await
        .unwrap();

    let summary = state.queues.summary(batch_id).await.unwrap();
    assert_eq!(summary.completed, 12);
    assert_eq!(state.queues.all_outputs(batch_id).await.len(), 12);

    // Concurrency stayed within the per-batch window (itself within the
    // global file-slot pool)
    let peak = extractor.max_in_flight.load(Ordering::SeqCst);
    assert!(peak <= window, "peak {} exceeded window {}", peak, window);
    assert!(peak >= 2, "fan-out never overlapped (peak {})", peak);
}

#[tokio::test]
async fn completion_is_broadcast_and_dead_subscribers_pruned() {
    let extractor = CountingExtractor::new(Duration::ZERO);
    let state = stub_app_state(test_limits(), extractor);
    let batch_id = Uuid::new_v4();
    state.queues.initialize_batch(batch_id, make_tasks(2)).await;

    // Healthy subscriber with plenty of buffer
    let (healthy, mut rx) = ChannelSubscriber::new(1024);
    state.broadcaster.connect(batch_id, healthy).await;

    // Dead subscriber: receiver dropped immediately
    let (dead, dead_rx) = ChannelSubscriber::new(4);
    drop(dead_rx);
    state.broadcaster.connect(batch_id, dead).await;
    assert_eq!(state.broadcaster.subscriber_count(batch_id).await, 2);

    state
        .orchestrator
        .run_batch(batch_id, DriveMode::Sequential)
        .await
        .unwrap();

    // Dead one was pruned on the first broadcast of the run
    assert_eq!(state.broadcaster.subscriber_count(batch_id).await, 1);

    let mut saw_file_update = false;
    let mut saw_extraction_complete = false;
    let mut saw_batch_complete = false;
    while let Ok(text) = rx.try_recv() {
        let event: BatchEvent = serde_json::from_str(&text).unwrap();
        match event {
            BatchEvent::FileUpdate { .. } => saw_file_update = true,
            BatchEvent::ExtractionComplete { .. } => saw_extraction_complete = true,
            BatchEvent::BatchComplete {
                summary,
                download_url,
                ..
            } => {
                saw_batch_complete = true;
                assert_eq!(summary.completed, 2);
                assert_eq!(download_url, format!("/api/v1/download/{}", batch_id));
            }
            _ => {}
        }
    }
    assert!(saw_file_update);
    assert!(saw_extraction_complete);
    assert!(saw_batch_complete);
}

#[tokio::test]
async fn oversized_batch_is_rejected_without_taking_a_slot() {
    let extractor = CountingExtractor::new(Duration::ZERO);
    let state = stub_app_state(test_limits(), extractor.clone());
    let batch_id = Uuid::new_v4();
    // 51 files against a 50-file cap
    state.queues.initialize_batch(batch_id, make_tasks(51)).await;

    let err = state
        .orchestrator
        .run_batch(batch_id, DriveMode::Sequential)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("exceeds"));

    assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    let stats = state.resources.system_stats();
    assert_eq!(stats.active_batches, 0);
    assert_eq!(stats.available_batch_slots, 2);
}

#[tokio::test]
async fn concurrent_batches_share_the_global_file_pool() {
    let limits = test_limits();
    let global = limits.max_total_concurrent_files;
    let extractor = CountingExtractor::new(Duration::from_millis(15));
    let state = stub_app_state(limits, extractor.clone());

    let first = Uuid::new_v4();
    let second = Uuid::new_v4();
    state.queues.initialize_batch(first, make_tasks(8)).await;
    state.queues.initialize_batch(second, make_tasks(8)).await;

    let a = {
        let orchestrator = state.orchestrator.clone();
        tokio::spawn(async move { orchestrator.run_batch(first, DriveMode::FanOut).await })
    };
    let b = {
        let orchestrator = state.orchestrator.clone();
        tokio::spawn(async move { orchestrator.run_batch(second, DriveMode::FanOut).await })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    assert_eq!(state.queues.summary(first).await.unwrap().completed, 8);
    assert_eq!(state.queues.summary(second).await.unwrap().completed, 8);

    let peak = extractor.max_in_flight.load(Ordering::SeqCst);
    assert!(peak <= global, "peak {} exceeded global pool {}", peak, global);
}
