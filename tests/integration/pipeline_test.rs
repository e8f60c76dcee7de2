//! Live pipeline integration tests
//!
//! Drive the supervisor through `MemoryStore` with tokio's paused clock, so
//! backoff delays elapse instantly but in order.

use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;

use roadrescue_live::backend::error::FeedError;
use roadrescue_live::backend::feed::{ConsumerState, LivePipeline};
use roadrescue_live::backend::realtime::ChannelRegistry;
use roadrescue_live::shared::{EventType, RoomId};

use crate::common::*;
use crate::{assert_receives, assert_silent};

const P: &str = "64f0c2aa9b1e8a0012345678";
const Q: &str = "64f0c2aa9b1e8a0087654321";

fn with_status(mut document: serde_json::Value, index: usize, status: &str) -> serde_json::Value {
    document["serviceRequests"][index]["status"] = json!(status);
    document
}

#[tokio::test(start_paused = true)]
async fn test_request_update_reaches_only_owner_room() {
    let store = MemoryStore::new();
    store.put_document(P, with_status(provider(P, "Quick Tow", 2), 1, "accepted"));
    let pipeline = start_pipeline(&store, &test_config());
    let registry = pipeline.registry().clone();

    let (_, mut owner) = subscriber(&registry, Some(P)).await;
    let (_, mut other) = subscriber(&registry, Some(Q)).await;
    let (_, mut lobby) = subscriber(&registry, None).await;
    store.wait_for_opens(1).await;

    store.push(request_update(P, 1, "accepted"));

    let event = assert_receives!(owner);
    assert_eq!(event.event, EventType::ServiceRequestUpdated);
    assert_eq!(event.data, json!({ "requestId": "r1", "status": "accepted" }));
    assert_silent!(other);
    assert_silent!(lobby);

    pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_catalog_append_reaches_every_subscriber_once() {
    let store = MemoryStore::new();
    let mut document = provider(Q, "Road Angels", 0);
    document["services"]
        .as_array_mut()
        .unwrap()
        .push(json!({ "name": "Flat tire", "price": 30 }));
    store.put_document(Q, document);

    let pipeline = start_pipeline(&store, &test_config());
    let registry = pipeline.registry().clone();
    let mut receivers = Vec::new();
    for room in [Some(P), Some(Q), None] {
        receivers.push(subscriber(&registry, room).await.1);
    }
    store.wait_for_opens(1).await;

    store.push(catalog_append(Q, 2, json!({ "name": "Flat tire", "price": 30 })));

    for receiver in receivers.iter_mut() {
        let event = assert_receives!(receiver);
        assert_eq!(event.event, EventType::ServicesUpdated);
        assert_eq!(
            event.data,
            json!([{
                "id": Q,
                "name": "Road Angels",
                "services": [{ "name": "Flat tire", "price": 30 }]
            }])
        );
    }
    for receiver in receivers.iter_mut() {
        assert_silent!(receiver);
    }

    pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_feed_order_is_preserved() {
    let store = MemoryStore::new();
    store.put_document(P, provider(P, "Quick Tow", 5));
    let pipeline = start_pipeline(&store, &test_config());
    let (_, mut owner) = subscriber(pipeline.registry(), Some(P)).await;
    store.wait_for_opens(1).await;

    for index in 0..5 {
        store.push(request_update(P, index, "pending"));
    }

    for index in 0..5 {
        let event = assert_receives!(owner);
        assert_eq!(event.data["requestId"], format!("r{}", index));
    }

    pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_untracked_and_unknown_changes_are_dropped() {
    let store = MemoryStore::new();
    store.put_document(P, provider(P, "Quick Tow", 1));
    let pipeline = start_pipeline(&store, &test_config());
    let (_, mut owner) = subscriber(pipeline.registry(), Some(P)).await;
    store.wait_for_opens(1).await;

    store.push(roadrescue_live::shared::ChangeRecord::update(
        roadrescue_live::shared::DocumentId::new(P),
        vec![("phone".to_string(), json!("555-0100"))],
        Vec::new(),
    ));
    store.push(request_update("ghost", 0, "accepted"));
    store.push(request_update(P, 0, "pending"));

    let event = assert_receives!(owner);
    assert_eq!(event.data["requestId"], "r0");
    assert_silent!(owner);
    assert_eq!(store.lookups(), 2);
    assert_eq!(pipeline.state(), ConsumerState::Streaming);

    pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_feed_drop_backs_off_and_resumes() {
    let store = MemoryStore::new();
    store.put_document(P, provider(P, "Quick Tow", 2));
    let pipeline = start_pipeline(&store, &test_config());
    let (_, mut owner) = subscriber(pipeline.registry(), Some(P)).await;
    store.wait_for_opens(1).await;
    wait_for_state(&pipeline, ConsumerState::Streaming).await;

    let token = store.push(request_update(P, 0, "pending"));
    assert_receives!(owner);

    let dropped_at = Instant::now();
    store.fail_feed(FeedError::transient("connection reset"));
    wait_for_state(&pipeline, ConsumerState::Backoff).await;

    store.wait_for_opens(2).await;
    wait_for_state(&pipeline, ConsumerState::Streaming).await;
    assert!(dropped_at.elapsed() >= Duration::from_secs(1));
    assert_eq!(store.watch_attempts(), 2);
    assert_eq!(store.watched_with(), vec![None, Some(token)]);

    store.push(request_update(P, 1, "pending"));
    let event = assert_receives!(owner);
    assert_eq!(event.data["requestId"], "r1");

    pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_invalidate_restarts_without_token() {
    let store = MemoryStore::new();
    let pipeline = start_pipeline(&store, &test_config());
    store.wait_for_opens(1).await;

    store.push(request_update("ghost", 0, "pending"));
    store.invalidate();
    store.wait_for_opens(2).await;

    assert_eq!(store.watched_with(), vec![None, None]);
    pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_rejected_resume_position_restarts_from_now() {
    let store = MemoryStore::new();
    store.put_document(P, provider(P, "Quick Tow", 2));
    let pipeline = start_pipeline(&store, &config_with_attempts(3));
    let (_, mut owner) = subscriber(pipeline.registry(), Some(P)).await;
    store.wait_for_opens(1).await;

    let token = store.push(request_update(P, 0, "pending"));
    assert_receives!(owner);

    // The retained position has aged out of the store's history
    store.fail_next_opens(1, FeedError::resume_lost("ChangeStreamHistoryLost"));
    store.fail_feed(FeedError::transient("connection reset"));
    store.wait_for_opens(2).await;
    wait_for_state(&pipeline, ConsumerState::Streaming).await;

    assert_eq!(store.watch_attempts(), 3);
    assert_eq!(store.watched_with(), vec![None, Some(token), None]);

    store.push(request_update(P, 1, "accepted"));
    assert_eq!(assert_receives!(owner).data["requestId"], "r1");

    pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_repeated_resume_rejections_never_degrade() {
    let store = MemoryStore::new();
    let pipeline = start_pipeline(&store, &config_with_attempts(2));
    store.wait_for_opens(1).await;
    store.push(request_update("ghost", 0, "pending"));

    // Only the first attempt carries a token; the retry starts fresh
    store.fail_next_opens(1, FeedError::resume_lost("InvalidResumeToken"));
    store.fail_feed(FeedError::transient("connection reset"));
    store.wait_for_opens(2).await;
    wait_for_state(&pipeline, ConsumerState::Streaming).await;

    assert_eq!(store.watch_attempts(), 3);
    assert_eq!(store.watched_with().last(), Some(&None));
    pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_consecutive_failures_degrade() {
    let store = MemoryStore::new();
    store.fail_next_opens(3, FeedError::transient("no route to host"));
    let started = Instant::now();
    let pipeline = start_pipeline(&store, &config_with_attempts(3));

    wait_for_state(&pipeline, ConsumerState::Degraded).await;
    assert_eq!(store.watch_attempts(), 3);
    // Waits of 1s and 2s separate the three attempts
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert!(started.elapsed() < Duration::from_secs(7));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(store.watch_attempts(), 3);
    assert_eq!(pipeline.state(), ConsumerState::Degraded);

    // The rest of the system keeps working
    let (_, _receiver) = subscriber(pipeline.registry(), Some(P)).await;
    assert_eq!(pipeline.registry().subscriber_count().await, 1);

    pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_streaming_resets_failure_count() {
    let store = MemoryStore::new();
    store.fail_next_opens(2, FeedError::transient("timeout"));
    let pipeline = start_pipeline(&store, &config_with_attempts(3));
    store.wait_for_opens(1).await;
    wait_for_state(&pipeline, ConsumerState::Streaming).await;

    store.fail_next_opens(2, FeedError::transient("timeout"));
    store.fail_feed(FeedError::transient("connection reset"));
    store.wait_for_opens(2).await;
    wait_for_state(&pipeline, ConsumerState::Streaming).await;

    assert_eq!(store.watch_attempts(), 6);
    pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_fatal_open_degrades_immediately() {
    let store = MemoryStore::new();
    store.fail_next_opens(1, FeedError::fatal("change streams need a replica set"));
    let pipeline = start_pipeline(&store, &config_with_attempts(5));

    wait_for_state(&pipeline, ConsumerState::Degraded).await;
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(store.watch_attempts(), 1);

    pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_fatal_feed_error_degrades() {
    let store = MemoryStore::new();
    let pipeline = start_pipeline(&store, &test_config());
    store.wait_for_opens(1).await;

    store.fail_feed(FeedError::fatal("unauthorized"));
    wait_for_state(&pipeline, ConsumerState::Degraded).await;
    assert_eq!(store.watch_attempts(), 1);

    pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_is_ordered_and_idempotent() {
    let store = MemoryStore::new();
    let pipeline = start_pipeline(&store, &test_config());
    let (_, mut receiver) = subscriber(pipeline.registry(), Some(P)).await;
    store.wait_for_opens(1).await;

    pipeline.shutdown().await;

    assert_eq!(pipeline.state(), ConsumerState::Disconnected);
    assert!(receiver.recv().await.is_none());
    assert!(store.is_closed());
    assert!(pipeline.registry().register().await.is_none());

    pipeline.shutdown().await;
    assert_eq!(store.watch_attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_backoff_timer() {
    let store = MemoryStore::new();
    store.fail_next_opens(1, FeedError::transient("refused"));
    let config = roadrescue_live::shared::LiveConfig::builder()
        .backoff(Duration::from_secs(30), Duration::from_secs(60))
        .build()
        .unwrap();
    let pipeline = start_pipeline(&store, &config);
    wait_for_state(&pipeline, ConsumerState::Backoff).await;

    let started = Instant::now();
    pipeline.shutdown().await;
    assert!(started.elapsed() < Duration::from_secs(30));
    assert_eq!(store.watch_attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_pipeline_reports_degraded() {
    let pipeline = LivePipeline::disabled(ChannelRegistry::new(4));
    assert_eq!(pipeline.state(), ConsumerState::Degraded);

    let (_, mut receiver) = subscriber(pipeline.registry(), Some(P)).await;
    assert_eq!(pipeline.registry().room_size(&RoomId::new(P)).await, 1);

    pipeline.shutdown().await;
    assert!(receiver.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_last_handle_stops_supervisor() {
    let store = MemoryStore::new();
    store.fail_next_opens(1, FeedError::transient("refused"));
    let pipeline = start_pipeline(&store, &test_config());
    wait_for_state(&pipeline, ConsumerState::Backoff).await;

    drop(pipeline);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(store.watch_attempts(), 1);
}
