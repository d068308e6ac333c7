//! Infinite scroll integration tests
//!
//! Tests the infinite scroll controller including:
//! - Proximity thresholds from configuration
//! - Loads wrapped in the retry executor
//! - Manual retry after exhaustion
//! - Disposal while a load is in flight

mod common;

use std::time::Duration;

use common::*;
use feedflow::config::{Config, InfiniteScrollConfig, RetryConfig};
use feedflow::error::{ControllerError, GuardRejection, OperationError};
use feedflow::scroll::{InfiniteScrollController, LoadedPage, Observation, ScrollPhase};
use tokio::time::sleep;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

const NEAR: Observation = Observation::Intersecting(true);

/// Test 1: Geometry observations honor the configured threshold
#[tokio::test]
async fn test_bounds_threshold_from_config_file() {
    tokio::time::pause();
    let file = write_yaml(
        r#"
infinite_scroll:
  threshold_px: 150
  debounce_ms: 50
"#,
    );
    let config = Config::from_file(file.path()).unwrap();
    let feed = ScriptedFeed::new(100);
    let controller = InfiniteScrollController::spawn(&config.infinite_scroll, true, feed.clone());

    let far = controller
        .observe(Observation::Bounds {
            sentinel_top: 1000.0,
            viewport_bottom: 800.0,
        })
        .await
        .unwrap();
    assert_eq!(far.rejected, Some(GuardRejection::NotIntersecting));
    assert!(!far.snapshot.debounce_armed);

    let near = controller
        .observe(Observation::Bounds {
            sentinel_top: 900.0,
            viewport_bottom: 800.0,
        })
        .await
        .unwrap();
    assert!(near.outcome().is_accepted());
    assert!(near.snapshot.debounce_armed);

    sleep(ms(60)).await;
    assert_eq!(controller.snapshot().phase, ScrollPhase::Loading);

    sleep(ms(100)).await;
    assert_eq!(controller.snapshot().phase, ScrollPhase::Observing);
    assert_eq!(feed.load_calls(), 1);
}

/// Test 2: Transient failures are retried inside a single load
#[tokio::test]
async fn test_retry_wrapped_load_recovers() {
    tokio::time::pause();
    let feed = ScriptedFeed::new(50);
    feed.queue_pages(vec![
        Err(failure("timeout")),
        Err(failure("timeout")),
        Ok(LoadedPage { has_more: false }),
    ]);
    let controller = InfiniteScrollController::spawn_with_retry(
        &InfiniteScrollConfig::default(),
        true,
        feed.clone(),
        RetryConfig::fixed(3, 100),
    );

    controller.observe(NEAR).await.unwrap();

    // Debounce ends at 100, attempts at 100, 250 and 400
    sleep(ms(200)).await;
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, ScrollPhase::Loading);
    assert!(snapshot.is_loading);
    let retry = controller.retry_executor().unwrap().state();
    assert_eq!(retry.attempt, 2);
    assert!(retry.is_retrying);

    sleep(ms(300)).await;
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, ScrollPhase::Exhausted);
    assert_eq!(snapshot.pages_loaded, 1);
    assert!(!snapshot.has_more);
    assert_eq!(snapshot.last_error, None);
    assert_eq!(feed.load_calls(), 3);

    let t = controller.observe(NEAR).await.unwrap();
    assert_eq!(t.rejected, Some(GuardRejection::NoMorePages));
}

/// Test 3: Exhausted retries park the controller until an explicit retry
#[tokio::test]
async fn test_manual_retry_after_exhaustion() {
    tokio::time::pause();
    let feed = ScriptedFeed::new(50);
    feed.queue_pages(vec![Err(failure("first")), Err(failure("second"))]);
    let controller = InfiniteScrollController::spawn_with_retry(
        &InfiniteScrollConfig::default(),
        true,
        feed.clone(),
        RetryConfig::fixed(2, 100),
    );

    controller.observe(NEAR).await.unwrap();
    sleep(ms(500)).await;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, ScrollPhase::Error);
    assert_eq!(
        snapshot.last_error,
        Some(OperationError::RetriesExhausted {
            attempts: 2,
            last_error: "Operation failed: second".to_string(),
        })
    );

    let t = controller.observe(NEAR).await.unwrap();
    assert_eq!(t.rejected, Some(GuardRejection::AwaitingRetry));

    let t = controller.retry().await.unwrap();
    assert!(t.outcome().is_accepted());
    assert_eq!(t.snapshot.phase, ScrollPhase::Loading);
    assert_eq!(t.snapshot.last_error, None);

    sleep(ms(100)).await;
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, ScrollPhase::Observing);
    assert_eq!(snapshot.pages_loaded, 1);
    assert_eq!(feed.load_calls(), 3);
}

/// Test 4: A load still running at dispose never touches the snapshot
#[tokio::test]
async fn test_dispose_drops_in_flight_result() {
    tokio::time::pause();
    let feed = ScriptedFeed::new(500);
    let controller = InfiniteScrollController::spawn(&InfiniteScrollConfig::default(), true, feed.clone());

    controller.load_now().await.unwrap();
    sleep(ms(100)).await;
    assert_eq!(feed.load_calls(), 1);

    let t = controller.dispose().await.unwrap();
    assert!(t.snapshot.disposed);

    sleep(ms(1000)).await;
    let snapshot = controller.snapshot();
    assert!(snapshot.disposed);
    assert_eq!(snapshot.pages_loaded, 0);

    assert_eq!(
        controller.observe(NEAR).await.unwrap_err(),
        ControllerError::Disposed
    );
}

/// Test 5: A caller-reported load blocks triggers until cleared
#[tokio::test]
async fn test_external_loading_flag() {
    tokio::time::pause();
    let feed = ScriptedFeed::new(10);
    let controller = InfiniteScrollController::spawn(&InfiniteScrollConfig::default(), true, feed.clone());

    controller.set_external_loading(true).await.unwrap();
    let t = controller.observe(NEAR).await.unwrap();
    assert_eq!(t.rejected, Some(GuardRejection::AlreadyLoading));
    assert!(t.snapshot.is_loading);

    controller.set_external_loading(false).await.unwrap();
    let t = controller.observe(NEAR).await.unwrap();
    assert!(t.outcome().is_accepted());

    sleep(ms(200)).await;
    assert_eq!(feed.load_calls(), 1);
}

/// Test 6: Subscribers follow the load lifecycle
#[tokio::test]
async fn test_subscriber_follows_phases() {
    tokio::time::pause();
    let feed = ScriptedFeed::new(100);
    let controller = InfiniteScrollController::spawn(&InfiniteScrollConfig::default(), true, feed);
    let mut updates = controller.subscribe();

    controller.load_now().await.unwrap();
    assert_eq!(updates.borrow_and_update().phase, ScrollPhase::Loading);

    updates.changed().await.unwrap();
    let snapshot = updates.borrow_and_update().clone();
    assert_eq!(snapshot.phase, ScrollPhase::Observing);
    assert_eq!(snapshot.pages_loaded, 1);
}
