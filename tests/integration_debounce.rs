//! Debounce scheduler integration tests
//!
//! Tests the debounce drivers end to end:
//! - Configuration loaded from a YAML file
//! - Leading edge and max wait behavior under real input streams
//! - Debounced search against the simulated feed

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::*;
use feedflow::config::{Config, DebounceConfig};
use feedflow::debounce::{debounce, debounce_callback, DebouncedSearch};
use feedflow::error::ControllerError;
use feedflow::replay::{FeedSpec, SimulatedFeed};
use tokio::time::{sleep, Instant};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Test 1: Debounce settings are read from a config file
#[tokio::test]
async fn test_debounce_from_config_file() {
    tokio::time::pause();
    let file = write_yaml(
        r#"
debounce:
  delay_ms: 120
"#,
    );
    let config = Config::from_file(file.path()).unwrap();
    let value = debounce(0u32, &config.debounce);

    value.set(7).unwrap();
    sleep(ms(119)).await;
    assert_eq!(value.value(), 0);

    sleep(ms(2)).await;
    assert_eq!(value.value(), 7);
}

/// Test 2: Max wait forces emissions during continuous input
#[tokio::test]
async fn test_max_wait_under_continuous_input() {
    tokio::time::pause();
    let start = Instant::now();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = calls.clone();
    let config = DebounceConfig {
        delay_ms: 100,
        max_wait_ms: Some(250),
        ..Default::default()
    };
    let cb = debounce_callback(
        move |n: u32| sink.lock().unwrap().push((n, Instant::now() - start)),
        &config,
    );

    // One input every 40ms, never quiet for 100ms
    for n in 0..15 {
        cb.call(n).unwrap();
        sleep(ms(40)).await;
    }
    sleep(ms(500)).await;

    let calls = calls.lock().unwrap();
    let values: Vec<u32> = calls.iter().map(|(n, _)| *n).collect();
    assert_eq!(values, vec![6, 13, 14]);
    assert!(calls[0].1 >= ms(250) && calls[0].1 <= ms(251));
    assert!(calls[1].1 >= ms(530) && calls[1].1 <= ms(531));
    assert!(calls[2].1 >= ms(660) && calls[2].1 <= ms(661));
}

/// Test 3: Leading-only debounce fires at the start of each burst
#[tokio::test]
async fn test_leading_edge_only() {
    tokio::time::pause();
    let config = DebounceConfig {
        delay_ms: 100,
        leading: true,
        trailing: false,
        ..Default::default()
    };
    let value = debounce(0u32, &config);

    value.set(1).unwrap();
    sleep(ms(10)).await;
    assert_eq!(value.value(), 1);

    // Inside the window: held back, and dropped without a trailing edge
    value.set(2).unwrap();
    sleep(ms(200)).await;
    assert_eq!(value.value(), 1);
    assert!(!value.is_pending().await.unwrap());

    value.set(3).unwrap();
    sleep(ms(1)).await;
    assert_eq!(value.value(), 3);
}

/// Test 4: Clones share one scheduler and dispose closes all of them
#[tokio::test]
async fn test_clones_share_scheduler() {
    tokio::time::pause();
    let value = debounce(String::new(), &DebounceConfig::with_delay(50));
    let other = value.clone();

    value.set("from first".to_string()).unwrap();
    sleep(ms(20)).await;
    other.set("from second".to_string()).unwrap();
    sleep(ms(100)).await;
    assert_eq!(value.value(), "from second");

    other.dispose();
    settle().await;
    assert!(value.is_disposed());
    assert_eq!(value.set("late".to_string()), Err(ControllerError::Disposed));
}

/// Test 5: Typing into the search box runs one search for the final query
#[tokio::test]
async fn test_search_against_simulated_feed() {
    tokio::time::pause();
    let feed = Arc::new(SimulatedFeed::new(&FeedSpec::default()));
    let search = DebouncedSearch::new(feed, "", &DebounceConfig::with_delay(300));

    for query in ["r", "ru", "rus", "rust"] {
        search.input(query).unwrap();
        sleep(ms(50)).await;
    }

    // 300ms quiet period, then 200ms simulated latency
    sleep(ms(400)).await;
    assert!(search.state().is_searching);

    sleep(ms(100)).await;
    let state = search.state();
    assert!(!state.is_searching);
    assert_eq!(state.debounced_query, "rust");
    assert_eq!(state.searches_started, 1);
    assert_eq!(state.results.len(), 10);
    assert!(state.results.iter().all(|title| title.starts_with("Rust story")));
}
