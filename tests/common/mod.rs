//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use feedflow::error::OperationError;
use feedflow::gesture::RefreshHandler;
use feedflow::scroll::{LoadedPage, PageLoader};
use tempfile::NamedTempFile;
use tokio::time::sleep;

/// Feed whose page loads and refreshes follow a queued script
///
/// Once a script runs dry every call succeeds (`has_more: true` for pages).
pub struct ScriptedFeed {
    latency: Duration,
    pages: Mutex<VecDeque<Result<LoadedPage, OperationError>>>,
    refreshes: Mutex<VecDeque<Result<(), OperationError>>>,
    load_calls: AtomicU32,
    refresh_calls: AtomicU32,
}

impl ScriptedFeed {
    pub fn new(latency_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            latency: Duration::from_millis(latency_ms),
            pages: Mutex::new(VecDeque::new()),
            refreshes: Mutex::new(VecDeque::new()),
            load_calls: AtomicU32::new(0),
            refresh_calls: AtomicU32::new(0),
        })
    }

    /// Queue the results of upcoming page loads
    pub fn queue_pages(&self, results: Vec<Result<LoadedPage, OperationError>>) {
        self.pages.lock().unwrap().extend(results);
    }

    /// Queue the results of upcoming refreshes
    pub fn queue_refreshes(&self, results: Vec<Result<(), OperationError>>) {
        self.refreshes.lock().unwrap().extend(results);
    }

    pub fn load_calls(&self) -> u32 {
        self.load_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageLoader for ScriptedFeed {
    async fn load_more(&self) -> Result<LoadedPage, OperationError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        sleep(self.latency).await;
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(LoadedPage { has_more: true }))
    }
}

#[async_trait]
impl RefreshHandler for ScriptedFeed {
    async fn refresh(&self) -> Result<(), OperationError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        sleep(self.latency).await;
        self.refreshes.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

/// Shorthand for a failed operation
pub fn failure(message: &str) -> OperationError {
    OperationError::failed(message)
}

/// Write `contents` to a temporary YAML file kept alive by the handle
pub fn write_yaml(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(contents.as_bytes())
        .expect("Failed to write temp file");
    file
}

/// Let spawned tasks run to their next await point
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
