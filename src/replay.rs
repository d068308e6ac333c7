//! Scripted replay of a feed session
//!
//! Drives the search, infinite-scroll and pull-to-refresh controllers
//! against an in-memory feed, following a YAML timeline of user actions,
//! and summarizes what the controllers did.
//!
//! ```yaml
//! feed:
//!   total_items: 45
//!   page_size: 10
//!   latency_ms: 200
//!   failing_pages: [3]
//! steps:
//!   - at_ms: 0
//!     action: keystroke
//!     text: "ru"
//!   - at_ms: 400
//!     action: observe
//!     intersecting: true
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info};

use crate::config::Config;
use crate::debounce::{DebouncedSearch, SearchHandler};
use crate::error::{AppError, GuardRejection, OperationError};
use crate::gesture::{GesturePhase, PullToRefreshController, RefreshHandler, TouchEvent};
use crate::machine::Transition;
use crate::scroll::{InfiniteScrollController, LoadedPage, Observation, PageLoader, ScrollPhase};

/// Shape and behavior of the simulated feed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedSpec {
    /// Number of items in the feed
    #[serde(default = "default_total_items")]
    pub total_items: usize,

    /// Items per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Latency of every page load, search and refresh
    #[serde(default = "default_latency")]
    pub latency_ms: u64,

    /// 1-based page numbers whose first load attempt fails
    #[serde(default)]
    pub failing_pages: Vec<usize>,

    /// Number of initial refreshes that fail
    #[serde(default)]
    pub failing_refreshes: u32,

    /// Pages already shown when the session starts
    #[serde(default = "default_initial_pages")]
    pub initial_pages: usize,
}

impl Default for FeedSpec {
    fn default() -> Self {
        Self {
            total_items: default_total_items(),
            page_size: default_page_size(),
            latency_ms: default_latency(),
            failing_pages: Vec::new(),
            failing_refreshes: 0,
            initial_pages: default_initial_pages(),
        }
    }
}

fn default_total_items() -> usize {
    50
}

fn default_page_size() -> usize {
    10
}

fn default_latency() -> u64 {
    200
}

fn default_initial_pages() -> usize {
    1
}

fn default_settle() -> u64 {
    2000
}

/// One user action in the timeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Replace the search box content
    Keystroke { text: String },
    /// Search the pending query now
    Submit,
    /// Native intersection observer callback
    Observe { intersecting: bool },
    /// Raw sentinel geometry
    ScrollBounds {
        sentinel_top: f64,
        viewport_bottom: f64,
    },
    LoadMore,
    RetryLoad,
    TouchStart {
        y: f64,
        #[serde(default)]
        scroll_top: f64,
    },
    TouchMove { y: f64 },
    TouchEnd,
    TouchCancel,
    /// Refresh without a gesture
    Refresh,
    /// Toggle both the scroll and refresh controllers
    SetEnabled { enabled: bool },
}

impl Action {
    fn name(&self) -> &'static str {
        match self {
            Action::Keystroke { .. } => "keystroke",
            Action::Submit => "submit",
            Action::Observe { .. } => "observe",
            Action::ScrollBounds { .. } => "scroll_bounds",
            Action::LoadMore => "load_more",
            Action::RetryLoad => "retry_load",
            Action::TouchStart { .. } => "touch_start",
            Action::TouchMove { .. } => "touch_move",
            Action::TouchEnd => "touch_end",
            Action::TouchCancel => "touch_cancel",
            Action::Refresh => "refresh",
            Action::SetEnabled { .. } => "set_enabled",
        }
    }
}

/// An action at an offset from the start of the session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: Action,
}

/// A replay timeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplayScript {
    #[serde(default)]
    pub feed: FeedSpec,

    /// Search box content at the start; emissions equal to it are not searched
    #[serde(default)]
    pub initial_query: String,

    /// Run page loads and refreshes through the retry executor
    #[serde(default)]
    pub use_retry: bool,

    /// Time to let pending work finish after the last step
    #[serde(default = "default_settle")]
    pub settle_ms: u64,

    pub steps: Vec<Step>,
}

impl ReplayScript {
    /// Load a script from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            AppError::Replay(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse a script from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, AppError> {
        let script: ReplayScript =
            serde_yaml::from_str(yaml).map_err(|e| AppError::Replay(e.to_string()))?;
        if script.feed.page_size == 0 {
            return Err(AppError::Replay("feed.page_size must be positive".to_string()));
        }
        Ok(script)
    }
}

/// A trigger skipped by a controller guard
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SkippedAction {
    pub at_ms: u64,
    pub action: String,
    pub reason: String,
}

/// What happened during a replay
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReplayReport {
    pub pages_loaded: u64,
    pub items_loaded: usize,
    pub has_more: bool,
    pub scroll_phase: ScrollPhase,
    pub scroll_error: Option<String>,
    pub loader_calls: u32,
    pub refreshes_started: u64,
    pub refresh_calls: u32,
    pub refresh_phase: GesturePhase,
    pub refresh_error: Option<String>,
    /// Touch moves that suppressed native scrolling
    pub prevented_moves: u32,
    pub debounced_query: String,
    pub searches_started: u64,
    pub search_hits: usize,
    pub search_error: Option<String>,
    pub skipped: Vec<SkippedAction>,
}

/// In-memory paginated feed
pub struct SimulatedFeed {
    titles: Vec<String>,
    page_size: usize,
    latency: Duration,
    loaded: Mutex<usize>,
    failing_pages: Mutex<HashSet<usize>>,
    failing_refreshes: u32,
    loader_calls: AtomicU32,
    refresh_calls: AtomicU32,
}

impl SimulatedFeed {
    pub fn new(spec: &FeedSpec) -> Self {
        const TOPICS: [&str; 5] = ["Rust", "Async", "Design", "Mobile", "Testing"];
        let titles = (1..=spec.total_items)
            .map(|n| format!("{} story {}", TOPICS[n % TOPICS.len()], n))
            .collect();
        let initial = (spec.initial_pages * spec.page_size).min(spec.total_items);

        Self {
            titles,
            page_size: spec.page_size,
            latency: Duration::from_millis(spec.latency_ms),
            loaded: Mutex::new(initial),
            failing_pages: Mutex::new(spec.failing_pages.iter().copied().collect()),
            failing_refreshes: spec.failing_refreshes,
            loader_calls: AtomicU32::new(0),
            refresh_calls: AtomicU32::new(0),
        }
    }

    /// Items currently shown
    pub fn loaded(&self) -> usize {
        *self.loaded.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn has_more(&self) -> bool {
        self.loaded() < self.titles.len()
    }

    pub fn loader_calls(&self) -> u32 {
        self.loader_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageLoader for SimulatedFeed {
    async fn load_more(&self) -> Result<LoadedPage, OperationError> {
        self.loader_calls.fetch_add(1, Ordering::SeqCst);
        sleep(self.latency).await;

        let mut loaded = self.loaded.lock().unwrap_or_else(|e| e.into_inner());
        let page = *loaded / self.page_size + 1;
        let failing = self
            .failing_pages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&page);
        if failing {
            return Err(OperationError::failed(format!("page {page} unavailable")));
        }

        *loaded = (*loaded + self.page_size).min(self.titles.len());
        debug!(page, loaded = *loaded, "Simulated page served");
        Ok(LoadedPage {
            has_more: *loaded < self.titles.len(),
        })
    }
}

#[async_trait]
impl RefreshHandler for SimulatedFeed {
    async fn refresh(&self) -> Result<(), OperationError> {
        let call = self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        sleep(self.latency).await;
        if call < self.failing_refreshes {
            return Err(OperationError::failed("refresh unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl SearchHandler for SimulatedFeed {
    type Hit = String;

    async fn search(&self, query: &str) -> Result<Vec<String>, OperationError> {
        sleep(self.latency).await;
        let needle = query.to_lowercase();
        Ok(self
            .titles
            .iter()
            .filter(|title| title.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }
}

/// Replay `script` against fresh controllers built from `config`
pub async fn run(script: &ReplayScript, config: &Config) -> Result<ReplayReport, AppError> {
    let feed = Arc::new(SimulatedFeed::new(&script.feed));
    let search = DebouncedSearch::new(feed.clone(), script.initial_query.clone(), &config.debounce);

    let (scroll, refresh) = if script.use_retry {
        (
            InfiniteScrollController::spawn_with_retry(
                &config.infinite_scroll,
                feed.has_more(),
                feed.clone(),
                config.retry.clone(),
            ),
            PullToRefreshController::spawn_with_retry(
                &config.pull_to_refresh,
                feed.clone(),
                config.retry.clone(),
            ),
        )
    } else {
        (
            InfiniteScrollController::spawn(&config.infinite_scroll, feed.has_more(), feed.clone()),
            PullToRefreshController::spawn(&config.pull_to_refresh, feed.clone()),
        )
    };

    info!(steps = script.steps.len(), "Starting replay");

    let mut steps: Vec<&Step> = script.steps.iter().collect();
    steps.sort_by_key(|step| step.at_ms);

    let start = Instant::now();
    let mut skipped = Vec::new();
    let mut prevented_moves = 0;

    for step in steps {
        sleep_until(start + Duration::from_millis(step.at_ms)).await;

        let rejected = match &step.action {
            Action::Keystroke { text } => {
                search.input(text.clone())?;
                None
            }
            Action::Submit => {
                search.submit()?;
                None
            }
            Action::Observe { intersecting } => {
                rejection(scroll.observe(Observation::Intersecting(*intersecting)).await?)
            }
            Action::ScrollBounds {
                sentinel_top,
                viewport_bottom,
            } => rejection(
                scroll
                    .observe(Observation::Bounds {
                        sentinel_top: *sentinel_top,
                        viewport_bottom: *viewport_bottom,
                    })
                    .await?,
            ),
            Action::LoadMore => rejection(scroll.load_now().await?),
            Action::RetryLoad => rejection(scroll.retry().await?),
            Action::TouchStart { y, scroll_top } => {
                rejection(refresh.touch(TouchEvent::start(*y, *scroll_top)).await?)
            }
            Action::TouchMove { y } => {
                let transition = refresh.touch_move(*y).await?;
                if transition.prevent_default() {
                    prevented_moves += 1;
                }
                rejection(transition)
            }
            Action::TouchEnd => rejection(refresh.touch_end().await?),
            Action::TouchCancel => rejection(refresh.touch_cancel().await?),
            Action::Refresh => rejection(refresh.refresh().await?),
            Action::SetEnabled { enabled } => {
                let scroll_rejected = rejection(scroll.set_enabled(*enabled).await?);
                let refresh_rejected = rejection(refresh.set_enabled(*enabled).await?);
                scroll_rejected.or(refresh_rejected)
            }
        };

        if let Some(reason) = rejected {
            debug!(at_ms = step.at_ms, action = step.action.name(), reason = %reason, "Action skipped");
            skipped.push(SkippedAction {
                at_ms: step.at_ms,
                action: step.action.name().to_string(),
                reason: reason.to_string(),
            });
        }
    }

    sleep(Duration::from_millis(script.settle_ms)).await;

    let scroll_state = scroll.snapshot();
    let refresh_state = refresh.snapshot();
    let search_state = search.state();

    scroll.dispose().await?;
    refresh.dispose().await?;
    search.dispose();

    let report = ReplayReport {
        pages_loaded: scroll_state.pages_loaded,
        items_loaded: feed.loaded(),
        has_more: scroll_state.has_more,
        scroll_phase: scroll_state.phase,
        scroll_error: scroll_state.last_error.map(|e| e.to_string()),
        loader_calls: feed.loader_calls(),
        refreshes_started: refresh_state.refresh_count,
        refresh_calls: feed.refresh_calls(),
        refresh_phase: refresh_state.phase,
        refresh_error: refresh_state.last_error.map(|e| e.to_string()),
        prevented_moves,
        debounced_query: search_state.debounced_query,
        searches_started: search_state.searches_started,
        search_hits: search_state.results.len(),
        search_error: search_state.last_error.map(|e| e.to_string()),
        skipped,
    };

    info!(
        pages_loaded = report.pages_loaded,
        refreshes = report.refreshes_started,
        searches = report.searches_started,
        skipped = report.skipped.len(),
        "Replay finished"
    );

    Ok(report)
}

fn rejection<S, X>(transition: Transition<S, X>) -> Option<GuardRejection> {
    transition.rejected
}
