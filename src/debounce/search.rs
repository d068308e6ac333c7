//! Debounced search box
//!
//! Keystrokes go into a [`Debounced`] query. A forwarding task waits for
//! each emission and runs the search handler with it, one search at a
//! time. Emissions that arrive while a search runs are coalesced by the
//! watch channel, so only the newest query is searched next.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::scheduler::{debounce, Debounced};
use crate::config::DebounceConfig;
use crate::error::{ControllerError, OperationError};

/// Search backend invoked with the debounced query
#[async_trait]
pub trait SearchHandler: Send + Sync {
    /// One search result
    type Hit: Clone + Send + Sync + 'static;

    /// Run a search
    async fn search(&self, query: &str) -> Result<Vec<Self::Hit>, OperationError>;
}

/// Observable search status
#[derive(Debug, Clone, PartialEq)]
pub struct SearchState<H> {
    /// Last query emitted by the debouncer
    pub debounced_query: String,
    /// A search is running
    pub is_searching: bool,
    /// Hits of the last successful search
    pub results: Vec<H>,
    /// Failure of the last search, cleared by the next success
    pub last_error: Option<OperationError>,
    /// Number of searches started
    pub searches_started: u64,
}

impl<H> SearchState<H> {
    fn new(query: String) -> Self {
        Self {
            debounced_query: query,
            is_searching: false,
            results: Vec::new(),
            last_error: None,
            searches_started: 0,
        }
    }
}

/// Search box that queries its backend once typing pauses
pub struct DebouncedSearch<H: SearchHandler> {
    query: Debounced<String>,
    state: watch::Receiver<SearchState<H::Hit>>,
    worker: JoinHandle<()>,
}

impl<H: SearchHandler + 'static> DebouncedSearch<H> {
    /// Start a search box; emissions equal to `initial_query` are not searched
    pub fn new(handler: Arc<H>, initial_query: impl Into<String>, config: &DebounceConfig) -> Self {
        let initial_query = initial_query.into();
        let query = debounce(initial_query.clone(), config);
        let (state_tx, state) = watch::channel(SearchState::new(initial_query.clone()));
        let worker = tokio::spawn(forward_queries(
            handler,
            query.subscribe(),
            initial_query,
            state_tx,
        ));

        Self {
            query,
            state,
            worker,
        }
    }

    /// Record a keystroke
    pub fn input(&self, query: impl Into<String>) -> Result<(), ControllerError> {
        self.query.set(query.into())
    }

    /// Search the pending query without waiting for the quiet period
    pub fn submit(&self) -> Result<(), ControllerError> {
        self.query.flush()
    }

    pub fn state(&self) -> SearchState<H::Hit> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState<H::Hit>> {
        self.state.clone()
    }

    /// Stop the debouncer and the forwarding task
    ///
    /// A search already running is not interrupted; its result is dropped.
    pub fn dispose(&self) {
        self.query.dispose();
        self.worker.abort();
    }
}

impl<H: SearchHandler> Drop for DebouncedSearch<H> {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn forward_queries<H: SearchHandler + 'static>(
    handler: Arc<H>,
    mut queries: watch::Receiver<String>,
    initial_query: String,
    state: watch::Sender<SearchState<H::Hit>>,
) {
    while queries.changed().await.is_ok() {
        let query = queries.borrow_and_update().clone();
        state.send_modify(|s| s.debounced_query = query.clone());

        if query == initial_query {
            debug!(query = %query, "Debounced query equals the initial query, not searching");
            continue;
        }

        state.send_modify(|s| {
            s.is_searching = true;
            s.searches_started += 1;
        });
        debug!(query = %query, "Searching");

        // The search runs on its own task so an abort of the forwarder
        // leaves it to finish unobserved
        let search = {
            let handler = handler.clone();
            let query = query.clone();
            tokio::spawn(async move { handler.search(&query).await })
        };

        let result = match search.await {
            Ok(result) => result,
            Err(e) => Err(OperationError::failed(format!("search task failed: {e}"))),
        };

        state.send_modify(|s| {
            s.is_searching = false;
            match result {
                Ok(hits) => {
                    s.results = hits;
                    s.last_error = None;
                }
                Err(e) => {
                    warn!(query = %query, error = %e, "Search failed");
                    s.last_error = Some(e);
                }
            }
        });
    }
}
