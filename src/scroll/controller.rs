//! Infinite-scroll controller actor
//!
//! Owns an [`InfiniteScroll`] machine on its own task. Page loads run on
//! spawned tasks and report back over a result channel, so the actor keeps
//! processing observations (and rejecting them) while a load is in flight.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::machine::{
    InfiniteScroll, LoadedPage, Observation, ScrollEffect, ScrollEvent, ScrollSnapshot,
    ScrollTransition,
};
use crate::config::{InfiniteScrollConfig, RetryConfig};
use crate::error::{ControllerError, OperationError};
use crate::retry::RetryExecutor;
use crate::timer::sleep_until_armed;

/// Source of the next page
#[async_trait]
pub trait PageLoader: Send + Sync {
    /// Load the next page and report whether more follow
    async fn load_more(&self) -> Result<LoadedPage, OperationError>;
}

struct Request {
    event: ScrollEvent,
    reply: oneshot::Sender<ScrollTransition>,
}

struct ScrollActor<L> {
    machine: InfiniteScroll,
    loader: Arc<L>,
    retry: Option<Arc<RetryExecutor>>,
    requests: mpsc::UnboundedReceiver<Request>,
    results_tx: mpsc::UnboundedSender<Result<LoadedPage, OperationError>>,
    results_rx: mpsc::UnboundedReceiver<Result<LoadedPage, OperationError>>,
    snapshot: watch::Sender<ScrollSnapshot>,
}

impl<L: PageLoader + 'static> ScrollActor<L> {
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                request = self.requests.recv() => {
                    let Some(Request { event, reply }) = request else {
                        break;
                    };
                    let dispose = matches!(event, ScrollEvent::Dispose);
                    let transition = self.apply(event);
                    let _ = reply.send(transition);
                    if dispose {
                        break;
                    }
                }
                Some(result) = self.results_rx.recv() => {
                    let event = match result {
                        Ok(page) => {
                            debug!(has_more = page.has_more, "Page loaded");
                            ScrollEvent::LoadSucceeded(page)
                        }
                        Err(e) => {
                            warn!(error = %e, "Page load failed");
                            ScrollEvent::LoadFailed(e)
                        }
                    };
                    self.apply(event);
                }
                _ = sleep_until_armed(self.machine.debounce_deadline()) => {
                    self.apply(ScrollEvent::DebounceElapsed);
                }
            }
        }

        debug!("Infinite scroll controller stopped");
    }

    fn apply(&mut self, event: ScrollEvent) -> ScrollTransition {
        let transition = self.machine.dispatch(event, Instant::now());
        if let Some(reason) = transition.rejected {
            debug!(reason = %reason, "Scroll event skipped");
        }
        if transition.effect == Some(ScrollEffect::StartLoad) {
            self.start_load();
        }
        self.snapshot.send_replace(transition.snapshot.clone());
        transition
    }

    fn start_load(&self) {
        let loader = self.loader.clone();
        let retry = self.retry.clone();
        let results = self.results_tx.clone();
        info!("Loading next page");

        tokio::spawn(async move {
            let result = match retry {
                Some(executor) => executor
                    .execute(|| loader.load_more())
                    .await
                    .map_err(OperationError::from),
                None => loader.load_more().await,
            };
            // Closed once the controller is disposed; the result is dropped
            let _ = results.send(result);
        });
    }
}

/// Handle to an infinite-scroll controller
///
/// Cloning the handle shares the controller. The controller stops on
/// [`dispose`](Self::dispose) or once every handle is dropped.
#[derive(Clone)]
pub struct InfiniteScrollController {
    requests: mpsc::UnboundedSender<Request>,
    snapshot: watch::Receiver<ScrollSnapshot>,
    retry: Option<Arc<RetryExecutor>>,
}

impl InfiniteScrollController {
    /// Start a controller calling `loader` directly
    pub fn spawn<L: PageLoader + 'static>(
        config: &InfiniteScrollConfig,
        has_more: bool,
        loader: Arc<L>,
    ) -> Self {
        Self::start(config, has_more, loader, None)
    }

    /// Start a controller that runs every load through a retry executor
    pub fn spawn_with_retry<L: PageLoader + 'static>(
        config: &InfiniteScrollConfig,
        has_more: bool,
        loader: Arc<L>,
        retry: RetryConfig,
    ) -> Self {
        Self::start(
            config,
            has_more,
            loader,
            Some(Arc::new(RetryExecutor::new(retry))),
        )
    }

    fn start<L: PageLoader + 'static>(
        config: &InfiniteScrollConfig,
        has_more: bool,
        loader: Arc<L>,
        retry: Option<Arc<RetryExecutor>>,
    ) -> Self {
        let machine = InfiniteScroll::new(config, has_more);
        let (snapshot_tx, snapshot) = watch::channel(machine.snapshot());
        let (requests, requests_rx) = mpsc::unbounded_channel();
        let (results_tx, results_rx) = mpsc::unbounded_channel();

        debug!(
            threshold_px = config.threshold_px,
            debounce_ms = config.debounce_ms,
            has_more,
            "Starting infinite scroll controller"
        );

        let actor = ScrollActor {
            machine,
            loader,
            retry: retry.clone(),
            requests: requests_rx,
            results_tx,
            results_rx,
            snapshot: snapshot_tx,
        };
        tokio::spawn(actor.run());

        Self {
            requests,
            snapshot,
            retry,
        }
    }

    async fn send(&self, event: ScrollEvent) -> Result<ScrollTransition, ControllerError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request { event, reply })
            .map_err(|_| ControllerError::Disposed)?;
        response.await.map_err(|_| ControllerError::Disposed)
    }

    /// Report a viewport observation of the sentinel
    pub async fn observe(&self, observation: Observation) -> Result<ScrollTransition, ControllerError> {
        self.send(ScrollEvent::Observed(observation)).await
    }

    /// Load the next page now, under the usual guards
    pub async fn load_now(&self) -> Result<ScrollTransition, ControllerError> {
        self.send(ScrollEvent::LoadRequested).await
    }

    /// Re-run the load that failed
    pub async fn retry(&self) -> Result<ScrollTransition, ControllerError> {
        self.send(ScrollEvent::Retry).await
    }

    /// Clear the error and any armed debounce
    pub async fn reset(&self) -> Result<ScrollTransition, ControllerError> {
        self.send(ScrollEvent::Reset).await
    }

    pub async fn set_has_more(&self, has_more: bool) -> Result<ScrollTransition, ControllerError> {
        self.send(ScrollEvent::SetHasMore(has_more)).await
    }

    /// Report whether the caller is loading on its own
    pub async fn set_external_loading(
        &self,
        loading: bool,
    ) -> Result<ScrollTransition, ControllerError> {
        self.send(ScrollEvent::SetExternalLoading(loading)).await
    }

    pub async fn set_enabled(&self, enabled: bool) -> Result<ScrollTransition, ControllerError> {
        self.send(ScrollEvent::SetEnabled(enabled)).await
    }

    /// Detach observation and stop the controller
    ///
    /// A load already running is not aborted; its result is discarded.
    pub async fn dispose(&self) -> Result<ScrollTransition, ControllerError> {
        self.send(ScrollEvent::Dispose).await
    }

    /// Latest published state
    pub fn snapshot(&self) -> ScrollSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScrollSnapshot> {
        self.snapshot.clone()
    }

    /// Retry executor wrapping the loads, when configured
    pub fn retry_executor(&self) -> Option<&RetryExecutor> {
        self.retry.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GuardRejection;
    use crate::scroll::ScrollPhase;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::sleep;

    struct TestFeed {
        calls: AtomicU32,
        latency: Duration,
        script: Mutex<VecDeque<Result<LoadedPage, OperationError>>>,
    }

    impl TestFeed {
        fn new(latency_ms: u64, script: Vec<Result<LoadedPage, OperationError>>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                latency: Duration::from_millis(latency_ms),
                script: Mutex::new(script.into()),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PageLoader for TestFeed {
        async fn load_more(&self) -> Result<LoadedPage, OperationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            sleep(self.latency).await;
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(LoadedPage { has_more: true }))
        }
    }

    fn config() -> InfiniteScrollConfig {
        InfiniteScrollConfig {
            threshold_px: 200.0,
            debounce_ms: 100,
            enabled: true,
        }
    }

    const NEAR: Observation = Observation::Intersecting(true);

    // Test 1: Ten intersection events while loading cause one load
    #[tokio::test]
    async fn test_single_load_under_event_storm() {
        tokio::time::pause();
        let feed = TestFeed::new(500, vec![]);
        let controller = InfiniteScrollController::spawn(&config(), true, feed.clone());

        controller.observe(NEAR).await.unwrap();
        sleep(Duration::from_millis(150)).await;
        assert_eq!(controller.snapshot().phase, ScrollPhase::Loading);

        for _ in 0..10 {
            let t = controller.observe(NEAR).await.unwrap();
            assert_eq!(t.rejected, Some(GuardRejection::AlreadyLoading));
        }

        sleep(Duration::from_millis(600)).await;
        assert_eq!(feed.calls(), 1);
        assert_eq!(controller.snapshot().phase, ScrollPhase::Observing);
        assert_eq!(controller.snapshot().pages_loaded, 1);
    }

    // Test 2: A burst of observations inside the debounce window loads once
    #[tokio::test]
    async fn test_debounced_observations() {
        tokio::time::pause();
        let feed = TestFeed::new(10, vec![]);
        let controller = InfiniteScrollController::spawn(&config(), true, feed.clone());

        for _ in 0..5 {
            controller.observe(NEAR).await.unwrap();
            sleep(Duration::from_millis(30)).await;
        }
        assert_eq!(feed.calls(), 0);

        sleep(Duration::from_millis(200)).await;
        assert_eq!(feed.calls(), 1);
    }

    // Test 3: The last page exhausts the controller
    #[tokio::test]
    async fn test_exhausted_after_last_page() {
        tokio::time::pause();
        let feed = TestFeed::new(10, vec![Ok(LoadedPage { has_more: false })]);
        let controller = InfiniteScrollController::spawn(&config(), true, feed.clone());

        controller.load_now().await.unwrap();
        sleep(Duration::from_millis(50)).await;

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.phase, ScrollPhase::Exhausted);
        assert!(!snapshot.has_more);

        let t = controller.observe(NEAR).await.unwrap();
        assert_eq!(t.rejected, Some(GuardRejection::NoMorePages));
        sleep(Duration::from_millis(500)).await;
        assert_eq!(feed.calls(), 1);
    }

    // Test 4: A failed load waits for retry, which loads again
    #[tokio::test]
    async fn test_failure_then_manual_retry() {
        tokio::time::pause();
        let feed = TestFeed::new(
            10,
            vec![Err(OperationError::failed("network down"))],
        );
        let controller = InfiniteScrollController::spawn(&config(), true, feed.clone());

        controller.load_now().await.unwrap();
        sleep(Duration::from_millis(50)).await;
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.phase, ScrollPhase::Error);
        assert_eq!(snapshot.last_error, Some(OperationError::failed("network down")));

        // No automatic retry
        controller.observe(NEAR).await.unwrap();
        sleep(Duration::from_millis(500)).await;
        assert_eq!(feed.calls(), 1);

        let t = controller.retry().await.unwrap();
        assert_eq!(t.snapshot.phase, ScrollPhase::Loading);
        sleep(Duration::from_millis(50)).await;
        assert_eq!(controller.snapshot().phase, ScrollPhase::Observing);
        assert_eq!(feed.calls(), 2);
    }

    // Test 5: Loads through the retry executor recover from transient failures
    #[tokio::test]
    async fn test_load_through_retry_executor() {
        tokio::time::pause();
        let feed = TestFeed::new(
            10,
            vec![
                Err(OperationError::failed("timeout")),
                Ok(LoadedPage { has_more: true }),
            ],
        );
        let controller = InfiniteScrollController::spawn_with_retry(
            &config(),
            true,
            feed.clone(),
            RetryConfig::fixed(3, 200),
        );

        controller.load_now().await.unwrap();
        sleep(Duration::from_millis(500)).await;

        assert_eq!(feed.calls(), 2);
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.phase, ScrollPhase::Observing);
        assert_eq!(snapshot.last_error, None);
        assert!(controller.retry_executor().is_some());
    }

    // Test 6: Exhausted retries surface as RetriesExhausted
    #[tokio::test]
    async fn test_retries_exhausted_surface() {
        tokio::time::pause();
        let feed = TestFeed::new(
            0,
            vec![
                Err(OperationError::failed("a")),
                Err(OperationError::failed("b")),
            ],
        );
        let controller = InfiniteScrollController::spawn_with_retry(
            &config(),
            true,
            feed.clone(),
            RetryConfig::fixed(2, 100),
        );

        controller.load_now().await.unwrap();
        sleep(Duration::from_millis(300)).await;

        assert_eq!(
            controller.snapshot().last_error,
            Some(OperationError::RetriesExhausted {
                attempts: 2,
                last_error: "Operation failed: b".to_string(),
            })
        );
    }

    // Test 7: Dispose cancels the debounce and drops late results
    #[tokio::test]
    async fn test_dispose_discards_pending_work() {
        tokio::time::pause();
        let feed = TestFeed::new(200, vec![]);
        let controller = InfiniteScrollController::spawn(&config(), true, feed.clone());

        // Armed debounce never fires after dispose
        controller.observe(NEAR).await.unwrap();
        let t = controller.dispose().await.unwrap();
        assert!(t.snapshot.disposed);
        sleep(Duration::from_millis(500)).await;
        assert_eq!(feed.calls(), 0);
        assert_eq!(controller.observe(NEAR).await, Err(ControllerError::Disposed));

        // In-flight load finishes unobserved
        let controller = InfiniteScrollController::spawn(&config(), true, feed.clone());
        controller.load_now().await.unwrap();
        controller.dispose().await.unwrap();
        sleep(Duration::from_millis(500)).await;
        assert_eq!(feed.calls(), 1);
        let snapshot = controller.snapshot();
        assert!(snapshot.disposed);
        assert_eq!(snapshot.pages_loaded, 0);
    }

    // Test 8: Disabled controllers ignore observations until re-enabled
    #[tokio::test]
    async fn test_enable_toggle() {
        tokio::time::pause();
        let feed = TestFeed::new(10, vec![]);
        let controller = InfiniteScrollController::spawn(&config(), true, feed.clone());

        controller.set_enabled(false).await.unwrap();
        let t = controller.observe(NEAR).await.unwrap();
        assert_eq!(t.rejected, Some(GuardRejection::Disabled));
        assert_eq!(controller.snapshot().phase, ScrollPhase::Idle);

        let t = controller.set_enabled(true).await.unwrap();
        assert_eq!(t.snapshot.phase, ScrollPhase::Observing);
        controller.observe(NEAR).await.unwrap();
        sleep(Duration::from_millis(200)).await;
        assert_eq!(feed.calls(), 1);
    }

    // Test 9: Subscribers observe the Loading phase
    #[tokio::test]
    async fn test_subscribe_sees_loading() {
        tokio::time::pause();
        let feed = TestFeed::new(100, vec![]);
        let controller = InfiniteScrollController::spawn(&config(), true, feed);
        let mut updates = controller.subscribe();

        controller.load_now().await.unwrap();
        updates.changed().await.unwrap();
        assert!(updates.borrow_and_update().is_loading);

        updates.changed().await.unwrap();
        assert!(!updates.borrow().is_loading);
    }
}
