//! Pull-to-refresh controller actor
//!
//! Runs a [`PullToRefresh`] machine on its own task and invokes the
//! [`RefreshHandler`] when the machine asks for it. Touch events are
//! answered right away, so the surface learns whether to prevent the
//! default action without waiting for a refresh.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use super::machine::{
    GestureEffect, GestureEvent, GestureSnapshot, GestureTransition, PullToRefresh, TouchEvent,
};
use crate::config::{PullToRefreshConfig, RetryConfig};
use crate::error::{ControllerError, OperationError};
use crate::retry::RetryExecutor;

/// Operation run when a pull is released past the threshold
#[async_trait]
pub trait RefreshHandler: Send + Sync {
    async fn refresh(&self) -> Result<(), OperationError>;
}

struct Request {
    event: GestureEvent,
    reply: oneshot::Sender<GestureTransition>,
}

struct GestureActor<H> {
    machine: PullToRefresh,
    handler: Arc<H>,
    retry: Option<Arc<RetryExecutor>>,
    requests: mpsc::UnboundedReceiver<Request>,
    settled_tx: mpsc::UnboundedSender<Result<(), OperationError>>,
    settled_rx: mpsc::UnboundedReceiver<Result<(), OperationError>>,
    snapshot: watch::Sender<GestureSnapshot>,
}

impl<H: RefreshHandler + 'static> GestureActor<H> {
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                request = self.requests.recv() => {
                    let Some(Request { event, reply }) = request else {
                        break;
                    };
                    let dispose = matches!(event, GestureEvent::Dispose);
                    let transition = self.apply(event);
                    let _ = reply.send(transition);
                    if dispose {
                        break;
                    }
                }
                Some(result) = self.settled_rx.recv() => {
                    match &result {
                        Ok(()) => info!("Refresh completed"),
                        Err(e) => warn!(error = %e, "Refresh failed"),
                    }
                    self.apply(GestureEvent::RefreshSettled(result));
                }
            }
        }

        debug!("Pull-to-refresh controller stopped");
    }

    fn apply(&mut self, event: GestureEvent) -> GestureTransition {
        let transition = self.machine.dispatch(event);
        if transition.effect == Some(GestureEffect::StartRefresh) {
            self.start_refresh();
        }
        self.snapshot.send_replace(transition.snapshot.clone());
        transition
    }

    fn start_refresh(&self) {
        let handler = self.handler.clone();
        let retry = self.retry.clone();
        let settled = self.settled_tx.clone();
        info!("Pull-to-refresh triggered");

        tokio::spawn(async move {
            let result = match retry {
                Some(executor) => executor
                    .execute(|| handler.refresh())
                    .await
                    .map_err(OperationError::from),
                None => handler.refresh().await,
            };
            let _ = settled.send(result);
        });
    }
}

/// Handle to a pull-to-refresh controller
#[derive(Clone)]
pub struct PullToRefreshController {
    requests: mpsc::UnboundedSender<Request>,
    snapshot: watch::Receiver<GestureSnapshot>,
    retry: Option<Arc<RetryExecutor>>,
}

impl PullToRefreshController {
    /// Start a controller calling `handler` directly
    pub fn spawn<H: RefreshHandler + 'static>(config: &PullToRefreshConfig, handler: Arc<H>) -> Self {
        Self::start(config, handler, None)
    }

    /// Start a controller that runs every refresh through a retry executor
    pub fn spawn_with_retry<H: RefreshHandler + 'static>(
        config: &PullToRefreshConfig,
        handler: Arc<H>,
        retry: RetryConfig,
    ) -> Self {
        Self::start(config, handler, Some(Arc::new(RetryExecutor::new(retry))))
    }

    fn start<H: RefreshHandler + 'static>(
        config: &PullToRefreshConfig,
        handler: Arc<H>,
        retry: Option<Arc<RetryExecutor>>,
    ) -> Self {
        let machine = PullToRefresh::new(config);
        let (snapshot_tx, snapshot) = watch::channel(machine.snapshot());
        let (requests, requests_rx) = mpsc::unbounded_channel();
        let (settled_tx, settled_rx) = mpsc::unbounded_channel();

        debug!(
            threshold = config.threshold,
            resistance = config.resistance,
            enabled = config.enabled,
            "Starting pull-to-refresh controller"
        );

        let actor = GestureActor {
            machine,
            handler,
            retry: retry.clone(),
            requests: requests_rx,
            settled_tx,
            settled_rx,
            snapshot: snapshot_tx,
        };
        tokio::spawn(actor.run());

        Self {
            requests,
            snapshot,
            retry,
        }
    }

    async fn send(&self, event: GestureEvent) -> Result<GestureTransition, ControllerError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request { event, reply })
            .map_err(|_| ControllerError::Disposed)?;
        response.await.map_err(|_| ControllerError::Disposed)
    }

    /// Feed one touch event from the surface
    pub async fn touch(&self, event: TouchEvent) -> Result<GestureTransition, ControllerError> {
        self.send(GestureEvent::Touch(event)).await
    }

    pub async fn touch_start(
        &self,
        y: f64,
        scroll_top: f64,
    ) -> Result<GestureTransition, ControllerError> {
        self.touch(TouchEvent::start(y, scroll_top)).await
    }

    pub async fn touch_move(&self, y: f64) -> Result<GestureTransition, ControllerError> {
        self.touch(TouchEvent::moved(y)).await
    }

    pub async fn touch_end(&self) -> Result<GestureTransition, ControllerError> {
        self.touch(TouchEvent::end()).await
    }

    pub async fn touch_cancel(&self) -> Result<GestureTransition, ControllerError> {
        self.touch(TouchEvent::cancel()).await
    }

    /// Refresh without a gesture, under the same re-entrancy guard
    pub async fn refresh(&self) -> Result<GestureTransition, ControllerError> {
        self.send(GestureEvent::RefreshRequested).await
    }

    pub async fn set_enabled(&self, enabled: bool) -> Result<GestureTransition, ControllerError> {
        self.send(GestureEvent::SetEnabled(enabled)).await
    }

    /// Detach from the surface and stop the controller
    ///
    /// A refresh already running is not aborted; its result is discarded.
    pub async fn dispose(&self) -> Result<GestureTransition, ControllerError> {
        self.send(GestureEvent::Dispose).await
    }

    pub fn snapshot(&self) -> GestureSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GestureSnapshot> {
        self.snapshot.clone()
    }

    /// Executor wrapping each refresh, when started with a retry policy
    pub fn retry_executor(&self) -> Option<&RetryExecutor> {
        self.retry.as_deref()
    }
}
