//! Async drivers for the debounce and throttle cores
//!
//! Every instance is an actor task that exclusively owns one
//! [`Coalescer`]. Handles talk to it over an unbounded channel, so
//! inputs are applied in arrival order and never block the caller. The
//! actor keeps at most one sleep armed: the deadline the core reports
//! after each command.

use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::debug;

use super::gate::{Coalescer, Debouncer, Throttler};
use crate::config::DebounceConfig;
use crate::error::ControllerError;
use crate::timer::sleep_until_armed;

enum Command<T> {
    Push(T),
    Flush,
    Cancel,
    IsPending(oneshot::Sender<bool>),
    Dispose,
}

/// Run one coalescing core until disposed or every handle is dropped
async fn run_gate<T, G, F>(mut gate: G, mut rx: mpsc::UnboundedReceiver<Command<T>>, mut emit: F)
where
    G: Coalescer<T>,
    F: FnMut(T),
{
    loop {
        tokio::select! {
            biased;

            command = rx.recv() => {
                let now = Instant::now();
                // A deadline that passed while the command was queued fires first
                if let Some(value) = gate.poll_expired(now) {
                    emit(value);
                }

                match command {
                    Some(Command::Push(value)) => {
                        if let Some(value) = gate.push(value, now) {
                            emit(value);
                        }
                    }
                    Some(Command::Flush) => {
                        if let Some(value) = gate.flush(now) {
                            emit(value);
                        }
                    }
                    Some(Command::Cancel) => {
                        if gate.cancel() {
                            debug!("Pending emission cancelled");
                        }
                    }
                    Some(Command::IsPending(reply)) => {
                        let _ = reply.send(gate.is_pending());
                    }
                    Some(Command::Dispose) | None => {
                        gate.cancel();
                        break;
                    }
                }
            }
            _ = sleep_until_armed(gate.deadline()) => {
                if let Some(value) = gate.poll_expired(Instant::now()) {
                    emit(value);
                }
            }
        }
    }

    debug!("Debounce scheduler stopped");
}

/// Sending half shared by every handle type
struct GateHandle<T> {
    tx: mpsc::UnboundedSender<Command<T>>,
}

impl<T: Send + 'static> GateHandle<T> {
    fn spawn<G, F>(gate: G, emit: F) -> Self
    where
        G: Coalescer<T> + Send + 'static,
        F: FnMut(T) + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_gate(gate, rx, emit));
        Self { tx }
    }

    fn send(&self, command: Command<T>) -> Result<(), ControllerError> {
        self.tx.send(command).map_err(|_| ControllerError::Disposed)
    }

    async fn is_pending(&self) -> Result<bool, ControllerError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::IsPending(reply))?;
        response.await.map_err(|_| ControllerError::Disposed)
    }

    fn dispose(&self) {
        let _ = self.tx.send(Command::Dispose);
    }

    fn is_disposed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<T> Clone for GateHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

/// A value that follows its input after a quiet period
///
/// ```no_run
/// # async fn example() {
/// use feedflow::config::DebounceConfig;
/// use feedflow::debounce::debounce;
///
/// let query = debounce(String::new(), &DebounceConfig::with_delay(300));
/// query.set("rust".to_string()).unwrap();
/// let mut updates = query.subscribe();
/// updates.changed().await.unwrap();
/// assert_eq!(*updates.borrow(), "rust");
/// # }
/// ```
pub struct Debounced<T> {
    handle: GateHandle<T>,
    value: watch::Receiver<T>,
}

/// Create a debounced value starting at `initial`
pub fn debounce<T>(initial: T, config: &DebounceConfig) -> Debounced<T>
where
    T: Clone + Send + Sync + 'static,
{
    let (value_tx, value) = watch::channel(initial);
    let handle = GateHandle::spawn(Debouncer::new(config), move |emitted| {
        value_tx.send_replace(emitted);
    });
    debug!(delay_ms = config.delay_ms, "Debounced value created");
    Debounced { handle, value }
}

impl<T: Clone + Send + Sync + 'static> Debounced<T> {
    /// Record a new input and restart the quiet period
    pub fn set(&self, value: T) -> Result<(), ControllerError> {
        self.handle.send(Command::Push(value))
    }

    /// Emit the pending input now
    pub fn flush(&self) -> Result<(), ControllerError> {
        self.handle.send(Command::Flush)
    }

    /// Discard the pending input
    pub fn cancel(&self) -> Result<(), ControllerError> {
        self.handle.send(Command::Cancel)
    }

    /// Whether an input is waiting for its deadline
    pub async fn is_pending(&self) -> Result<bool, ControllerError> {
        self.handle.is_pending().await
    }

    /// The current debounced value
    pub fn value(&self) -> T {
        self.value.borrow().clone()
    }

    /// Receiver notified on every emission
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.value.clone()
    }

    /// Stop the scheduler; the pending input is discarded
    pub fn dispose(&self) {
        self.handle.dispose();
    }

    /// Whether the scheduler task has stopped
    pub fn is_disposed(&self) -> bool {
        self.handle.is_disposed()
    }
}

impl<T> Clone for Debounced<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            value: self.value.clone(),
        }
    }
}

/// A callback invoked once per quiet period with the latest arguments
pub struct DebouncedCallback<A> {
    handle: GateHandle<A>,
}

/// Wrap `callback` so bursts of calls collapse into one invocation
pub fn debounce_callback<A, F>(callback: F, config: &DebounceConfig) -> DebouncedCallback<A>
where
    A: Send + 'static,
    F: FnMut(A) + Send + 'static,
{
    DebouncedCallback {
        handle: GateHandle::spawn(Debouncer::new(config), callback),
    }
}

impl<A: Send + 'static> DebouncedCallback<A> {
    /// Schedule an invocation with `args`, replacing any pending one
    pub fn call(&self, args: A) -> Result<(), ControllerError> {
        self.handle.send(Command::Push(args))
    }

    /// Invoke the pending call now
    pub fn flush(&self) -> Result<(), ControllerError> {
        self.handle.send(Command::Flush)
    }

    /// Discard the pending call
    pub fn cancel(&self) -> Result<(), ControllerError> {
        self.handle.send(Command::Cancel)
    }

    pub async fn is_pending(&self) -> Result<bool, ControllerError> {
        self.handle.is_pending().await
    }

    pub fn dispose(&self) {
        self.handle.dispose();
    }
}

impl<A> Clone for DebouncedCallback<A> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
        }
    }
}

/// A callback invoked at most once per interval
pub struct Throttled<A> {
    handle: GateHandle<A>,
}

/// Wrap `callback` so it runs at most once every `interval`
pub fn throttle_callback<A, F>(callback: F, interval: Duration) -> Throttled<A>
where
    A: Send + 'static,
    F: FnMut(A) + Send + 'static,
{
    Throttled {
        handle: GateHandle::spawn(Throttler::new(interval), callback),
    }
}

impl<A: Send + 'static> Throttled<A> {
    /// Invoke now if the interval has passed, otherwise at its end
    pub fn call(&self, args: A) -> Result<(), ControllerError> {
        self.handle.send(Command::Push(args))
    }

    pub fn flush(&self) -> Result<(), ControllerError> {
        self.handle.send(Command::Flush)
    }

    pub fn cancel(&self) -> Result<(), ControllerError> {
        self.handle.send(Command::Cancel)
    }

    pub async fn is_pending(&self) -> Result<bool, ControllerError> {
        self.handle.is_pending().await
    }

    pub fn dispose(&self) {
        self.handle.dispose();
    }
}

impl<A> Clone for Throttled<A> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
        }
    }
}
