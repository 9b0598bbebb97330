//! The inbound read loop.
//!
//! A [`Dispatcher`] owns the inbound half of a connection. It reads one
//! message at a time, decodes it, and routes it either to the application's
//! [`InboundHandler`] or to the [`DescriptorTable`]. Messages are never
//! processed concurrently, so handler invocation order equals wire order.
//!
//! The loop has two states. It is [`Listening`](DispatcherState::Listening)
//! from construction until the source closes or fails, then
//! [`Terminated`](DispatcherState::Terminated) for good. A malformed message
//! is logged and skipped; only the channel itself can end the loop.

use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::channel::{ChannelError, MessageSource};
use crate::correlation::DescriptorTable;
use crate::inbound::{DomEvent, FormProgress, InboundMessage};

/// Log target for dispatcher operations.
const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Application callbacks for uncorrelated inbound messages.
///
/// Supplied once when the dispatcher is built and owned by it for the
/// lifetime of the connection. Callbacks run on the dispatcher task, one at
/// a time; a slow callback delays every message behind it.
pub trait InboundHandler: Send + 'static {
    /// A user-generated DOM event arrived.
    fn on_dom_event(&mut self, event: DomEvent);

    /// The user navigated to `path`.
    fn on_history_changed(&mut self, path: String);

    /// A form upload reported progress.
    fn on_form_progress(&mut self, progress: FormProgress);
}

/// Lifecycle of a [`Dispatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Reading and routing messages.
    Listening,
    /// The source closed or failed. No further messages are read.
    Terminated,
}

/// Why a dispatcher stopped.
#[derive(Debug)]
pub enum DispatcherExit {
    /// The peer closed the stream.
    Closed,
    /// Reading from the source failed.
    Failed(ChannelError),
}

/// Sequential reader and router for one connection's inbound messages.
pub struct Dispatcher<S, H> {
    source: S,
    handler: H,
    table: DescriptorTable,
    state: watch::Sender<DispatcherState>,
}

impl<S, H> Dispatcher<S, H>
where
    S: MessageSource,
    H: InboundHandler,
{
    /// Builds a dispatcher in the listening state.
    ///
    /// Property responses complete entries in `table`; every other message
    /// goes to `handler`.
    #[must_use]
    pub fn new(source: S, handler: H, table: DescriptorTable) -> Self {
        let (state, _) = watch::channel(DispatcherState::Listening);
        Self {
            source,
            handler,
            table,
            state,
        }
    }

    /// Runs the read loop on a new tokio task.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn spawn(self) -> DispatcherHandle {
        let state = self.state.subscribe();
        let task = tokio::spawn(self.run());
        DispatcherHandle { state, task }
    }

    /// Reads and routes messages until the source closes or fails.
    ///
    /// On exit every outstanding request in the table is abandoned, so
    /// waiters observe [`RequestError::Disconnected`] instead of waiting
    /// forever.
    ///
    /// [`RequestError::Disconnected`]: crate::RequestError::Disconnected
    pub async fn run(mut self) -> DispatcherExit {
        info!(target: DISPATCH_TARGET, "dispatcher listening");
        let exit = loop {
            match self.source.next_message().await {
                Ok(Some(raw)) => self.dispatch(&raw),
                Ok(None) => break DispatcherExit::Closed,
                Err(error) => break DispatcherExit::Failed(error),
            }
            self.table.expire_stale(Instant::now());
        };

        let abandoned = self.table.abandon_all();
        match &exit {
            DispatcherExit::Closed => {
                info!(target: DISPATCH_TARGET, abandoned, "inbound stream closed");
            }
            DispatcherExit::Failed(err) => {
                error!(target: DISPATCH_TARGET, abandoned, error = %err, "inbound stream failed");
            }
        }
        self.state.send_replace(DispatcherState::Terminated);
        exit
    }

    fn dispatch(&mut self, raw: &str) {
        let message = match InboundMessage::parse(raw) {
            Ok(message) => message,
            Err(err) => {
                warn!(
                    target: DISPATCH_TARGET,
                    error = %err,
                    bytes = raw.len(),
                    "skipping malformed inbound message"
                );
                return;
            }
        };
        debug!(target: DISPATCH_TARGET, kind = %message.kind(), "inbound message");

        match message {
            InboundMessage::DomEvent(event) => self.handler.on_dom_event(event),
            InboundMessage::FormDataProgress(progress) => self.handler.on_form_progress(progress),
            InboundMessage::PropertyResponse(response) => {
                let (descriptor, outcome) = response.into_outcome();
                self.table.complete(&descriptor, outcome);
            }
            InboundMessage::HistoryChanged(path) => self.handler.on_history_changed(path),
        }
    }
}

/// Observes and awaits a spawned [`Dispatcher`].
#[derive(Debug)]
pub struct DispatcherHandle {
    state: watch::Receiver<DispatcherState>,
    task: JoinHandle<DispatcherExit>,
}

impl DispatcherHandle {
    /// Returns the dispatcher's current state.
    #[must_use]
    pub fn state(&self) -> DispatcherState {
        *self.state.borrow()
    }

    /// Waits until the dispatcher has terminated.
    pub async fn terminated(&mut self) {
        // A dropped sender means the task is gone, which is termination too.
        drop(
            self.state
                .wait_for(|state| *state == DispatcherState::Terminated)
                .await,
        );
    }

    /// Waits for the dispatcher task and returns why it stopped.
    ///
    /// # Errors
    ///
    /// Returns the [`JoinError`] when the task panicked or was aborted.
    pub async fn join(self) -> Result<DispatcherExit, JoinError> {
        self.task.await
    }

    /// Stops the dispatcher without waiting for the source.
    ///
    /// Outstanding requests are not drained by an abort; their waiters see
    /// [`RequestError::Disconnected`](crate::RequestError::Disconnected)
    /// only once the last table handle is dropped.
    pub fn abort(&self) {
        self.task.abort();
    }
}
