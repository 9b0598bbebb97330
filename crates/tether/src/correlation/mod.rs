//! Request/response correlation by descriptor.
//!
//! Requests that expect an answer from the remote runtime are tagged with a
//! [`Descriptor`]: a decimal string drawn from a counter owned by the
//! [`DescriptorTable`]. The table maps each outstanding descriptor to the
//! sending half of a oneshot channel; the caller holds the receiving half as
//! a [`PendingResult`]. When the dispatcher sees a response it calls
//! [`DescriptorTable::complete`], which removes the entry and resolves the
//! caller's handle exactly once.
//!
//! Entries leave the table in one of four ways: a response arrives, the
//! entry's deadline passes, the caller drops its [`PendingResult`], or the
//! connection terminates and the table is drained. A drained table stays
//! closed, so requests issued after termination are disconnected at once.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::protocol::PropertyTag;

/// Log target for correlation operations.
const CORRELATION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::correlation");

/// Identifier tying a response to the request that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Descriptor(String);

impl Descriptor {
    /// Wraps a descriptor received from the wire.
    #[must_use]
    pub fn new(descriptor: impl Into<String>) -> Self {
        Self(descriptor.into())
    }

    /// Returns the descriptor text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A successfully extracted property value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyValue {
    tag: PropertyTag,
    raw: String,
}

impl PropertyValue {
    /// Creates a value from its tag and raw text.
    #[must_use]
    pub fn new(tag: PropertyTag, raw: impl Into<String>) -> Self {
        Self {
            tag,
            raw: raw.into(),
        }
    }

    /// Returns how the remote side classified the value.
    #[must_use]
    pub const fn tag(&self) -> PropertyTag {
        self.tag
    }

    /// Returns the value exactly as it was sent.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Consumes the value, returning its raw text.
    #[must_use]
    pub fn into_raw(self) -> String {
        self.raw
    }
}

/// Failures delivered to a single correlated request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The remote runtime reported an error for this request.
    #[error("request {descriptor} failed remotely: {message}")]
    Remote {
        /// The failed request.
        descriptor: Descriptor,
        /// The message supplied by the remote side.
        message: String,
    },

    /// The request's deadline passed before a response arrived.
    #[error("request {descriptor} expired before a response arrived")]
    Expired {
        /// The expired request.
        descriptor: Descriptor,
    },

    /// The connection ended before a response arrived.
    #[error("connection closed before request {descriptor} was answered")]
    Disconnected {
        /// The abandoned request.
        descriptor: Descriptor,
    },
}

/// Result delivered to a [`PendingResult`].
pub type Outcome = Result<PropertyValue, RequestError>;

#[derive(Debug)]
struct Entry {
    sender: oneshot::Sender<Outcome>,
    deadline: Option<Instant>,
}

#[derive(Debug, Default)]
struct TableState {
    next: u64,
    pending: HashMap<Descriptor, Entry>,
    closed: bool,
}

impl TableState {
    fn allocate(&mut self) -> Descriptor {
        let descriptor = Descriptor(self.next.to_string());
        self.next += 1;
        descriptor
    }
}

fn lock(state: &Mutex<TableState>) -> MutexGuard<'_, TableState> {
    // Entries stay consistent even if a holder panicked mid-operation.
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owner of every outstanding correlated request on one connection.
///
/// Cloning yields another handle to the same table.
#[derive(Clone, Default)]
pub struct DescriptorTable {
    state: Arc<Mutex<TableState>>,
}

impl DescriptorTable {
    /// Creates an empty table whose first descriptor is `"0"`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh descriptor without registering a pending result.
    ///
    /// Used for requests answered by notifications rather than a single
    /// response, such as form upload progress.
    #[must_use]
    pub fn allocate(&self) -> Descriptor {
        lock(&self.state).allocate()
    }

    /// Registers a request that waits until answered or abandoned.
    #[must_use]
    pub fn issue(&self) -> (Descriptor, PendingResult) {
        self.register(None)
    }

    /// Registers a request that fails with [`RequestError::Expired`] once
    /// `deadline` passes.
    #[must_use]
    pub fn issue_with_deadline(&self, deadline: Instant) -> (Descriptor, PendingResult) {
        self.register(Some(deadline))
    }

    fn register(&self, deadline: Option<Instant>) -> (Descriptor, PendingResult) {
        let (sender, receiver) = oneshot::channel();
        let (descriptor, closed) = {
            let mut state = lock(&self.state);
            let descriptor = state.allocate();
            let closed = state.closed;
            if closed {
                // The receiver observes the dropped sender as a disconnect.
                drop(sender);
            } else {
                state
                    .pending
                    .insert(descriptor.clone(), Entry { sender, deadline });
            }
            (descriptor, closed)
        };
        debug!(
            target: CORRELATION_TARGET,
            descriptor = %descriptor,
            has_deadline = deadline.is_some(),
            closed,
            "descriptor issued"
        );
        let pending = PendingResult {
            descriptor: descriptor.clone(),
            receiver,
            deadline,
            table: Arc::downgrade(&self.state),
        };
        (descriptor, pending)
    }

    /// Resolves the request registered under `descriptor`.
    ///
    /// Returns `false` when no such request is outstanding, which happens for
    /// duplicate, stale, or fabricated responses. That case is not an error.
    pub fn complete(&self, descriptor: &Descriptor, outcome: Outcome) -> bool {
        let entry = lock(&self.state).pending.remove(descriptor);
        let Some(entry) = entry else {
            debug!(
                target: CORRELATION_TARGET,
                descriptor = %descriptor,
                "ignoring completion for unknown descriptor"
            );
            return false;
        };
        if entry.sender.send(outcome).is_err() {
            debug!(
                target: CORRELATION_TARGET,
                descriptor = %descriptor,
                "requester went away before completion"
            );
        }
        true
    }

    /// Fails every request whose deadline is at or before `now`.
    ///
    /// Returns the number of requests expired.
    pub fn expire_stale(&self, now: Instant) -> usize {
        let expired: Vec<(Descriptor, Entry)> = {
            let mut state = lock(&self.state);
            let stale: Vec<Descriptor> = state
                .pending
                .iter()
                .filter(|(_, entry)| entry.deadline.is_some_and(|deadline| deadline <= now))
                .map(|(descriptor, _)| descriptor.clone())
                .collect();
            stale
                .into_iter()
                .filter_map(|descriptor| {
                    state
                        .pending
                        .remove(&descriptor)
                        .map(|entry| (descriptor, entry))
                })
                .collect()
        };

        let count = expired.len();
        for (descriptor, entry) in expired {
            warn!(
                target: CORRELATION_TARGET,
                descriptor = %descriptor,
                "request expired"
            );
            // The requester may already have stopped waiting.
            drop(entry.sender.send(Err(RequestError::Expired { descriptor })));
        }
        count
    }

    /// Drops every outstanding request so waiters observe
    /// [`RequestError::Disconnected`], and closes the table: requests issued
    /// afterwards resolve to [`RequestError::Disconnected`] immediately.
    ///
    /// Returns the number of requests abandoned.
    pub fn abandon_all(&self) -> usize {
        let drained: Vec<Descriptor> = {
            let mut state = lock(&self.state);
            state.closed = true;
            state.pending.drain().map(|(d, _)| d).collect()
        };
        if !drained.is_empty() {
            warn!(
                target: CORRELATION_TARGET,
                count = drained.len(),
                "abandoning outstanding requests"
            );
        }
        drained.len()
    }

    /// Returns the number of outstanding requests.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        lock(&self.state).pending.len()
    }

    /// Returns whether [`abandon_all`](Self::abandon_all) has closed the
    /// table.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    /// Returns whether `descriptor` is outstanding.
    #[must_use]
    pub fn is_outstanding(&self, descriptor: &Descriptor) -> bool {
        lock(&self.state).pending.contains_key(descriptor)
    }
}

impl fmt::Debug for DescriptorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("DescriptorTable")
            .field("next", &state.next)
            .field("outstanding", &state.pending.len())
            .field("closed", &state.closed)
            .finish()
    }
}

/// Caller-side handle for one correlated request.
///
/// Dropping the handle abandons the request: its table entry is removed and a
/// late response is ignored.
#[derive(Debug)]
pub struct PendingResult {
    descriptor: Descriptor,
    receiver: oneshot::Receiver<Outcome>,
    deadline: Option<Instant>,
    table: Weak<Mutex<TableState>>,
}

impl PendingResult {
    /// Returns the descriptor this handle waits on.
    #[must_use]
    pub const fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Returns the deadline, if one was set.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Waits for the response.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Remote`] when the remote side reported a
    /// failure, [`RequestError::Expired`] when the deadline passed, and
    /// [`RequestError::Disconnected`] when the connection ended first.
    pub async fn wait(mut self) -> Outcome {
        let received = match self.deadline {
            Some(deadline) => {
                match tokio::time::timeout_at(deadline, &mut self.receiver).await {
                    Ok(received) => received,
                    Err(_) => {
                        return Err(RequestError::Expired {
                            descriptor: self.descriptor.clone(),
                        });
                    }
                }
            }
            None => (&mut self.receiver).await,
        };
        received.unwrap_or_else(|_| {
            Err(RequestError::Disconnected {
                descriptor: self.descriptor.clone(),
            })
        })
    }
}

impl Drop for PendingResult {
    fn drop(&mut self) {
        if let Some(state) = self.table.upgrade() {
            lock(&state).pending.remove(&self.descriptor);
        }
    }
}
