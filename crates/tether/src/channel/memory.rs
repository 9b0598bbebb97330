//! In-process duplex channel.
//!
//! [`pair`] returns the server-side halves that plug into a
//! [`Frontend`](crate::Frontend) together with a [`RemoteEnd`] that plays the
//! part of the remote runtime: it reads what the server sent and injects
//! what the runtime would send back.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::trace;

use super::{CHANNEL_TARGET, Channel, ChannelError, MessageSource};

type Inbound = Result<String, ChannelError>;

/// Creates a connected in-memory channel.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use tether::channel::{Channel, MessageSource, memory};
///
/// # fn main() -> Result<(), tether::channel::ChannelError> {
/// # let runtime = tokio::runtime::Builder::new_current_thread().build()?;
/// # runtime.block_on(async {
/// let (channel, mut source, mut remote) = memory::pair();
/// channel.send_message(vec![json!(8)]).await?;
/// assert_eq!(remote.next_frame().await.as_deref(), Some("[8]"));
///
/// remote.push("[3,\"/home\"]")?;
/// assert_eq!(source.next_message().await?.as_deref(), Some("[3,\"/home\"]"));
/// # Ok(())
/// # })
/// # }
/// ```
#[must_use]
pub fn pair() -> (MemoryChannel, MemorySource, RemoteEnd) {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    (
        MemoryChannel {
            outbound: outbound_tx,
        },
        MemorySource {
            inbound: inbound_rx,
        },
        RemoteEnd {
            outbound: outbound_rx,
            inbound: Some(inbound_tx),
        },
    )
}

/// Server-side sender of an in-memory channel.
#[derive(Debug, Clone)]
pub struct MemoryChannel {
    outbound: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl Channel for MemoryChannel {
    async fn send_message(&self, values: Vec<Value>) -> Result<(), ChannelError> {
        let frame = serde_json::to_string(&values)?;
        trace!(target: CHANNEL_TARGET, bytes = frame.len(), "memory frame sent");
        self.outbound.send(frame).map_err(|_| ChannelError::Closed)
    }
}

/// Server-side receiver of an in-memory channel.
#[derive(Debug)]
pub struct MemorySource {
    inbound: mpsc::UnboundedReceiver<Inbound>,
}

#[async_trait]
impl MessageSource for MemorySource {
    async fn next_message(&mut self) -> Result<Option<String>, ChannelError> {
        self.inbound.recv().await.transpose()
    }
}

/// The remote runtime's side of an in-memory channel.
#[derive(Debug)]
pub struct RemoteEnd {
    outbound: mpsc::UnboundedReceiver<String>,
    inbound: Option<mpsc::UnboundedSender<Inbound>>,
}

impl RemoteEnd {
    /// Waits for the next frame the server sent.
    ///
    /// Returns `None` once every server-side sender is dropped.
    pub async fn next_frame(&mut self) -> Option<String> {
        self.outbound.recv().await
    }

    /// Returns the next frame the server sent, if one is already queued.
    pub fn try_next_frame(&mut self) -> Option<String> {
        self.outbound.try_recv().ok()
    }

    /// Waits for the next frame and parses it into its values.
    ///
    /// Returns `None` when the channel is closed or the frame is not a JSON
    /// array.
    pub async fn next_values(&mut self) -> Option<Vec<Value>> {
        let frame = self.next_frame().await?;
        serde_json::from_str(&frame).ok()
    }

    /// Delivers a raw inbound message to the server.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Closed`] after [`hang_up`](Self::hang_up) or
    /// once the server-side source is dropped.
    pub fn push(&self, raw: impl Into<String>) -> Result<(), ChannelError> {
        self.deliver(Ok(raw.into()))
    }

    /// Makes the server-side source fail with `error` on its next read.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Closed`] when the source is already gone.
    pub fn push_failure(&self, error: ChannelError) -> Result<(), ChannelError> {
        self.deliver(Err(error))
    }

    /// Closes the inbound direction; the source then reports end of stream.
    pub fn hang_up(&mut self) {
        self.inbound = None;
    }

    fn deliver(&self, message: Inbound) -> Result<(), ChannelError> {
        self.inbound
            .as_ref()
            .ok_or(ChannelError::Closed)?
            .send(message)
            .map_err(|_| ChannelError::Closed)
    }
}
