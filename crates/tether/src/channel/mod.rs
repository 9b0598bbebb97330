//! Channel abstraction between this process and the remote runtime.
//!
//! The protocol core needs exactly two things from a transport: a way to
//! send one message made of a sequence of JSON values, atomically, and a
//! source yielding inbound messages one at a time in arrival order. Socket
//! handling, handshakes, and reconnection all live behind these traits.
//!
//! Two implementations ship with the crate:
//!
//! - [`memory`]: an in-process duplex for tests and embedders.
//! - [`line`]: newline-delimited JSON over any tokio byte stream.

pub mod line;
pub mod memory;

use std::io;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Log target for channel operations.
pub(crate) const CHANNEL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::channel");

/// Outbound half of a connection.
///
/// Each call to [`send_message`](Channel::send_message) must reach the peer
/// as one message; bytes from concurrent calls never interleave.
#[async_trait]
pub trait Channel: Send + Sync + 'static {
    /// Sends `values` as a single message.
    ///
    /// # Errors
    ///
    /// Returns a [`ChannelError`] when the message cannot be encoded or the
    /// underlying transport rejects the write.
    async fn send_message(&self, values: Vec<Value>) -> Result<(), ChannelError>;
}

/// Inbound half of a connection.
#[async_trait]
pub trait MessageSource: Send + 'static {
    /// Waits for the next raw inbound message.
    ///
    /// Returns `Ok(None)` once the peer has closed the stream.
    ///
    /// # Errors
    ///
    /// Returns a [`ChannelError`] when reading fails. The source is unusable
    /// afterwards.
    async fn next_message(&mut self) -> Result<Option<String>, ChannelError>;
}

/// Transport-level failures. Fatal to the connection that raised them.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// I/O error during read or write.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The outbound message could not be serialised.
    #[error("failed to encode outbound message: {0}")]
    Encode(#[from] serde_json::Error),

    /// The peer is gone.
    #[error("channel closed")]
    Closed,

    /// An inbound frame exceeded the configured size limit.
    #[error("inbound frame exceeds the {limit} byte limit")]
    FrameTooLarge {
        /// The configured limit in bytes.
        limit: usize,
    },
}
