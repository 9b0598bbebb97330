//! Outbound command encoding.
//!
//! Single-shot procedures go straight to the channel as one message each.
//! DOM mutations are accumulated in a [`DomBatch`] and leave as one
//! `ModifyDom` message on [`DomBatch::flush`], so the remote document never
//! observes a partially applied change.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace};

use crate::channel::{Channel, ChannelError};
use crate::codec::NodeId;
use crate::protocol::{DomMutation, Procedure};

/// Log target for encoder operations.
const ENCODER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::encoder");

/// Serialises procedures onto a shared [`Channel`].
#[derive(Debug)]
pub struct CommandEncoder<C> {
    channel: Arc<C>,
}

impl<C> Clone for CommandEncoder<C> {
    fn clone(&self) -> Self {
        Self {
            channel: Arc::clone(&self.channel),
        }
    }
}

impl<C: Channel> CommandEncoder<C> {
    /// Wraps `channel`.
    #[must_use]
    pub fn new(channel: C) -> Self {
        Self::from_shared(Arc::new(channel))
    }

    /// Wraps a channel already shared with other components.
    #[must_use]
    pub const fn from_shared(channel: Arc<C>) -> Self {
        Self { channel }
    }

    /// Sends `[procedure, args...]` as one message.
    ///
    /// # Errors
    ///
    /// Returns the [`ChannelError`] raised by the underlying channel.
    pub async fn send(&self, procedure: Procedure, args: Vec<Value>) -> Result<(), ChannelError> {
        let mut message = Vec::with_capacity(args.len() + 1);
        message.push(Value::from(procedure.code()));
        message.extend(args);
        trace!(
            target: ENCODER_TARGET,
            procedure = procedure.code(),
            args = message.len() - 1,
            "sending procedure"
        );
        self.channel.send_message(message).await
    }

    /// Opens a new, empty mutation batch on this encoder's channel.
    ///
    /// Only one producer should hold an open batch per connection at a time;
    /// batches do not coordinate with each other.
    #[must_use]
    pub fn start_batch(&self) -> DomBatch<C> {
        DomBatch {
            channel: Arc::clone(&self.channel),
            frame: DomBatch::<C>::empty_frame(),
            mutations: 0,
        }
    }
}

/// An ordered buffer of [`DomMutation`]s sent as a single `ModifyDom`
/// message.
///
/// ```
/// use tether::{CommandEncoder, NodeId, channel::memory, codec::HTML_NAMESPACE};
///
/// # fn main() -> Result<(), tether::channel::ChannelError> {
/// # let runtime = tokio::runtime::Builder::new_current_thread().build()?;
/// # runtime.block_on(async {
/// let (channel, _source, mut remote) = memory::pair();
/// let encoder = CommandEncoder::new(channel);
///
/// let mut batch = encoder.start_batch();
/// batch.create(NodeId::root(), NodeId::from_segments(vec![0]), HTML_NAMESPACE, "div");
/// batch.create_text(NodeId::from_segments(vec![0]), NodeId::from_segments(vec![0, 0]), "hi");
/// assert!(batch.flush().await?);
///
/// assert_eq!(
///     remote.next_frame().await.as_deref(),
///     Some(r#"[4,0,"","0",0,"div",1,"0","0_0","hi"]"#)
/// );
/// # Ok(())
/// # })
/// # }
/// ```
#[derive(Debug)]
pub struct DomBatch<C> {
    channel: Arc<C>,
    frame: Vec<Value>,
    mutations: usize,
}

impl<C: Channel> DomBatch<C> {
    fn empty_frame() -> Vec<Value> {
        vec![Value::from(Procedure::ModifyDom.code())]
    }

    /// Appends one mutation after every mutation already in the batch.
    pub fn append(&mut self, mutation: &DomMutation) -> &mut Self {
        mutation.encode_into(&mut self.frame);
        self.mutations += 1;
        self
    }

    /// Appends a `Create` mutation.
    pub fn create(
        &mut self,
        parent: NodeId,
        id: NodeId,
        namespace: &str,
        tag: &str,
    ) -> &mut Self {
        self.append(&DomMutation::Create {
            parent,
            id,
            namespace: namespace.to_owned(),
            tag: tag.to_owned(),
        })
    }

    /// Appends a `CreateText` mutation.
    pub fn create_text(&mut self, parent: NodeId, id: NodeId, text: &str) -> &mut Self {
        self.append(&DomMutation::CreateText {
            parent,
            id,
            text: text.to_owned(),
        })
    }

    /// Appends a `Remove` mutation.
    pub fn remove(&mut self, parent: NodeId, id: NodeId) -> &mut Self {
        self.append(&DomMutation::Remove { parent, id })
    }

    /// Appends the mutation assigning `value` to a sigil-prefixed name.
    ///
    /// See [`DomMutation::set_attr`] for the sigil rules.
    pub fn set_attr(
        &mut self,
        id: NodeId,
        namespace: &str,
        name: &str,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.append(&DomMutation::set_attr(id, namespace, name, value))
    }

    /// Appends the mutation removing a sigil-prefixed name.
    pub fn remove_attr(&mut self, id: NodeId, namespace: &str, name: &str) -> &mut Self {
        self.append(&DomMutation::remove_attr(id, namespace, name))
    }

    /// Returns the number of mutations waiting to be flushed.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.mutations
    }

    /// Returns `true` when nothing has been appended since the last flush.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.mutations == 0
    }

    /// Sends every buffered mutation as one message and clears the buffer.
    ///
    /// An empty batch sends nothing. Returns whether a message was sent. The
    /// buffer is cleared once the send completes, even when it fails; the
    /// batch can be reused.
    ///
    /// # Cancel safety
    ///
    /// The buffer is only cleared after the send resolves. Dropping the
    /// returned future mid-send leaves every mutation in the batch, so a
    /// later `flush` sends them again.
    ///
    /// # Errors
    ///
    /// Returns the [`ChannelError`] raised by the underlying channel.
    pub async fn flush(&mut self) -> Result<bool, ChannelError> {
        if self.is_empty() {
            trace!(target: ENCODER_TARGET, "empty batch elided");
            return Ok(false);
        }
        debug!(
            target: ENCODER_TARGET,
            mutations = self.mutations,
            values = self.frame.len(),
            "flushing dom batch"
        );
        let sent = self.channel.send_message(self.frame.clone()).await;
        self.frame = Self::empty_frame();
        self.mutations = 0;
        sent.map(|()| true)
    }
}

#[cfg(test)]
mod tests;
