//! The application-facing facade over one connection.
//!
//! A [`Frontend`] bundles the [`CommandEncoder`] and [`DescriptorTable`] for
//! a connection and exposes one method per procedure. It is cheap to clone;
//! clones share the channel and the table.

use std::time::Duration;

use serde_json::Value;
use tether_config::Config;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tracing::warn;

use crate::channel::line::{LineChannel, LineSource};
use crate::channel::{Channel, ChannelError, MessageSource};
use crate::codec::NodeId;
use crate::correlation::{Descriptor, DescriptorTable, PendingResult, PropertyValue, RequestError};
use crate::dispatch::{Dispatcher, DispatcherHandle, InboundHandler};
use crate::encoder::{CommandEncoder, DomBatch};
use crate::protocol::Procedure;

/// Log target for facade operations.
const FRONTEND_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::frontend");

/// Errors surfaced by [`Frontend`] operations.
#[derive(Debug, Error)]
pub enum FrontendError {
    /// The command could not be sent.
    #[error(transparent)]
    Channel(#[from] ChannelError),
    /// The remote runtime answered with a failure, or never answered.
    #[error(transparent)]
    Request(#[from] RequestError),
}

/// Server-side handle to a remote rendering runtime.
#[derive(Debug)]
pub struct Frontend<C> {
    encoder: CommandEncoder<C>,
    table: DescriptorTable,
    request_timeout: Option<Duration>,
}

impl<C> Clone for Frontend<C> {
    fn clone(&self) -> Self {
        Self {
            encoder: self.encoder.clone(),
            table: self.table.clone(),
            request_timeout: self.request_timeout,
        }
    }
}

impl<C: Channel> Frontend<C> {
    /// Builds a facade over `channel` that correlates through `table`.
    ///
    /// Responses only resolve if a [`Dispatcher`] shares the same table; see
    /// [`start`](Self::start) for the usual wiring.
    #[must_use]
    pub fn new(channel: C, table: DescriptorTable) -> Self {
        Self {
            encoder: CommandEncoder::new(channel),
            table,
            request_timeout: None,
        }
    }

    /// Applies `timeout` to every subsequent property request.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Wires a facade and a dispatcher around one connection and starts the
    /// dispatcher on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn start<S, H>(channel: C, source: S, handler: H, config: &Config) -> (Self, DispatcherHandle)
    where
        S: MessageSource,
        H: InboundHandler,
    {
        let table = DescriptorTable::new();
        let dispatcher = Dispatcher::new(source, handler, table.clone()).spawn();
        let frontend = Self::new(channel, table).with_request_timeout(config.request_timeout());
        (frontend, dispatcher)
    }

    /// Returns the table correlating this connection's requests.
    #[must_use]
    pub const fn table(&self) -> &DescriptorTable {
        &self.table
    }

    /// Announces the render generation subsequent events refer to.
    ///
    /// # Errors
    ///
    /// Returns [`FrontendError::Channel`] when the send fails.
    pub async fn set_render_generation(&self, generation: u64) -> Result<(), FrontendError> {
        self.send(Procedure::SetRenderGeneration, vec![Value::from(generation)])
            .await
    }

    /// Removes every child of the remote document root.
    ///
    /// # Errors
    ///
    /// Returns [`FrontendError::Channel`] when the send fails.
    pub async fn clean_root(&self) -> Result<(), FrontendError> {
        self.send(Procedure::CleanRoot, Vec::new()).await
    }

    /// Subscribes to DOM events of `event_type`.
    ///
    /// # Errors
    ///
    /// Returns [`FrontendError::Channel`] when the send fails.
    pub async fn listen_event(
        &self,
        event_type: &str,
        prevent_default: bool,
    ) -> Result<(), FrontendError> {
        self.send(
            Procedure::ListenEvent,
            vec![Value::from(event_type), Value::from(prevent_default)],
        )
        .await
    }

    /// Requests the live value of property `name` on node `id`.
    ///
    /// Returns as soon as the request is sent. The [`PendingResult`] resolves
    /// when the dispatcher sees the matching response, or fails with
    /// [`RequestError::Expired`] when a request timeout is configured and
    /// passes first.
    ///
    /// # Errors
    ///
    /// Returns [`FrontendError::Channel`] when the send fails; no request
    /// is left outstanding in that case.
    pub async fn extract_property(
        &self,
        id: &NodeId,
        name: &str,
    ) -> Result<PendingResult, FrontendError> {
        let (descriptor, pending) = match self.deadline() {
            Some(deadline) => self.table.issue_with_deadline(deadline),
            None => self.table.issue(),
        };
        self.send(
            Procedure::ExtractProperty,
            vec![
                Value::from(descriptor.as_str()),
                Value::from(id),
                Value::from(name),
            ],
        )
        .await?;
        Ok(pending)
    }

    /// Requests a property and waits for its value.
    ///
    /// # Errors
    ///
    /// Returns [`FrontendError::Channel`] when the send fails and
    /// [`FrontendError::Request`] when the request fails remotely, expires,
    /// or is abandoned.
    pub async fn property(&self, id: &NodeId, name: &str) -> Result<PropertyValue, FrontendError> {
        let pending = self.extract_property(id, name).await?;
        Ok(pending.wait().await?)
    }

    /// Moves input focus to node `id`.
    ///
    /// # Errors
    ///
    /// Returns [`FrontendError::Channel`] when the send fails.
    pub async fn focus(&self, id: &NodeId) -> Result<(), FrontendError> {
        self.send(Procedure::Focus, vec![Value::from(id)]).await
    }

    /// Pushes `path` onto the remote browser history.
    ///
    /// # Errors
    ///
    /// Returns [`FrontendError::Channel`] when the send fails.
    pub async fn change_page_url(&self, path: &str) -> Result<(), FrontendError> {
        self.send(Procedure::ChangePageUrl, vec![Value::from(path)])
            .await
    }

    /// Starts uploading the form at node `id`.
    ///
    /// Progress arrives through
    /// [`InboundHandler::on_form_progress`] tagged with the returned
    /// descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`FrontendError::Channel`] when the send fails.
    pub async fn upload_form(&self, id: &NodeId) -> Result<Descriptor, FrontendError> {
        let descriptor = self.table.allocate();
        self.send(
            Procedure::UploadForm,
            vec![Value::from(id), Value::from(descriptor.as_str())],
        )
        .await?;
        Ok(descriptor)
    }

    /// Reloads every stylesheet linked by the remote document.
    ///
    /// # Errors
    ///
    /// Returns [`FrontendError::Channel`] when the send fails.
    pub async fn reload_css(&self) -> Result<(), FrontendError> {
        self.send(Procedure::ReloadCss, Vec::new()).await
    }

    /// Opens a mutation batch on this connection.
    #[must_use]
    pub fn start_batch(&self) -> DomBatch<C> {
        self.encoder.start_batch()
    }

    /// A timeout too large to represent as an instant means no deadline.
    fn deadline(&self) -> Option<Instant> {
        let timeout = self.request_timeout?;
        let deadline = Instant::now().checked_add(timeout);
        if deadline.is_none() {
            warn!(
                target: FRONTEND_TARGET,
                timeout_secs = timeout.as_secs(),
                "request timeout out of range; waiting without a deadline"
            );
        }
        deadline
    }

    async fn send(&self, procedure: Procedure, args: Vec<Value>) -> Result<(), FrontendError> {
        self.encoder.send(procedure, args).await?;
        Ok(())
    }
}

impl<W> Frontend<LineChannel<W>>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Starts a connection speaking newline-delimited JSON over a byte
    /// stream pair, honouring the configured frame limit.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn start_lines<R, H>(
        reader: R,
        writer: W,
        handler: H,
        config: &Config,
    ) -> (Self, DispatcherHandle)
    where
        R: AsyncRead + Unpin + Send + 'static,
        H: InboundHandler,
    {
        let source = LineSource::with_max_frame_bytes(reader, config.max_frame_bytes());
        Self::start(LineChannel::new(writer), source, handler, config)
    }
}
