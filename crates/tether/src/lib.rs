//! Server-side core of the tether remote-rendering protocol.
//!
//! A server process computes changes to a UI tree; a thin remote runtime
//! owns the visible document. This crate carries everything that crosses
//! the wire between them:
//!
//! - a compact codec for hierarchical [`NodeId`]s and sigil-prefixed
//!   attribute names ([`codec`]),
//! - the numeric procedure, mutation, and message code tables
//!   ([`protocol`]),
//! - a [`CommandEncoder`] that sends single-shot procedures and atomic
//!   [`DomBatch`]es,
//! - a [`DescriptorTable`] that correlates property requests with their
//!   asynchronous responses,
//! - a [`Dispatcher`] that reads inbound messages one at a time and routes
//!   them to an [`InboundHandler`] or to the table.
//!
//! Transport plumbing stays outside: anything implementing [`Channel`] and
//! [`MessageSource`] can carry the protocol. [`channel::memory`] and
//! [`channel::line`] ship as ready-made implementations.
//!
//! # Example
//!
//! ```rust
//! use tether::channel::memory;
//! use tether::codec::HTML_NAMESPACE;
//! use tether::{DomEvent, FormProgress, Frontend, InboundHandler, NodeId};
//! use tether_config::Config;
//!
//! struct Logger;
//!
//! impl InboundHandler for Logger {
//!     fn on_dom_event(&mut self, _event: DomEvent) {}
//!     fn on_history_changed(&mut self, _path: String) {}
//!     fn on_form_progress(&mut self, _progress: FormProgress) {}
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let runtime = tokio::runtime::Builder::new_current_thread().build()?;
//! # runtime.block_on(async {
//! let (channel, source, mut remote) = memory::pair();
//! let (frontend, _dispatcher) = Frontend::start(channel, source, Logger, &Config::default());
//!
//! let button = NodeId::from_segments(vec![0]);
//! let mut batch = frontend.start_batch();
//! batch
//!     .create(NodeId::root(), button.clone(), HTML_NAMESPACE, "button")
//!     .set_attr(button.clone(), HTML_NAMESPACE, "^disabled", false);
//! batch.flush().await?;
//!
//! let pending = frontend.extract_property(&button, "disabled").await?;
//! remote.next_frame().await;
//! assert_eq!(remote.next_frame().await.as_deref(), Some(r#"[3,"0","0","disabled"]"#));
//!
//! remote.push(r#"[2,"0:2:false"]"#)?;
//! assert_eq!(pending.wait().await?.raw(), "false");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # })
//! # }
//! ```

pub mod channel;
pub mod codec;
pub mod correlation;
pub mod dispatch;
pub mod encoder;
mod frontend;
pub mod inbound;
pub mod protocol;
pub mod telemetry;

#[cfg(test)]
mod tests;

pub use self::channel::{Channel, ChannelError, MessageSource};
pub use self::codec::{NodeId, NodeIdError};
pub use self::correlation::{
    Descriptor, DescriptorTable, Outcome, PendingResult, PropertyValue, RequestError,
};
pub use self::dispatch::{
    Dispatcher, DispatcherExit, DispatcherHandle, DispatcherState, InboundHandler,
};
pub use self::encoder::{CommandEncoder, DomBatch};
pub use self::frontend::{Frontend, FrontendError};
pub use self::inbound::{DomEvent, FormProgress, InboundMessage, PropertyResponse};
pub use self::protocol::{
    DecodeError, DomMutation, InboundKind, MutationCode, Procedure, PropertyTag,
};
