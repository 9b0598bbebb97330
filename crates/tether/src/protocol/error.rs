//! Decoding failures for a single wire message.
//!
//! A `DecodeError` always describes one message. Callers log it and move on;
//! it never implies the underlying channel is broken.

use thiserror::Error;

use super::InboundKind;
use crate::codec::NodeIdError;

/// Errors raised while decoding one wire message.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The message was not a `[code, "payload"]` JSON pair.
    #[error("malformed envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    /// The kind code is not one this side understands.
    #[error("unknown inbound kind code {code}")]
    UnknownKind {
        /// The unrecognised code.
        code: u64,
    },

    /// A colon-separated payload field was absent.
    #[error("{kind} payload is missing its {field} field")]
    MissingField {
        /// Kind of the message being decoded.
        kind: InboundKind,
        /// Name of the missing field.
        field: &'static str,
    },

    /// A numeric payload field did not parse.
    #[error("{kind} payload field {field} is not a number: {value:?}")]
    NotANumber {
        /// Kind of the message being decoded.
        kind: InboundKind,
        /// Name of the offending field.
        field: &'static str,
        /// The raw field text.
        value: String,
    },

    /// A property response carried a tag code outside the known set.
    #[error("unknown property tag code {code}")]
    UnknownPropertyTag {
        /// The unrecognised code.
        code: u64,
    },

    /// A node identifier field did not parse.
    #[error("invalid node id: {0}")]
    NodeId(#[from] NodeIdError),

    /// A frame expected to be a `ModifyDom` batch started with another code.
    #[error("frame is not a modify-dom batch")]
    NotABatch,

    /// A batch contained a mutation code outside the known set.
    #[error("unknown mutation code at position {position}")]
    UnknownMutation {
        /// Index of the offending value within the frame.
        position: usize,
    },

    /// A batch ended early or held a value of the wrong type.
    #[error("mutation field {field} at position {position} is missing or mistyped")]
    MutationField {
        /// Name of the expected field.
        field: &'static str,
        /// Index of the expected value within the frame.
        position: usize,
    },
}
