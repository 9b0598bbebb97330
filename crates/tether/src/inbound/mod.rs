//! Decoding of inbound messages from the remote runtime.
//!
//! Every inbound message is a JSON pair `[kind, "payload"]`. The payload is a
//! colon-separated field list whose shape depends on the kind; the last field
//! always absorbs any remaining colons, so event types, paths, and property
//! values may contain them.

use crate::codec::NodeId;
use crate::correlation::{Descriptor, Outcome, PropertyValue, RequestError};
use crate::protocol::{DecodeError, InboundKind, PropertyTag};

/// A user-generated DOM event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomEvent {
    /// Render generation the remote document was at when the event fired.
    pub render_generation: u64,
    /// Node the event targeted.
    pub target: NodeId,
    /// DOM event type, such as `click`.
    pub event_type: String,
}

/// Progress of a form upload started with
/// [`Frontend::upload_form`](crate::Frontend::upload_form).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormProgress {
    /// Descriptor of the upload.
    pub descriptor: Descriptor,
    /// Bytes sent so far.
    pub loaded: u64,
    /// Total bytes to send.
    pub total: u64,
}

/// Answer to an `ExtractProperty` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyResponse {
    /// Descriptor of the originating request.
    pub descriptor: Descriptor,
    /// Classification of `value`.
    pub tag: PropertyTag,
    /// The property value, or an error message when `tag` is
    /// [`PropertyTag::Error`].
    pub value: String,
}

impl PropertyResponse {
    /// Splits the response into its descriptor and the outcome to deliver.
    #[must_use]
    pub fn into_outcome(self) -> (Descriptor, Outcome) {
        let outcome = match self.tag {
            PropertyTag::Error => Err(RequestError::Remote {
                descriptor: self.descriptor.clone(),
                message: self.value,
            }),
            tag => Ok(PropertyValue::new(tag, self.value)),
        };
        (self.descriptor, outcome)
    }
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// See [`DomEvent`].
    DomEvent(DomEvent),
    /// See [`FormProgress`].
    FormDataProgress(FormProgress),
    /// See [`PropertyResponse`].
    PropertyResponse(PropertyResponse),
    /// The user navigated; carries the new path.
    HistoryChanged(String),
}

impl InboundMessage {
    /// Decodes one raw inbound message.
    ///
    /// ```
    /// use tether::{InboundMessage, NodeId};
    ///
    /// let message = InboundMessage::parse(r#"[0,"5:12:click"]"#).expect("valid");
    /// let InboundMessage::DomEvent(event) = message else { panic!("not an event") };
    /// assert_eq!(event.render_generation, 5);
    /// assert_eq!(event.target, NodeId::from_segments(vec![12]));
    /// assert_eq!(event.event_type, "click");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] describing the first problem found. The
    /// error concerns this message only.
    pub fn parse(raw: &str) -> Result<Self, DecodeError> {
        let (code, payload): (u64, String) =
            serde_json::from_str(raw).map_err(DecodeError::Envelope)?;
        let kind = InboundKind::from_code(code).ok_or(DecodeError::UnknownKind { code })?;
        Self::from_payload(kind, &payload)
    }

    fn from_payload(kind: InboundKind, payload: &str) -> Result<Self, DecodeError> {
        let mut fields = Fields {
            kind,
            parts: payload.splitn(3, ':'),
        };
        Ok(match kind {
            InboundKind::DomEvent => Self::DomEvent(DomEvent {
                render_generation: fields.number("render generation")?,
                target: fields.next("target")?.parse()?,
                event_type: fields.next("event type")?.to_owned(),
            }),
            InboundKind::FormDataProgress => Self::FormDataProgress(FormProgress {
                descriptor: Descriptor::new(fields.next("descriptor")?),
                loaded: fields.number("loaded")?,
                total: fields.number("total")?,
            }),
            InboundKind::ExtractPropertyResponse => {
                let descriptor = Descriptor::new(fields.next("descriptor")?);
                let code = fields.number("tag")?;
                let tag =
                    PropertyTag::from_code(code).ok_or(DecodeError::UnknownPropertyTag { code })?;
                Self::PropertyResponse(PropertyResponse {
                    descriptor,
                    tag,
                    value: fields.next("value")?.to_owned(),
                })
            }
            InboundKind::HistoryChanged => Self::HistoryChanged(payload.to_owned()),
        })
    }

    /// Returns the kind of this message.
    #[must_use]
    pub const fn kind(&self) -> InboundKind {
        match self {
            Self::DomEvent(_) => InboundKind::DomEvent,
            Self::FormDataProgress(_) => InboundKind::FormDataProgress,
            Self::PropertyResponse(_) => InboundKind::ExtractPropertyResponse,
            Self::HistoryChanged(_) => InboundKind::HistoryChanged,
        }
    }
}

struct Fields<'a> {
    kind: InboundKind,
    parts: std::str::SplitN<'a, char>,
}

impl<'a> Fields<'a> {
    fn next(&mut self, field: &'static str) -> Result<&'a str, DecodeError> {
        self.parts.next().ok_or(DecodeError::MissingField {
            kind: self.kind,
            field,
        })
    }

    fn number(&mut self, field: &'static str) -> Result<u64, DecodeError> {
        let text = self.next(field)?;
        text.parse().map_err(|_| DecodeError::NotANumber {
            kind: self.kind,
            field,
            value: text.to_owned(),
        })
    }
}
