//! Numeric code tables shared with the remote runtime.
//!
//! Every outbound message starts with a [`Procedure`] code, every mutation
//! inside a `ModifyDom` batch starts with a [`MutationCode`], and every
//! inbound message starts with an [`InboundKind`] code. These numbers are the
//! wire contract: existing codes never change meaning, new ones are appended.

mod error;
mod mutation;

use std::fmt;

pub use self::error::DecodeError;
pub use self::mutation::DomMutation;

/// Outbound operation selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Procedure {
    /// `(generation)`: announces the render generation events refer to.
    SetRenderGeneration,
    /// `()`: removes every child of the document root.
    CleanRoot,
    /// `(event_type, prevent_default)`: subscribes to a DOM event type.
    ListenEvent,
    /// `(descriptor, id, name)`: asks for a live property value.
    ExtractProperty,
    /// `(mutation...)`: applies a batch of [`DomMutation`]s.
    ModifyDom,
    /// `(id)`: moves input focus to a node.
    Focus,
    /// `(path)`: pushes a new entry onto the browser history.
    ChangePageUrl,
    /// `(id, descriptor)`: uploads a form, reporting progress by descriptor.
    UploadForm,
    /// `()`: reloads every linked stylesheet.
    ReloadCss,
}

impl Procedure {
    /// Returns the wire code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::SetRenderGeneration => 0,
            Self::CleanRoot => 1,
            Self::ListenEvent => 2,
            Self::ExtractProperty => 3,
            Self::ModifyDom => 4,
            Self::Focus => 5,
            Self::ChangePageUrl => 6,
            Self::UploadForm => 7,
            Self::ReloadCss => 8,
        }
    }

    /// Looks up a procedure by wire code.
    #[must_use]
    pub const fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::SetRenderGeneration),
            1 => Some(Self::CleanRoot),
            2 => Some(Self::ListenEvent),
            3 => Some(Self::ExtractProperty),
            4 => Some(Self::ModifyDom),
            5 => Some(Self::Focus),
            6 => Some(Self::ChangePageUrl),
            7 => Some(Self::UploadForm),
            8 => Some(Self::ReloadCss),
            _ => None,
        }
    }
}

/// Sub-operation selector inside a `ModifyDom` batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationCode {
    /// `(parent, id, namespace, tag)`
    Create,
    /// `(parent, id, text)`
    CreateText,
    /// `(parent, id)`
    Remove,
    /// `(id, namespace, name, value, is_property)`
    SetAttr,
    /// `(id, namespace, name, is_property)`
    RemoveAttr,
    /// `(id, name, value)`
    SetStyle,
    /// `(id, name)`
    RemoveStyle,
}

impl MutationCode {
    /// Returns the wire code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Create => 0,
            Self::CreateText => 1,
            Self::Remove => 2,
            Self::SetAttr => 3,
            Self::RemoveAttr => 4,
            Self::SetStyle => 5,
            Self::RemoveStyle => 6,
        }
    }

    /// Looks up a mutation by wire code.
    #[must_use]
    pub const fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::Create),
            1 => Some(Self::CreateText),
            2 => Some(Self::Remove),
            3 => Some(Self::SetAttr),
            4 => Some(Self::RemoveAttr),
            5 => Some(Self::SetStyle),
            6 => Some(Self::RemoveStyle),
            _ => None,
        }
    }
}

/// Classification of an extracted property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyTag {
    /// A string value.
    String,
    /// A numeric value.
    Number,
    /// A boolean value.
    Boolean,
    /// A JSON-encoded object.
    Object,
    /// The remote side failed; the payload is an error message.
    Error,
}

impl PropertyTag {
    /// Returns the wire code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::String => 0,
            Self::Number => 1,
            Self::Boolean => 2,
            Self::Object => 3,
            Self::Error => 4,
        }
    }

    /// Looks up a tag by wire code.
    #[must_use]
    pub const fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::String),
            1 => Some(Self::Number),
            2 => Some(Self::Boolean),
            3 => Some(Self::Object),
            4 => Some(Self::Error),
            _ => None,
        }
    }
}

/// Classification of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InboundKind {
    /// `generation:target:event_type`
    DomEvent,
    /// `descriptor:loaded:total`
    FormDataProgress,
    /// `descriptor:tag:value`
    ExtractPropertyResponse,
    /// The new location path.
    HistoryChanged,
}

impl InboundKind {
    /// Returns the wire code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::DomEvent => 0,
            Self::FormDataProgress => 1,
            Self::ExtractPropertyResponse => 2,
            Self::HistoryChanged => 3,
        }
    }

    /// Looks up a kind by wire code.
    #[must_use]
    pub const fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::DomEvent),
            1 => Some(Self::FormDataProgress),
            2 => Some(Self::ExtractPropertyResponse),
            3 => Some(Self::HistoryChanged),
            _ => None,
        }
    }

    /// Returns a stable name for logs and error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DomEvent => "dom-event",
            Self::FormDataProgress => "form-data-progress",
            Self::ExtractPropertyResponse => "extract-property-response",
            Self::HistoryChanged => "history-changed",
        }
    }
}

impl fmt::Display for InboundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
