//! Node identifier and attribute-name codecs.
//!
//! Both halves of this module are part of the wire contract with the remote
//! runtime: identifiers travel as underscore-joined child indices, and
//! attribute names carry a leading sigil that selects between an HTML
//! attribute, a JavaScript property, and an inline style entry.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;

/// Separator placed between the segments of an encoded [`NodeId`].
pub const ID_SEPARATOR: char = '_';

/// The document (HTML) namespace, sent as the sentinel `0` on the wire.
pub const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Prefix marking an attribute name as a JavaScript property.
pub const PROPERTY_SIGIL: char = '^';

/// Prefix marking an attribute name as an inline style entry.
pub const STYLE_SIGIL: char = '*';

/// Position of a node in the UI tree, expressed as child indices from the
/// root.
///
/// The empty identifier is the root and encodes to the empty string.
///
/// # Example
///
/// ```
/// use tether::NodeId;
///
/// let id: NodeId = "0_1".parse().expect("valid id");
/// assert_eq!(id.segments(), &[0, 1]);
/// assert_eq!(id.parent(), Some(NodeId::from_segments(vec![0])));
/// assert_eq!(id.to_string(), "0_1");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(Vec<u32>);

impl NodeId {
    /// Returns the root identifier.
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Builds an identifier from its child indices.
    #[must_use]
    pub const fn from_segments(segments: Vec<u32>) -> Self {
        Self(segments)
    }

    /// Returns the identifier of this node's `index`-th child.
    #[must_use]
    pub fn child(&self, index: u32) -> Self {
        let mut segments = self.0.clone();
        segments.push(index);
        Self(segments)
    }

    /// Returns the child indices from the root.
    #[must_use]
    pub fn segments(&self) -> &[u32] {
        &self.0
    }

    /// Returns whether this is the root identifier.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the parent identifier, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.0
            .split_last()
            .map(|(_, init)| Self(init.to_vec()))
    }

    /// Encodes the identifier to its wire form.
    #[must_use]
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut segments = self.0.iter();
        if let Some(first) = segments.next() {
            write!(f, "{first}")?;
            for segment in segments {
                write!(f, "{ID_SEPARATOR}{segment}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for NodeId {
    type Err = NodeIdError;

    fn from_str(encoded: &str) -> Result<Self, Self::Err> {
        if encoded.is_empty() {
            return Ok(Self::root());
        }
        encoded
            .split(ID_SEPARATOR)
            .map(|segment| {
                if segment.is_empty() {
                    return Err(NodeIdError::EmptySegment {
                        input: encoded.to_owned(),
                    });
                }
                segment.parse().map_err(|_| NodeIdError::InvalidSegment {
                    input: encoded.to_owned(),
                    segment: segment.to_owned(),
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl From<&NodeId> for Value {
    fn from(id: &NodeId) -> Self {
        Self::String(id.encode())
    }
}

/// Errors raised while parsing an encoded [`NodeId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeIdError {
    /// Two separators were adjacent, or the id started or ended with one.
    #[error("node id '{input}' contains an empty segment")]
    EmptySegment {
        /// The rejected input.
        input: String,
    },
    /// A segment was not a non-negative integer.
    #[error("node id '{input}' has non-numeric segment '{segment}'")]
    InvalidSegment {
        /// The rejected input.
        input: String,
        /// The offending segment.
        segment: String,
    },
}

/// What an attribute name addresses on the remote node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrTarget {
    /// A plain HTML attribute.
    Attribute,
    /// A JavaScript property on the element object.
    Property,
    /// An inline style entry.
    Style,
}

/// Splits a sigil-prefixed attribute name into its target and bare name.
///
/// ```
/// use tether::codec::{AttrTarget, classify_attr};
///
/// assert_eq!(classify_attr("^checked"), (AttrTarget::Property, "checked"));
/// assert_eq!(classify_attr("*color"), (AttrTarget::Style, "color"));
/// assert_eq!(classify_attr("href"), (AttrTarget::Attribute, "href"));
/// ```
#[must_use]
pub fn classify_attr(name: &str) -> (AttrTarget, &str) {
    if let Some(bare) = name.strip_prefix(PROPERTY_SIGIL) {
        (AttrTarget::Property, bare)
    } else if let Some(bare) = name.strip_prefix(STYLE_SIGIL) {
        (AttrTarget::Style, bare)
    } else {
        (AttrTarget::Attribute, name)
    }
}

/// Encodes a namespace URI, collapsing the HTML namespace to `0`.
#[must_use]
pub fn encode_namespace(namespace: &str) -> Value {
    if namespace == HTML_NAMESPACE {
        Value::from(0)
    } else {
        Value::from(namespace)
    }
}

/// Decodes a namespace written by [`encode_namespace`].
///
/// Returns `None` when the value is neither the sentinel nor a string.
#[must_use]
pub fn decode_namespace(value: &Value) -> Option<&str> {
    match value {
        Value::Number(number) if number.as_u64() == Some(0) => Some(HTML_NAMESPACE),
        Value::String(namespace) => Some(namespace.as_str()),
        _ => None,
    }
}
