//! DOM mutations carried inside a `ModifyDom` batch.

use serde_json::Value;

use super::{DecodeError, MutationCode, Procedure};
use crate::codec::{AttrTarget, NodeId, classify_attr, decode_namespace, encode_namespace};

/// One structural or attribute change to the remote document.
///
/// Mutations are only meaningful inside a batch; see
/// [`DomBatch`](crate::DomBatch).
#[derive(Debug, Clone, PartialEq)]
pub enum DomMutation {
    /// Creates an element under `parent`.
    Create {
        /// Parent node.
        parent: NodeId,
        /// Identifier of the new node.
        id: NodeId,
        /// Element namespace URI.
        namespace: String,
        /// Element tag name.
        tag: String,
    },
    /// Creates a text node under `parent`.
    CreateText {
        /// Parent node.
        parent: NodeId,
        /// Identifier of the new node.
        id: NodeId,
        /// Text content.
        text: String,
    },
    /// Removes `id` from `parent`.
    Remove {
        /// Parent node.
        parent: NodeId,
        /// Node to remove.
        id: NodeId,
    },
    /// Sets an attribute or property.
    SetAttr {
        /// Target node.
        id: NodeId,
        /// Attribute namespace URI.
        namespace: String,
        /// Bare attribute name, without sigil.
        name: String,
        /// New value.
        value: Value,
        /// Whether `name` is a JavaScript property rather than an attribute.
        is_property: bool,
    },
    /// Removes an attribute or clears a property.
    RemoveAttr {
        /// Target node.
        id: NodeId,
        /// Attribute namespace URI.
        namespace: String,
        /// Bare attribute name, without sigil.
        name: String,
        /// Whether `name` is a JavaScript property rather than an attribute.
        is_property: bool,
    },
    /// Sets an inline style entry.
    SetStyle {
        /// Target node.
        id: NodeId,
        /// Style property name.
        name: String,
        /// New value.
        value: String,
    },
    /// Removes an inline style entry.
    RemoveStyle {
        /// Target node.
        id: NodeId,
        /// Style property name.
        name: String,
    },
}

impl DomMutation {
    /// Builds the mutation that assigns `value` to a sigil-prefixed name.
    ///
    /// `^name` yields a property assignment, `*name` an inline style entry
    /// (the namespace is ignored), anything else a plain attribute.
    ///
    /// ```
    /// use serde_json::json;
    /// use tether::{DomMutation, NodeId, codec::HTML_NAMESPACE};
    ///
    /// let mutation = DomMutation::set_attr(NodeId::root(), HTML_NAMESPACE, "^checked", "true");
    /// assert_eq!(
    ///     mutation,
    ///     DomMutation::SetAttr {
    ///         id: NodeId::root(),
    ///         namespace: HTML_NAMESPACE.to_owned(),
    ///         name: "checked".to_owned(),
    ///         value: json!("true"),
    ///         is_property: true,
    ///     }
    /// );
    /// ```
    #[must_use]
    pub fn set_attr(id: NodeId, namespace: &str, name: &str, value: impl Into<Value>) -> Self {
        let json = value.into();
        match classify_attr(name) {
            (AttrTarget::Style, bare) => Self::SetStyle {
                id,
                name: bare.to_owned(),
                value: match json {
                    Value::String(text) => text,
                    other => other.to_string(),
                },
            },
            (target, bare) => Self::SetAttr {
                id,
                namespace: namespace.to_owned(),
                name: bare.to_owned(),
                value: json,
                is_property: target == AttrTarget::Property,
            },
        }
    }

    /// Builds the mutation that removes a sigil-prefixed name.
    #[must_use]
    pub fn remove_attr(id: NodeId, namespace: &str, name: &str) -> Self {
        match classify_attr(name) {
            (AttrTarget::Style, bare) => Self::RemoveStyle {
                id,
                name: bare.to_owned(),
            },
            (target, bare) => Self::RemoveAttr {
                id,
                namespace: namespace.to_owned(),
                name: bare.to_owned(),
                is_property: target == AttrTarget::Property,
            },
        }
    }

    /// Returns the wire code of this mutation.
    #[must_use]
    pub const fn code(&self) -> MutationCode {
        match self {
            Self::Create { .. } => MutationCode::Create,
            Self::CreateText { .. } => MutationCode::CreateText,
            Self::Remove { .. } => MutationCode::Remove,
            Self::SetAttr { .. } => MutationCode::SetAttr,
            Self::RemoveAttr { .. } => MutationCode::RemoveAttr,
            Self::SetStyle { .. } => MutationCode::SetStyle,
            Self::RemoveStyle { .. } => MutationCode::RemoveStyle,
        }
    }

    /// Appends the code and fields of this mutation to a batch frame.
    pub fn encode_into(&self, frame: &mut Vec<Value>) {
        frame.push(Value::from(self.code().code()));
        match self {
            Self::Create {
                parent,
                id,
                namespace,
                tag,
            } => frame.extend([
                Value::from(parent),
                Value::from(id),
                encode_namespace(namespace),
                Value::from(tag.as_str()),
            ]),
            Self::CreateText { parent, id, text } => frame.extend([
                Value::from(parent),
                Value::from(id),
                Value::from(text.as_str()),
            ]),
            Self::Remove { parent, id } => frame.extend([Value::from(parent), Value::from(id)]),
            Self::SetAttr {
                id,
                namespace,
                name,
                value,
                is_property,
            } => frame.extend([
                Value::from(id),
                encode_namespace(namespace),
                Value::from(name.as_str()),
                value.clone(),
                Value::from(*is_property),
            ]),
            Self::RemoveAttr {
                id,
                namespace,
                name,
                is_property,
            } => frame.extend([
                Value::from(id),
                encode_namespace(namespace),
                Value::from(name.as_str()),
                Value::from(*is_property),
            ]),
            Self::SetStyle { id, name, value } => frame.extend([
                Value::from(id),
                Value::from(name.as_str()),
                Value::from(value.as_str()),
            ]),
            Self::RemoveStyle { id, name } => {
                frame.extend([Value::from(id), Value::from(name.as_str())]);
            }
        }
    }

    /// Decodes a complete `ModifyDom` frame back into its mutations.
    ///
    /// This is the interpretation the remote runtime applies; it exists so
    /// the encoding can be checked from this side of the wire.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] when the frame does not start with the
    /// `ModifyDom` code, holds an unknown mutation code, or ends early.
    pub fn decode_batch(frame: &[Value]) -> Result<Vec<Self>, DecodeError> {
        let mut cursor = FrameCursor { frame, position: 0 };
        let procedure = cursor.next().and_then(Value::as_u64);
        if procedure != Some(u64::from(Procedure::ModifyDom.code())) {
            return Err(DecodeError::NotABatch);
        }

        let mut mutations = Vec::new();
        while let Some(value) = cursor.next() {
            let code = value
                .as_u64()
                .and_then(MutationCode::from_code)
                .ok_or(DecodeError::UnknownMutation {
                    position: cursor.position - 1,
                })?;
            mutations.push(cursor.mutation(code)?);
        }
        Ok(mutations)
    }
}

struct FrameCursor<'a> {
    frame: &'a [Value],
    position: usize,
}

impl<'a> FrameCursor<'a> {
    fn next(&mut self) -> Option<&'a Value> {
        let value = self.frame.get(self.position)?;
        self.position += 1;
        Some(value)
    }

    fn field<T>(
        &mut self,
        field: &'static str,
        read: impl FnOnce(&'a Value) -> Option<T>,
    ) -> Result<T, DecodeError> {
        let position = self.position;
        self.next()
            .and_then(read)
            .ok_or(DecodeError::MutationField { field, position })
    }

    fn string(&mut self, field: &'static str) -> Result<String, DecodeError> {
        self.field(field, |value| value.as_str().map(str::to_owned))
    }

    fn id(&mut self, field: &'static str) -> Result<NodeId, DecodeError> {
        let encoded = self.field(field, Value::as_str)?;
        Ok(encoded.parse::<NodeId>()?)
    }

    fn namespace(&mut self) -> Result<String, DecodeError> {
        self.field("namespace", |value| decode_namespace(value).map(str::to_owned))
    }

    fn flag(&mut self, field: &'static str) -> Result<bool, DecodeError> {
        self.field(field, Value::as_bool)
    }

    fn mutation(&mut self, code: MutationCode) -> Result<DomMutation, DecodeError> {
        Ok(match code {
            MutationCode::Create => DomMutation::Create {
                parent: self.id("parent")?,
                id: self.id("id")?,
                namespace: self.namespace()?,
                tag: self.string("tag")?,
            },
            MutationCode::CreateText => DomMutation::CreateText {
                parent: self.id("parent")?,
                id: self.id("id")?,
                text: self.string("text")?,
            },
            MutationCode::Remove => DomMutation::Remove {
                parent: self.id("parent")?,
                id: self.id("id")?,
            },
            MutationCode::SetAttr => DomMutation::SetAttr {
                id: self.id("id")?,
                namespace: self.namespace()?,
                name: self.string("name")?,
                value: self.field("value", |value| Some(value.clone()))?,
                is_property: self.flag("is_property")?,
            },
            MutationCode::RemoveAttr => DomMutation::RemoveAttr {
                id: self.id("id")?,
                namespace: self.namespace()?,
                name: self.string("name")?,
                is_property: self.flag("is_property")?,
            },
            MutationCode::SetStyle => DomMutation::SetStyle {
                id: self.id("id")?,
                name: self.string("name")?,
                value: self.string("value")?,
            },
            MutationCode::RemoveStyle => DomMutation::RemoveStyle {
                id: self.id("id")?,
                name: self.string("name")?,
            },
        })
    }
}
