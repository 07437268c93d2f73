//! # Import Context
//!
//! Frames of the parser's context stack, and the node description the parser
//! accumulates before handing it to an [`Importer`](super::Importer).

use crate::types::{AccessPermission, DataType, MlText, NodeRef, QName};
use std::collections::BTreeMap;

/// Raw property value as read from the document, before datatype coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportValue {
    /// `None` is an explicit null.
    Single(Option<String>),
    Collection(Vec<Option<String>>),
    MlText(MlText),
}

impl ImportValue {
    /// Append a value; a second value turns a single value into a collection.
    pub(crate) fn push(self, value: Option<String>) -> Self {
        match self {
            Self::Single(first) => Self::Collection(vec![first, value]),
            Self::Collection(mut items) => {
                items.push(value);
                Self::Collection(items)
            }
            Self::MlText(_) => Self::Single(value),
        }
    }

    /// Text of a single value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Single(value) => value.as_deref(),
            _ => None,
        }
    }

    /// Every non-multilingual entry in order.
    #[must_use]
    pub fn entries(&self) -> Vec<Option<&str>> {
        match self {
            Self::Single(value) => vec![value.as_deref()],
            Self::Collection(items) => items.iter().map(Option::as_deref).collect(),
            Self::MlText(_) => Vec::new(),
        }
    }
}

/// Document-level annotations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportMetadata {
    pub exported_by: Option<String>,
    pub export_date: Option<String>,
    pub exporter_version: Option<String>,
    pub export_of: Vec<String>,
}

/// A node described by the document, ready to be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportNode {
    /// Parent the node is created (or linked) under.
    pub parent: NodeRef,
    /// Child association to the parent, when the document names one.
    pub assoc_type: Option<QName>,
    pub node_type: QName,
    /// Existing node a reference element points at.
    pub reference: Option<NodeRef>,
    /// Whether the element sits directly under the document element.
    pub at_import_root: bool,
    pub child_name: Option<QName>,
    /// Import-scoped id token (`view:id`).
    pub import_id: Option<String>,
    pub aspects: Vec<QName>,
    pub properties: BTreeMap<QName, ImportValue>,
    /// Datatypes supplied by `view:datatype` attributes.
    pub datatypes: BTreeMap<QName, DataType>,
    pub acl: Vec<AccessPermission>,
    pub inherit: bool,
}

impl ImportNode {
    pub(crate) fn new(parent: NodeRef, assoc_type: Option<QName>, node_type: QName) -> Self {
        Self {
            parent,
            assoc_type,
            node_type,
            reference: None,
            at_import_root: false,
            child_name: None,
            import_id: None,
            aspects: Vec::new(),
            properties: BTreeMap::new(),
            datatypes: BTreeMap::new(),
            acl: Vec::new(),
            inherit: true,
        }
    }

    /// Whether the element was a `view:reference`.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        self.reference.is_some()
    }

    pub(crate) fn add_aspect(&mut self, aspect: QName) {
        if !self.aspects.contains(&aspect) {
            self.aspects.push(aspect);
        }
    }
}

/// Reserved group elements inside a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GroupKind {
    Aspects,
    Properties,
    Associations,
    Acl,
}

/// A node frame: the node being described and, once committed, its id.
#[derive(Debug, Clone)]
pub(crate) struct NodeFrame {
    pub(crate) element: QName,
    pub(crate) node: ImportNode,
    pub(crate) committed: Option<NodeRef>,
}

/// One entry of the context stack.
#[derive(Debug, Clone)]
pub(crate) enum Frame {
    /// Children of this element are created under `parent`.
    Parent {
        element: QName,
        parent: NodeRef,
        assoc_type: Option<QName>,
    },
    Node(NodeFrame),
    Group {
        element: QName,
        kind: GroupKind,
    },
    Metadata {
        element: QName,
        values: BTreeMap<String, Vec<String>>,
    },
}

impl Frame {
    pub(crate) fn element(&self) -> &QName {
        match self {
            Self::Parent { element, .. }
            | Self::Group { element, .. }
            | Self::Metadata { element, .. } => element,
            Self::Node(frame) => &frame.element,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn repeated_values_become_a_collection() {
        let value = ImportValue::Single(Some("a".to_string()))
            .push(None)
            .push(Some("c".to_string()));
        assert_eq!(value.entries(), vec![Some("a"), None, Some("c")]);
        assert_eq!(value.as_text(), None);
    }

    #[test]
    fn aspects_are_deduplicated() {
        let parent: NodeRef = "workspace://s/root".parse().unwrap();
        let mut node = ImportNode::new(parent, None, QName::new("urn:cm", "folder"));
        node.add_aspect(QName::new("urn:cm", "titled"));
        node.add_aspect(QName::new("urn:cm", "titled"));
        assert_eq!(node.aspects.len(), 1);
        assert!(!node.is_reference());
    }
}
