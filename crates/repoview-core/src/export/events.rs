//! # View Events
//!
//! The closed set of events an export produces, and the sinks that consume
//! them. The crawler emits events in document order; a sink may serialize
//! them (`ViewXmlWriter`), record them (`EventLog`), count them
//! (`ExportProgress`), or fan them out (`ChainedSink`).

use crate::types::{
    AccessPermission, ContentData, DataType, NodeRef, QName, Result, Scalar,
};
use std::io::Read;

/// Document-level annotations written before any node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportMetadata {
    pub exported_by: String,
    pub export_date: Option<String>,
    pub exporter_version: String,
    /// Paths of the export roots.
    pub export_of: Vec<String>,
}

/// How a reference element identifies its node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceTarget {
    NodeRef(NodeRef),
    /// A path query, relative to the export parent or absolute.
    Path(String),
}

/// Where a value belongs and how it is typed on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueSlot {
    pub node: NodeRef,
    pub property: QName,
    /// Written as a datatype attribute; only set when the dictionary does not declare one.
    pub data_type: Option<DataType>,
    /// Position within a collection.
    pub index: Option<usize>,
}

/// One export event.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    Start(ExportMetadata),
    StartNamespace {
        prefix: String,
        uri: String,
    },
    EndNamespace {
        prefix: String,
    },
    StartNode {
        node: NodeRef,
        node_type: QName,
        child_name: Option<QName>,
    },
    EndNode {
        node: NodeRef,
    },
    StartReference {
        node: NodeRef,
        target: ReferenceTarget,
        child_name: Option<QName>,
    },
    EndReference {
        node: NodeRef,
    },
    StartAspects {
        node: NodeRef,
    },
    Aspect {
        node: NodeRef,
        aspect: QName,
    },
    EndAspects {
        node: NodeRef,
    },
    StartAcl {
        node: NodeRef,
        inherit: bool,
    },
    Permission {
        node: NodeRef,
        permission: AccessPermission,
    },
    EndAcl {
        node: NodeRef,
    },
    StartProperties {
        node: NodeRef,
    },
    StartProperty {
        node: NodeRef,
        property: QName,
    },
    StartValues {
        node: NodeRef,
        property: QName,
    },
    /// A scalar value; `None` is an explicit null.
    Value {
        slot: ValueSlot,
        value: Option<Scalar>,
    },
    EndValues {
        node: NodeRef,
        property: QName,
    },
    /// One locale of a multilingual value; `None` is an explicit null.
    MlValue {
        node: NodeRef,
        property: QName,
        locale: String,
        value: Option<String>,
    },
    EndProperty {
        node: NodeRef,
        property: QName,
    },
    EndProperties {
        node: NodeRef,
    },
    StartAssocs {
        node: NodeRef,
    },
    StartAssoc {
        node: NodeRef,
        assoc_type: QName,
    },
    EndAssoc {
        node: NodeRef,
        assoc_type: QName,
    },
    EndAssocs {
        node: NodeRef,
    },
    End,
}

// =============================================================================
// SINK TRAIT
// =============================================================================

/// Consumer of export events.
pub trait ViewSink {
    /// Receive one event.
    fn event(&mut self, event: &ViewEvent) -> Result<()>;

    /// Receive a content value. `stream` is `None` when the bytes are not exported.
    ///
    /// The default writes the descriptor as an ordinary value.
    fn content(
        &mut self,
        slot: &ValueSlot,
        _stream: Option<&mut dyn Read>,
        data: &ContentData,
    ) -> Result<()> {
        self.event(&ViewEvent::Value {
            slot: slot.clone(),
            value: Some(Scalar::Content(data.clone())),
        })
    }

    /// Receive a recoverable problem.
    fn warning(&mut self, _message: &str) {}
}

// =============================================================================
// SINKS
// =============================================================================

/// Fans events out to several sinks in order.
///
/// A content stream can only be read once: the first sink receives it, the
/// others receive the descriptor without a stream.
pub struct ChainedSink<'a> {
    sinks: Vec<&'a mut dyn ViewSink>,
}

impl<'a> ChainedSink<'a> {
    #[must_use]
    pub fn new(sinks: Vec<&'a mut dyn ViewSink>) -> Self {
        Self { sinks }
    }
}

impl ViewSink for ChainedSink<'_> {
    fn event(&mut self, event: &ViewEvent) -> Result<()> {
        for sink in &mut self.sinks {
            sink.event(event)?;
        }
        Ok(())
    }

    fn content(
        &mut self,
        slot: &ValueSlot,
        mut stream: Option<&mut dyn Read>,
        data: &ContentData,
    ) -> Result<()> {
        for sink in &mut self.sinks {
            sink.content(slot, stream.take(), data)?;
        }
        Ok(())
    }

    fn warning(&mut self, message: &str) {
        for sink in &mut self.sinks {
            sink.warning(message);
        }
    }
}

/// Records every event and warning.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    pub events: Vec<ViewEvent>,
    pub warnings: Vec<String>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ViewSink for EventLog {
    fn event(&mut self, event: &ViewEvent) -> Result<()> {
        self.events.push(event.clone());
        Ok(())
    }

    fn warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }
}

/// Counts nodes and references and collects warnings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportProgress {
    pub nodes: usize,
    pub references: usize,
    pub warnings: Vec<String>,
}

impl ViewSink for ExportProgress {
    fn event(&mut self, event: &ViewEvent) -> Result<()> {
        match event {
            ViewEvent::StartNode { .. } => self.nodes = self.nodes.saturating_add(1),
            ViewEvent::StartReference { .. } => {
                self.references = self.references.saturating_add(1);
            }
            _ => {}
        }
        Ok(())
    }

    fn content(
        &mut self,
        _slot: &ValueSlot,
        _stream: Option<&mut dyn Read>,
        _data: &ContentData,
    ) -> Result<()> {
        Ok(())
    }

    fn warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }
}

// =============================================================================
// TESTS
// =============================================================================
