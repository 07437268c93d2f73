//! # View Parser
//!
//! Forward-only reader of view documents. A quick-xml pull reader feeds owned
//! tokens to a state machine over a stack of [`Frame`]s:
//!
//! - `Parent`: children are nodes (or references) created under a parent
//! - `Node`: a node being described; committed on first need or at its end
//! - `Group`: aspects, properties, associations or acl of a node
//! - `Metadata`: document-level annotations
//!
//! Element names are resolved against the dictionary. Errors are reported
//! with the line and column the reader had reached.

use super::Importer;
use super::context::{Frame, GroupKind, ImportMetadata, ImportNode, ImportValue, NodeFrame};
use crate::dictionary::Dictionary;
use crate::iso9075;
use crate::namespace::NamespaceRegistry;
use crate::primitives::{
    ACCESS_STATUS_ATTRIBUTE, ACE_ELEMENT, ACL_ELEMENT, ASPECTS_ELEMENT, ASSOCIATIONS_ELEMENT,
    AUTHORITY_ELEMENT, CHILD_NAME_ATTRIBUTE, DATATYPE_ATTRIBUTE, EXPORTED_BY_ELEMENT,
    EXPORTED_DATE_ELEMENT, EXPORTER_VERSION_ELEMENT, EXPORT_OF_ELEMENT, ID_ATTRIBUTE,
    IDREF_ATTRIBUTE, INHERIT_PERMISSIONS_ATTRIBUTE, ISNULL_ATTRIBUTE, LOCALE_ATTRIBUTE,
    MAX_DOCUMENT_DEPTH, METADATA_ELEMENT, MLVALUE_ELEMENT, NODEREF_ATTRIBUTE, PATHREF_ATTRIBUTE,
    PERMISSION_ELEMENT, PROPERTIES_ELEMENT, REFERENCE_ELEMENT, VALUES_ELEMENT, VALUE_ELEMENT,
    VIEW_NAMESPACE_URI, modern_authority, view_name,
};
use crate::types::{
    AccessPermission, AccessStatus, DataType, MlText, NodeRef, QName, Result, ViewError,
};
use quick_xml::NsReader;
use quick_xml::events::Event;
use quick_xml::name::{PrefixDeclaration, ResolveResult};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, BufRead, Read};
use tracing::debug;

// =============================================================================
// POSITION TRACKING
// =============================================================================

/// Line and column of the next unread byte, both 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Position {
    line: u64,
    column: u64,
}

/// Counts lines and columns of everything the XML reader consumes.
struct PositionedReader<R> {
    inner: R,
    position: Position,
}

impl<R: BufRead> PositionedReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            position: Position { line: 1, column: 1 },
        }
    }
}

impl<R: BufRead> Read for PositionedReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let n = {
            let available = self.fill_buf()?;
            let n = available.len().min(out.len());
            out[..n].copy_from_slice(&available[..n]);
            n
        };
        self.consume(n);
        Ok(n)
    }
}

impl<R: BufRead> BufRead for PositionedReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        if let Ok(buffered) = self.inner.fill_buf() {
            for byte in buffered.iter().take(amt) {
                if *byte == b'\n' {
                    self.position.line = self.position.line.saturating_add(1);
                    self.position.column = 1;
                } else {
                    self.position.column = self.position.column.saturating_add(1);
                }
            }
        }
        self.inner.consume(amt);
    }
}

// =============================================================================
// TOKENIZER
// =============================================================================

/// Owned, namespace-resolved markup tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Start {
        name: QName,
        attributes: Vec<(QName, String)>,
    },
    End {
        name: QName,
    },
    Text(String),
    Eof,
}

struct Tokenizer<R: BufRead> {
    reader: NsReader<PositionedReader<R>>,
    buf: Vec<u8>,
    /// Prefix declarations seen since the last call to `take_bindings`.
    bindings: Vec<(String, String)>,
}

fn utf8(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(ViewError::xml)
}

fn namespace_uri(resolved: ResolveResult<'_>) -> Result<String> {
    match resolved {
        ResolveResult::Bound(namespace) => utf8(namespace.as_ref()),
        ResolveResult::Unbound => Ok(String::new()),
        ResolveResult::Unknown(prefix) => Err(ViewError::Xml(format!(
            "Namespace prefix {} is not declared",
            String::from_utf8_lossy(&prefix)
        ))),
    }
}

impl<R: BufRead> Tokenizer<R> {
    fn new(input: R) -> Self {
        let mut reader = NsReader::from_reader(PositionedReader::new(input));
        reader.config_mut().expand_empty_elements = true;
        Self {
            reader,
            buf: Vec::new(),
            bindings: Vec::new(),
        }
    }

    fn position(&self) -> Position {
        self.reader.get_ref().position
    }

    fn take_bindings(&mut self) -> Vec<(String, String)> {
        std::mem::take(&mut self.bindings)
    }

    fn next(&mut self) -> Result<Token> {
        loop {
            self.buf.clear();
            let (resolved, event) = self
                .reader
                .read_resolved_event_into(&mut self.buf)
                .map_err(ViewError::xml)?;
            match event {
                Event::Start(start) => {
                    let namespace = namespace_uri(resolved)?;
                    let local = utf8(start.local_name().as_ref())?;
                    let mut attributes = Vec::new();
                    for attr in start.attributes() {
                        let attr = attr.map_err(ViewError::xml)?;
                        let value = attr.unescape_value().map_err(ViewError::xml)?.into_owned();
                        if let Some(declaration) = attr.key.as_namespace_binding() {
                            if let PrefixDeclaration::Named(prefix) = declaration {
                                self.bindings.push((utf8(prefix)?, value));
                            }
                            continue;
                        }
                        let (resolved, key) = self.reader.resolve_attribute(attr.key);
                        let uri = namespace_uri(resolved)?;
                        attributes.push((QName::new(uri, utf8(key.as_ref())?), value));
                    }
                    return Ok(Token::Start {
                        name: QName::new(namespace, iso9075::decode(&local)),
                        attributes,
                    });
                }
                Event::End(end) => {
                    let namespace = namespace_uri(resolved)?;
                    let local = utf8(end.local_name().as_ref())?;
                    return Ok(Token::End {
                        name: QName::new(namespace, iso9075::decode(&local)),
                    });
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(ViewError::xml)?;
                    return Ok(Token::Text(text.into_owned()));
                }
                Event::CData(data) => return Ok(Token::Text(utf8(&data)?)),
                Event::Eof => return Ok(Token::Eof),
                _ => {}
            }
        }
    }
}

/// A view-namespace (or unprefixed) attribute by local name.
fn view_attribute<'a>(attributes: &'a [(QName, String)], local: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(name, _)| {
            name.local_name() == local
                && (name.namespace_uri() == VIEW_NAMESPACE_URI || name.namespace_uri().is_empty())
        })
        .map(|(_, value)| value.as_str())
}

fn is_null(attributes: &[(QName, String)]) -> bool {
    view_attribute(attributes, ISNULL_ATTRIBUTE).is_some_and(|v| v.trim() == "true")
}

fn group_kind(name: &QName) -> Option<GroupKind> {
    if name.namespace_uri() != VIEW_NAMESPACE_URI {
        return None;
    }
    match name.local_name() {
        ASPECTS_ELEMENT => Some(GroupKind::Aspects),
        PROPERTIES_ELEMENT => Some(GroupKind::Properties),
        ASSOCIATIONS_ELEMENT => Some(GroupKind::Associations),
        ACL_ELEMENT => Some(GroupKind::Acl),
        _ => None,
    }
}

fn metadata(values: BTreeMap<String, Vec<String>>) -> ImportMetadata {
    let first = |key: &str| values.get(key).and_then(|v| v.first().cloned());
    ImportMetadata {
        exported_by: first(EXPORTED_BY_ELEMENT),
        export_date: first(EXPORTED_DATE_ELEMENT),
        exporter_version: first(EXPORTER_VERSION_ELEMENT),
        export_of: values.get(EXPORT_OF_ELEMENT).cloned().unwrap_or_default(),
    }
}

fn commit_node(
    importer: &mut dyn Importer,
    ids: &mut BTreeMap<String, NodeRef>,
    node: &ImportNode,
) -> Result<NodeRef> {
    let committed = importer.import_node(node)?;
    debug!(node = %committed, "node committed");
    if let Some(id) = &node.import_id {
        ids.insert(id.clone(), committed.clone());
    }
    Ok(committed)
}

// =============================================================================
// PARSER
// =============================================================================

/// What the top of the stack expects next.
enum Context {
    Document,
    Parent(NodeRef, Option<QName>),
    Node,
    Group(GroupKind),
    Metadata,
}

/// Parses one view document into an [`Importer`].
pub struct ViewParser<'p, R: BufRead> {
    tokens: Tokenizer<R>,
    dictionary: &'p dyn Dictionary,
    importer: &'p mut dyn Importer,
    namespaces: NamespaceRegistry,
    stack: Vec<Frame>,
    /// Import id token → committed node.
    ids: BTreeMap<String, NodeRef>,
    declared_ids: BTreeSet<String>,
}

impl<'p, R: BufRead> ViewParser<'p, R> {
    pub fn new(input: R, dictionary: &'p dyn Dictionary, importer: &'p mut dyn Importer) -> Self {
        Self {
            tokens: Tokenizer::new(input),
            dictionary,
            importer,
            namespaces: dictionary.namespaces().clone(),
            stack: Vec::new(),
            ids: BTreeMap::new(),
            declared_ids: BTreeSet::new(),
        }
    }

    /// Parse the whole document.
    pub fn parse(mut self) -> Result<()> {
        self.importer.start()?;
        match self.run() {
            Ok(()) => self.importer.end(&self.namespaces),
            Err(error) => {
                let position = self.tokens.position();
                let error = ViewError::AtPosition {
                    line: position.line,
                    column: position.column,
                    source: Box::new(error),
                };
                self.importer.error(&error);
                Err(error)
            }
        }
    }

    fn run(&mut self) -> Result<()> {
        loop {
            match self.tokens.next()? {
                Token::Start { name, attributes } => {
                    for (prefix, uri) in self.tokens.take_bindings() {
                        self.namespaces.register(prefix, uri);
                    }
                    self.start_element(name, &attributes)?;
                }
                Token::End { name } => self.end_element(&name)?,
                Token::Text(text) => {
                    if !text.trim().is_empty() {
                        return Err(ViewError::InvalidStructure(format!(
                            "Unexpected text '{}'",
                            text.trim()
                        )));
                    }
                }
                Token::Eof => break,
            }
        }
        match self.stack.last() {
            Some(frame) => Err(ViewError::InvalidStructure(format!(
                "Document ended inside element {}",
                frame.element()
            ))),
            None => Ok(()),
        }
    }

    fn push(&mut self, frame: Frame) {
        debug!(depth = self.stack.len(), element = %frame.element(), "push frame");
        self.stack.push(frame);
    }

    fn current_node(&mut self) -> Result<&mut ImportNode> {
        self.stack
            .iter_mut()
            .rev()
            .find_map(|frame| match frame {
                Frame::Node(frame) => Some(&mut frame.node),
                _ => None,
            })
            .ok_or_else(|| ViewError::InvalidStructure("Element is outside of a node".to_string()))
    }

    /// Commit the innermost node if it is not committed yet.
    fn commit(&mut self) -> Result<NodeRef> {
        let frame = self
            .stack
            .iter_mut()
            .rev()
            .find_map(|frame| match frame {
                Frame::Node(frame) => Some(frame),
                _ => None,
            })
            .ok_or_else(|| ViewError::InvalidStructure("Element is outside of a node".to_string()))?;
        if let Some(node) = &frame.committed {
            return Ok(node.clone());
        }
        let node = commit_node(&mut *self.importer, &mut self.ids, &frame.node)?;
        frame.committed = Some(node.clone());
        Ok(node)
    }

    // =========================================================================
    // START ELEMENTS
    // =========================================================================

    fn start_element(&mut self, name: QName, attributes: &[(QName, String)]) -> Result<()> {
        if self.stack.len() >= MAX_DOCUMENT_DEPTH {
            return Err(ViewError::InvalidStructure(format!(
                "Document nesting exceeds {} levels",
                MAX_DOCUMENT_DEPTH
            )));
        }
        let context = match self.stack.last() {
            None => Context::Document,
            Some(Frame::Parent {
                parent, assoc_type, ..
            }) => Context::Parent(parent.clone(), assoc_type.clone()),
            Some(Frame::Node(_)) => Context::Node,
            Some(Frame::Group { kind, .. }) => Context::Group(*kind),
            Some(Frame::Metadata { .. }) => Context::Metadata,
        };
        match context {
            Context::Document => {
                let parent = self.importer.root().clone();
                let assoc_type = self.importer.root_assoc_type().cloned();
                self.push(Frame::Parent {
                    element: name,
                    parent,
                    assoc_type,
                });
                Ok(())
            }
            Context::Parent(parent, assoc_type) => {
                self.start_in_parent(name, attributes, parent, assoc_type)
            }
            Context::Node => self.start_in_node(name, attributes),
            Context::Group(kind) => self.start_in_group(kind, name, attributes),
            Context::Metadata => self.read_metadata_value(name),
        }
    }

    fn start_in_parent(
        &mut self,
        name: QName,
        attributes: &[(QName, String)],
        parent: NodeRef,
        assoc_type: Option<QName>,
    ) -> Result<()> {
        if name == view_name(METADATA_ELEMENT) {
            self.push(Frame::Metadata {
                element: name,
                values: BTreeMap::new(),
            });
            return Ok(());
        }

        let at_import_root = self.stack.len() == 1;
        if name == view_name(REFERENCE_ELEMENT) {
            let target = self.resolve_reference(attributes)?;
            let (node_type, aspects) = self.importer.describe(&target)?;
            let mut node = ImportNode::new(parent, assoc_type, node_type);
            node.aspects = aspects;
            node.reference = Some(target);
            node.at_import_root = at_import_root;
            node.child_name = self.child_name(attributes)?;
            self.push(Frame::Node(NodeFrame {
                element: name,
                node,
                committed: None,
            }));
            return Ok(());
        }

        if self.dictionary.node_type(&name).is_none() {
            return Err(ViewError::UnknownDefinition(format!(
                "Type {} has not been defined",
                name
            )));
        }
        let mut node = ImportNode::new(parent, assoc_type, name.clone());
        node.at_import_root = at_import_root;
        node.child_name = self.child_name(attributes)?;
        if let Some(id) = view_attribute(attributes, ID_ATTRIBUTE) {
            if !self.declared_ids.insert(id.to_string()) {
                return Err(ViewError::ReferenceResolution(format!(
                    "Import id {} already specified within import file",
                    id
                )));
            }
            node.import_id = Some(id.to_string());
        }
        self.push(Frame::Node(NodeFrame {
            element: name,
            node,
            committed: None,
        }));
        Ok(())
    }

    fn start_in_node(&mut self, name: QName, attributes: &[(QName, String)]) -> Result<()> {
        if let Some(kind) = group_kind(&name) {
            match kind {
                GroupKind::Acl => {
                    if view_attribute(attributes, INHERIT_PERMISSIONS_ATTRIBUTE)
                        .is_some_and(|v| v.trim() == "false")
                    {
                        self.current_node()?.inherit = false;
                    }
                }
                GroupKind::Associations => {
                    self.commit()?;
                }
                GroupKind::Aspects | GroupKind::Properties => {}
            }
            self.push(Frame::Group {
                element: name,
                kind,
            });
            return Ok(());
        }

        if self.dictionary.aspect(&name).is_some() {
            self.current_node()?.add_aspect(name.clone());
            return self.read_empty(&name);
        }
        if self.dictionary.property(&name).is_some() {
            return self.read_property(name, attributes);
        }
        if self.dictionary.association(&name).is_some() {
            return self.start_association(name);
        }
        Err(ViewError::UnknownDefinition(format!(
            "Definition {} is not valid; cannot find in dictionary",
            name
        )))
    }

    fn start_in_group(
        &mut self,
        kind: GroupKind,
        name: QName,
        attributes: &[(QName, String)],
    ) -> Result<()> {
        if group_kind(&name).is_some() {
            return Err(ViewError::InvalidStructure(format!(
                "Group {} cannot be nested in another group",
                name
            )));
        }
        match kind {
            GroupKind::Aspects => {
                if self.dictionary.aspect(&name).is_none() {
                    return Err(ViewError::UnknownDefinition(format!(
                        "Aspect {} has not been defined",
                        name
                    )));
                }
                self.current_node()?.add_aspect(name.clone());
                self.read_empty(&name)
            }
            GroupKind::Properties => self.read_property(name, attributes),
            GroupKind::Associations => {
                if self.dictionary.association(&name).is_none() {
                    return Err(ViewError::UnknownDefinition(format!(
                        "Association {} has not been defined",
                        name
                    )));
                }
                self.start_association(name)
            }
            GroupKind::Acl => {
                if name != view_name(ACE_ELEMENT) {
                    return Err(ViewError::InvalidStructure(format!(
                        "Expected an access control entry, found {}",
                        name
                    )));
                }
                self.read_ace(&name, attributes)
            }
        }
    }

    fn start_association(&mut self, name: QName) -> Result<()> {
        let (node_type, aspects) = {
            let node = self.current_node()?;
            (node.node_type.clone(), node.aspects.clone())
        };
        if !self
            .dictionary
            .is_association_legal(&node_type, &aspects, &name)
        {
            return Err(ViewError::UnknownDefinition(format!(
                "Association {} is not valid for type {}",
                name, node_type
            )));
        }
        let parent = self.commit()?;
        self.push(Frame::Parent {
            element: name.clone(),
            parent,
            assoc_type: Some(name),
        });
        Ok(())
    }

    fn child_name(&self, attributes: &[(QName, String)]) -> Result<Option<QName>> {
        view_attribute(attributes, CHILD_NAME_ATTRIBUTE)
            .map(|text| self.namespaces.resolve_prefixed(text))
            .transpose()
    }

    /// Resolve a reference element; path queries are relative to the import root.
    fn resolve_reference(&self, attributes: &[(QName, String)]) -> Result<NodeRef> {
        let noderef = view_attribute(attributes, NODEREF_ATTRIBUTE);
        let idref = view_attribute(attributes, IDREF_ATTRIBUTE);
        let pathref = view_attribute(attributes, PATHREF_ATTRIBUTE);
        match (noderef, idref, pathref) {
            (Some(text), None, None) => {
                let node: NodeRef = text.trim().parse()?;
                self.importer.resolve_node_ref(&node)
            }
            (None, Some(id), None) => self.ids.get(id.trim()).cloned().ok_or_else(|| {
                ViewError::ReferenceResolution(format!("Cannot find node referenced by id {}", id))
            }),
            (None, None, Some(path)) => {
                let context = self.importer.root();
                self.importer
                    .resolve_path(context, path.trim(), &self.namespaces)
            }
            _ => Err(ViewError::ReferenceResolution(
                "Reference must specify exactly one of noderef, idref or pathref".to_string(),
            )),
        }
    }

    fn datatype_attribute(&self, attributes: &[(QName, String)]) -> Result<Option<DataType>> {
        let Some(text) = view_attribute(attributes, DATATYPE_ATTRIBUTE) else {
            return Ok(None);
        };
        let name = self.namespaces.resolve_prefixed(text)?;
        DataType::from_qname(&name).map(Some).ok_or_else(|| {
            ViewError::UnknownDefinition(format!("Datatype {} has not been defined", text))
        })
    }

    // =========================================================================
    // LEAF READERS
    // =========================================================================

    /// Text content of an element that must not contain elements.
    fn read_text(&mut self, element: &QName) -> Result<String> {
        let mut text = String::new();
        loop {
            match self.tokens.next()? {
                Token::Text(t) => text.push_str(&t),
                Token::Start { name, .. } => {
                    return Err(ViewError::MalformedValue(format!(
                        "Element {} must not contain element {}",
                        element, name
                    )));
                }
                Token::End { name } if name == *element => return Ok(text),
                Token::End { name } => {
                    return Err(ViewError::MalformedValue(format!(
                        "Element {} is closed by {}",
                        element, name
                    )));
                }
                Token::Eof => {
                    return Err(ViewError::MalformedValue(format!(
                        "Element {} is missing its end marker",
                        element
                    )));
                }
            }
        }
    }

    fn read_empty(&mut self, element: &QName) -> Result<()> {
        if self.read_text(element)?.trim().is_empty() {
            Ok(())
        } else {
            Err(ViewError::InvalidStructure(format!(
                "Aspect {} must be empty",
                element
            )))
        }
    }

    fn read_metadata_value(&mut self, name: QName) -> Result<()> {
        let text = self.read_text(&name)?;
        if let Some(Frame::Metadata { values, .. }) = self.stack.last_mut() {
            values
                .entry(name.local_name().to_string())
                .or_default()
                .push(text.trim().to_string());
        }
        Ok(())
    }

    fn read_ace(&mut self, element: &QName, attributes: &[(QName, String)]) -> Result<()> {
        let status = match view_attribute(attributes, ACCESS_STATUS_ATTRIBUTE) {
            Some(text) => text.trim().parse::<AccessStatus>()?,
            None => AccessStatus::Allowed,
        };
        let mut authority = None;
        let mut permission = None;
        loop {
            match self.tokens.next()? {
                Token::Start { name, .. } if name == view_name(AUTHORITY_ELEMENT) => {
                    authority = Some(self.read_text(&name)?);
                }
                Token::Start { name, .. } if name == view_name(PERMISSION_ELEMENT) => {
                    permission = Some(self.read_text(&name)?);
                }
                Token::Start { name, .. } => {
                    return Err(ViewError::InvalidStructure(format!(
                        "Unexpected element {} in access control entry",
                        name
                    )));
                }
                Token::Text(text) if text.trim().is_empty() => {}
                Token::Text(text) => {
                    return Err(ViewError::InvalidStructure(format!(
                        "Unexpected text '{}' in access control entry",
                        text.trim()
                    )));
                }
                Token::End { name } if name == *element => break,
                Token::End { name } => {
                    return Err(ViewError::InvalidStructure(format!(
                        "Unexpected end of {} in access control entry",
                        name
                    )));
                }
                Token::Eof => {
                    return Err(ViewError::MalformedValue(
                        "Access control entry is missing its end marker".to_string(),
                    ));
                }
            }
        }
        let authority = authority.ok_or_else(|| {
            ViewError::MalformedValue("Access control entry is missing its authority".to_string())
        })?;
        let permission = permission.ok_or_else(|| {
            ViewError::MalformedValue("Access control entry is missing its permission".to_string())
        })?;
        self.current_node()?.acl.push(AccessPermission::new(
            modern_authority(authority.trim()),
            permission.trim(),
            status,
        ));
        Ok(())
    }

    fn read_value(
        &mut self,
        element: &QName,
        attributes: &[(QName, String)],
    ) -> Result<(Option<String>, Option<DataType>)> {
        let data_type = self.datatype_attribute(attributes)?;
        let text = self.read_text(element)?;
        Ok(((!is_null(attributes)).then_some(text), data_type))
    }

    fn read_values(&mut self, element: &QName) -> Result<(Vec<Option<String>>, Option<DataType>)> {
        let mut items = Vec::new();
        let mut data_type = None;
        loop {
            match self.tokens.next()? {
                Token::Start { name, attributes } if name == view_name(VALUE_ELEMENT) => {
                    let (item, item_type) = self.read_value(&name, &attributes)?;
                    data_type = data_type.or(item_type);
                    items.push(item);
                }
                Token::Start { name, .. } => {
                    return Err(ViewError::MalformedValue(format!(
                        "Element {} must only contain values, found {}",
                        element, name
                    )));
                }
                Token::Text(text) if text.trim().is_empty() => {}
                Token::Text(text) => {
                    return Err(ViewError::MalformedValue(format!(
                        "Unexpected text '{}' in {}",
                        text.trim(),
                        element
                    )));
                }
                Token::End { name } if name == *element => return Ok((items, data_type)),
                Token::End { name } => {
                    return Err(ViewError::MalformedValue(format!(
                        "Element {} is closed by {}",
                        element, name
                    )));
                }
                Token::Eof => {
                    return Err(ViewError::MalformedValue(format!(
                        "Element {} is missing its end marker",
                        element
                    )));
                }
            }
        }
    }

    fn read_property(&mut self, name: QName, attributes: &[(QName, String)]) -> Result<()> {
        let mut data_type = self.datatype_attribute(attributes)?;
        let mut text = String::new();
        let mut value: Option<ImportValue> = None;
        loop {
            match self.tokens.next()? {
                Token::Text(t) => text.push_str(&t),
                Token::Start {
                    name: child,
                    attributes: child_attributes,
                } => {
                    if child == view_name(VALUES_ELEMENT) {
                        let (items, item_type) = self.read_values(&child)?;
                        data_type = data_type.or(item_type);
                        value = Some(ImportValue::Collection(items));
                    } else if child == view_name(VALUE_ELEMENT) {
                        let (item, item_type) = self.read_value(&child, &child_attributes)?;
                        data_type = data_type.or(item_type);
                        value = Some(match value.take() {
                            Some(ImportValue::MlText(_)) => {
                                return Err(ViewError::MalformedValue(format!(
                                    "Property {} mixes multilingual and plain values",
                                    name
                                )));
                            }
                            Some(existing) => existing.push(item),
                            None => ImportValue::Single(item),
                        });
                    } else if child == view_name(MLVALUE_ELEMENT) {
                        let locale = view_attribute(&child_attributes, LOCALE_ATTRIBUTE)
                            .unwrap_or_default()
                            .trim()
                            .to_string();
                        let null = is_null(&child_attributes);
                        let body = self.read_text(&child)?;
                        let mut locales = match value.take() {
                            Some(ImportValue::MlText(locales)) => locales,
                            None => MlText::new(),
                            Some(_) => {
                                return Err(ViewError::MalformedValue(format!(
                                    "Property {} mixes multilingual and plain values",
                                    name
                                )));
                            }
                        };
                        locales.insert(locale, (!null).then_some(body));
                        value = Some(ImportValue::MlText(locales));
                    } else {
                        return Err(ViewError::MalformedValue(format!(
                            "Property {} contains unexpected element {}",
                            name, child
                        )));
                    }
                }
                Token::End { name: end } if end == name => break,
                Token::End { name: end } => {
                    return Err(ViewError::MalformedValue(format!(
                        "Property {} is closed by {}",
                        name, end
                    )));
                }
                Token::Eof => {
                    return Err(ViewError::MalformedValue(format!(
                        "Property {} is missing its end marker",
                        name
                    )));
                }
            }
        }

        let value = match value {
            Some(value) => {
                if !text.trim().is_empty() {
                    return Err(ViewError::MalformedValue(format!(
                        "Property {} mixes text and value elements",
                        name
                    )));
                }
                value
            }
            None if is_null(attributes) => ImportValue::Single(None),
            None => ImportValue::Single(Some(text)),
        };
        let node = self.current_node()?;
        if let Some(data_type) = data_type {
            node.datatypes.insert(name.clone(), data_type);
        }
        node.properties.insert(name, value);
        Ok(())
    }

    // =========================================================================
    // END ELEMENTS
    // =========================================================================

    fn end_element(&mut self, name: &QName) -> Result<()> {
        let frame = self.stack.pop().ok_or_else(|| {
            ViewError::InvalidStructure(format!("Unexpected end of {}", name))
        })?;
        if frame.element() != name {
            return Err(ViewError::InvalidStructure(format!(
                "Expected end of {}, found end of {}",
                frame.element(),
                name
            )));
        }
        debug!(depth = self.stack.len(), element = %name, "pop frame");
        match frame {
            Frame::Node(frame) => {
                let node = match frame.committed {
                    Some(node) => node,
                    None => commit_node(&mut *self.importer, &mut self.ids, &frame.node)?,
                };
                self.importer.children_imported(&node)
            }
            Frame::Metadata { values, .. } => self.importer.import_metadata(&metadata(values)),
            Frame::Parent { .. } | Frame::Group { .. } => Ok(()),
        }
    }
}
