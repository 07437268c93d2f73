//! # In-Memory Repository
//!
//! A deterministic reference implementation of [`NodeService`] and
//! [`ContentService`], used by the test suite and by callers that want to
//! stage a view before handing it to a real store.
//!
//! All data structures use `BTreeMap` for deterministic ordering; node ids are
//! allocated from a counter, so two repositories built by the same sequence of
//! calls are identical.

use crate::namespace::NamespaceRegistry;
use crate::primitives::{SYS_NODE_UUID, SYS_REFERENCEABLE, SYS_STORE_ROOT, sys_name};
use crate::repository::{ContentReader, ContentService, NewNode, NodeService};
use crate::types::{
    AccessPermission, ChildAssoc, ContentData, NodeRef, PathElement, PeerAssoc, PropertyValue,
    QName, RepoPath, Result, Scalar, StoreRef, ViewError,
};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read};

/// Id given to every store root.
const ROOT_ID: &str = "root";

#[derive(Debug, Clone, PartialEq)]
struct NodeRecord {
    node_type: QName,
    aspects: BTreeSet<QName>,
    properties: BTreeMap<QName, PropertyValue>,
    acl: Vec<AccessPermission>,
    inherit: bool,
}

impl NodeRecord {
    fn new(node: &NodeRef, node_type: QName) -> Self {
        let mut aspects = BTreeSet::new();
        aspects.insert(sys_name(SYS_REFERENCEABLE));
        let mut properties = BTreeMap::new();
        properties.insert(
            sys_name(SYS_NODE_UUID),
            PropertyValue::text(node.id().to_string()),
        );
        Self {
            node_type,
            aspects,
            properties,
            acl: Vec::new(),
            inherit: true,
        }
    }
}

/// The in-memory repository.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryRepository {
    /// Store → root node
    roots: BTreeMap<StoreRef, NodeRef>,
    nodes: BTreeMap<NodeRef, NodeRecord>,
    /// parent → outgoing child edges, creation order
    children: BTreeMap<NodeRef, Vec<ChildAssoc>>,
    /// child → incoming child edges, creation order
    parents: BTreeMap<NodeRef, Vec<ChildAssoc>>,
    /// source → peer associations, creation order
    peers: BTreeMap<NodeRef, Vec<PeerAssoc>>,
    /// (node, property) → payload bytes
    content: BTreeMap<(NodeRef, QName), Vec<u8>>,
    next_node_id: u64,
}

impl MemoryRepository {
    /// Create an empty repository with no stores.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store (idempotent) and return its root node.
    pub fn create_store(&mut self, store: StoreRef) -> NodeRef {
        if let Some(root) = self.roots.get(&store) {
            return root.clone();
        }
        let root = NodeRef::new(store.clone(), ROOT_ID);
        self.nodes.insert(
            root.clone(),
            NodeRecord::new(&root, sys_name(SYS_STORE_ROOT)),
        );
        self.roots.insert(store, root.clone());
        root
    }

    /// Total number of nodes, store roots included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of nodes in one store, its root included.
    #[must_use]
    pub fn store_node_count(&self, store: &StoreRef) -> usize {
        self.nodes.keys().filter(|n| n.store() == store).count()
    }

    /// Store a payload from bytes; shorthand for [`ContentService::write`].
    pub fn put_content(
        &mut self,
        node: &NodeRef,
        property: &QName,
        mimetype: &str,
        bytes: &[u8],
    ) -> Result<ContentData> {
        let data = ContentData::new("", mimetype, bytes.len() as u64, "UTF-8");
        self.write(node, property, &data, &mut Cursor::new(bytes))
    }

    fn record(&self, node: &NodeRef) -> Result<&NodeRecord> {
        self.nodes
            .get(node)
            .ok_or_else(|| ViewError::Store(format!("Node {} does not exist", node)))
    }

    fn record_mut(&mut self, node: &NodeRef) -> Result<&mut NodeRecord> {
        self.nodes
            .get_mut(node)
            .ok_or_else(|| ViewError::Store(format!("Node {} does not exist", node)))
    }

    fn allocate_id(&mut self) -> String {
        self.next_node_id = self.next_node_id.saturating_add(1);
        format!("node-{:08}", self.next_node_id)
    }

    fn step(&self, from: &[NodeRef], element: &PathElement) -> Result<Vec<NodeRef>> {
        let mut next: Vec<NodeRef> = Vec::new();
        for node in from {
            let found: Vec<NodeRef> = match element {
                PathElement::Current => vec![node.clone()],
                PathElement::Parent => self
                    .primary_parent(node)?
                    .map(|a| vec![a.parent])
                    .unwrap_or_default(),
                PathElement::Child { name, index } => {
                    let matching = self
                        .children
                        .get(node)
                        .into_iter()
                        .flatten()
                        .filter(|a| &a.name == name)
                        .map(|a| a.child.clone());
                    match index {
                        Some(i) => matching.skip(i.saturating_sub(1)).take(1).collect(),
                        None => matching.collect(),
                    }
                }
            };
            for n in found {
                if !next.contains(&n) {
                    next.push(n);
                }
            }
        }
        Ok(next)
    }
}

// =============================================================================
// NODE SERVICE
// =============================================================================

impl NodeService for MemoryRepository {
    fn exists(&self, node: &NodeRef) -> Result<bool> {
        Ok(self.nodes.contains_key(node))
    }

    fn root_node(&self, store: &StoreRef) -> Result<NodeRef> {
        self.roots
            .get(store)
            .cloned()
            .ok_or_else(|| ViewError::Store(format!("Store {} does not exist", store)))
    }

    fn node_type(&self, node: &NodeRef) -> Result<QName> {
        Ok(self.record(node)?.node_type.clone())
    }

    fn aspects(&self, node: &NodeRef) -> Result<BTreeSet<QName>> {
        Ok(self.record(node)?.aspects.clone())
    }

    fn properties(&self, node: &NodeRef) -> Result<BTreeMap<QName, PropertyValue>> {
        Ok(self.record(node)?.properties.clone())
    }

    fn child_assocs(&self, node: &NodeRef) -> Result<Vec<ChildAssoc>> {
        self.record(node)?;
        Ok(self.children.get(node).cloned().unwrap_or_default())
    }

    fn parent_assocs(&self, node: &NodeRef) -> Result<Vec<ChildAssoc>> {
        self.record(node)?;
        Ok(self.parents.get(node).cloned().unwrap_or_default())
    }

    fn target_assocs(&self, node: &NodeRef) -> Result<Vec<PeerAssoc>> {
        self.record(node)?;
        Ok(self.peers.get(node).cloned().unwrap_or_default())
    }

    fn permissions(&self, node: &NodeRef) -> Result<Vec<AccessPermission>> {
        let record = self.record(node)?;
        let mut entries = record.acl.clone();
        let mut inherit = record.inherit;
        let mut current = node.clone();
        while inherit {
            let Some(assoc) = self.primary_parent(&current)? else {
                break;
            };
            let parent = self.record(&assoc.parent)?;
            entries.extend(parent.acl.iter().map(|p| AccessPermission {
                set_directly: false,
                ..p.clone()
            }));
            inherit = parent.inherit;
            current = assoc.parent;
        }
        Ok(entries)
    }

    fn inherits_permissions(&self, node: &NodeRef) -> Result<bool> {
        Ok(self.record(node)?.inherit)
    }

    fn select_nodes(
        &self,
        context: &NodeRef,
        query: &str,
        namespaces: &NamespaceRegistry,
    ) -> Result<Vec<NodeRef>> {
        let path = RepoPath::parse(query, namespaces)?;
        let start = if path.is_absolute() {
            self.root_node(context.store())?
        } else {
            self.record(context)?;
            context.clone()
        };
        let mut current = vec![start];
        for element in path.elements() {
            current = self.step(&current, element)?;
            if current.is_empty() {
                break;
            }
        }
        Ok(current)
    }

    fn create_node(
        &mut self,
        parent: &NodeRef,
        assoc_type: &QName,
        name: &QName,
        node: NewNode,
    ) -> Result<ChildAssoc> {
        self.record(parent)?;
        let id = match node.uuid {
            Some(uuid) => uuid,
            None => self.allocate_id(),
        };
        let child = NodeRef::new(parent.store().clone(), id);
        if self.nodes.contains_key(&child) {
            return Err(ViewError::Store(format!("Node {} already exists", child)));
        }
        let mut record = NodeRecord::new(&child, node.node_type);
        for (key, value) in node.properties {
            if key != sys_name(SYS_NODE_UUID) {
                record.properties.insert(key, value);
            }
        }
        self.nodes.insert(child.clone(), record);

        let assoc = ChildAssoc {
            parent: parent.clone(),
            child: child.clone(),
            assoc_type: assoc_type.clone(),
            name: name.clone(),
            primary: true,
        };
        self.children
            .entry(parent.clone())
            .or_default()
            .push(assoc.clone());
        self.parents.entry(child).or_default().push(assoc.clone());
        Ok(assoc)
    }

    fn add_child(
        &mut self,
        parent: &NodeRef,
        child: &NodeRef,
        assoc_type: &QName,
        name: &QName,
    ) -> Result<ChildAssoc> {
        self.record(parent)?;
        self.record(child)?;
        let assoc = ChildAssoc {
            parent: parent.clone(),
            child: child.clone(),
            assoc_type: assoc_type.clone(),
            name: name.clone(),
            primary: false,
        };
        let existing = self.children.entry(parent.clone()).or_default();
        if existing
            .iter()
            .any(|a| a.child == assoc.child && a.assoc_type == assoc.assoc_type && a.name == assoc.name)
        {
            return Ok(assoc);
        }
        existing.push(assoc.clone());
        self.parents
            .entry(child.clone())
            .or_default()
            .push(assoc.clone());
        Ok(assoc)
    }

    fn create_association(
        &mut self,
        source: &NodeRef,
        target: &NodeRef,
        assoc_type: &QName,
    ) -> Result<PeerAssoc> {
        self.record(source)?;
        self.record(target)?;
        let assoc = PeerAssoc {
            source: source.clone(),
            target: target.clone(),
            assoc_type: assoc_type.clone(),
        };
        let existing = self.peers.entry(source.clone()).or_default();
        if !existing.contains(&assoc) {
            existing.push(assoc.clone());
        }
        Ok(assoc)
    }

    fn add_aspect(&mut self, node: &NodeRef, aspect: &QName) -> Result<()> {
        self.record_mut(node)?.aspects.insert(aspect.clone());
        Ok(())
    }

    /// Raw text is converted to the type of the value already held, if it fits.
    fn set_property(&mut self, node: &NodeRef, name: &QName, value: PropertyValue) -> Result<()> {
        let record = self.record_mut(node)?;
        if name == &sys_name(SYS_NODE_UUID) {
            if value == PropertyValue::text(node.id()) {
                return Ok(());
            }
            return Err(ViewError::Store(format!(
                "Property {} of {} is read-only",
                name, node
            )));
        }
        let coerced = match (&value, record.properties.get(name).and_then(|v| v.first())) {
            (PropertyValue::Single(Scalar::Text(text)), Some(existing)) => {
                existing.data_type().coerce(text).ok()
            }
            _ => None,
        };
        let value = coerced.map(PropertyValue::Single).unwrap_or(value);
        record.properties.insert(name.clone(), value);
        Ok(())
    }

    fn set_permission(&mut self, node: &NodeRef, permission: &AccessPermission) -> Result<()> {
        let record = self.record_mut(node)?;
        record
            .acl
            .retain(|p| !(p.authority == permission.authority && p.permission == permission.permission));
        record.acl.push(AccessPermission {
            set_directly: true,
            ..permission.clone()
        });
        Ok(())
    }

    fn set_inherit_permissions(&mut self, node: &NodeRef, inherit: bool) -> Result<()> {
        self.record_mut(node)?.inherit = inherit;
        Ok(())
    }

    fn delete_node(&mut self, node: &NodeRef) -> Result<()> {
        self.record(node)?;
        if self.roots.values().any(|root| root == node) {
            return Err(ViewError::Store(format!(
                "Store root {} cannot be deleted",
                node
            )));
        }

        let mut doomed = BTreeSet::new();
        let mut pending = vec![node.clone()];
        while let Some(current) = pending.pop() {
            pending.extend(
                self.children
                    .get(&current)
                    .into_iter()
                    .flatten()
                    .filter(|a| a.primary)
                    .map(|a| a.child.clone()),
            );
            doomed.insert(current);
        }

        for gone in &doomed {
            self.nodes.remove(gone);
            self.children.remove(gone);
            self.parents.remove(gone);
            self.peers.remove(gone);
        }
        for edges in self.children.values_mut() {
            edges.retain(|a| !doomed.contains(&a.child));
        }
        for edges in self.parents.values_mut() {
            edges.retain(|a| !doomed.contains(&a.parent));
        }
        for edges in self.peers.values_mut() {
            edges.retain(|a| !doomed.contains(&a.target));
        }
        self.content.retain(|(owner, _), _| !doomed.contains(owner));
        Ok(())
    }
}

// =============================================================================
// CONTENT SERVICE
// =============================================================================

impl ContentService for MemoryRepository {
    fn reader(&self, node: &NodeRef, property: &QName) -> Result<Option<ContentReader<'_>>> {
        let Some(bytes) = self.content.get(&(node.clone(), property.clone())) else {
            return Ok(None);
        };
        let data = match self.record(node)?.properties.get(property) {
            Some(PropertyValue::Single(Scalar::Content(data))) => data.clone(),
            _ => return Ok(None),
        };
        Ok(Some(ContentReader {
            data,
            stream: Box::new(Cursor::new(bytes.as_slice())),
        }))
    }

    fn write(
        &mut self,
        node: &NodeRef,
        property: &QName,
        data: &ContentData,
        stream: &mut dyn Read,
    ) -> Result<ContentData> {
        self.record(node)?;
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes)?;
        let stored = ContentData {
            url: format!("memory://{}/{}", node.id(), property.local_name()),
            size: bytes.len() as u64,
            ..data.clone()
        };
        self.content.insert((node.clone(), property.clone()), bytes);
        self.record_mut(node)?.properties.insert(
            property.clone(),
            PropertyValue::Single(Scalar::Content(stored.clone())),
        );
        Ok(stored)
    }
}

// =============================================================================
// TESTS
// =============================================================================
