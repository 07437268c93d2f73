//! # Repository Collaborators
//!
//! The three seams between the view codec and the repository it runs against:
//! - `NodeService`: the graph store (nodes, edges, properties, ACLs)
//! - `ContentService`: binary payloads of content properties
//! - `PermissionService`: the acting user's rights
//!
//! All fallible operations return `Result<T, ViewError>` so that in-memory
//! and persistent stores can be driven uniformly.

use crate::namespace::NamespaceRegistry;
use crate::types::{
    AccessPermission, ChildAssoc, ContentData, NodeRef, PeerAssoc, PropertyValue, QName, Result,
    StoreRef,
};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;

// =============================================================================
// NODE SERVICE
// =============================================================================

/// A node to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNode {
    pub node_type: QName,
    /// Preferred node id; the store may choose another if `None`.
    pub uuid: Option<String>,
    pub properties: BTreeMap<QName, PropertyValue>,
}

/// The graph store.
pub trait NodeService {
    // ----- reads -----

    /// Whether the node exists.
    fn exists(&self, node: &NodeRef) -> Result<bool>;

    /// The root node of a store.
    fn root_node(&self, store: &StoreRef) -> Result<NodeRef>;

    /// The node's type.
    fn node_type(&self, node: &NodeRef) -> Result<QName>;

    /// Aspects attached to the node.
    fn aspects(&self, node: &NodeRef) -> Result<BTreeSet<QName>>;

    /// Current property values.
    fn properties(&self, node: &NodeRef) -> Result<BTreeMap<QName, PropertyValue>>;

    /// Outgoing child edges, primary and secondary, in creation order.
    fn child_assocs(&self, node: &NodeRef) -> Result<Vec<ChildAssoc>>;

    /// Incoming child edges, primary and secondary.
    fn parent_assocs(&self, node: &NodeRef) -> Result<Vec<ChildAssoc>>;

    /// Outgoing peer associations.
    fn target_assocs(&self, node: &NodeRef) -> Result<Vec<PeerAssoc>>;

    /// Every permission entry set on the node or inherited from its ancestors.
    fn permissions(&self, node: &NodeRef) -> Result<Vec<AccessPermission>>;

    /// Whether the node inherits its parent's permissions.
    fn inherits_permissions(&self, node: &NodeRef) -> Result<bool>;

    /// Evaluate a path query relative to `context`.
    fn select_nodes(
        &self,
        context: &NodeRef,
        query: &str,
        namespaces: &NamespaceRegistry,
    ) -> Result<Vec<NodeRef>>;

    /// The node's primary incoming edge; `None` for a store root.
    fn primary_parent(&self, node: &NodeRef) -> Result<Option<ChildAssoc>> {
        Ok(self.parent_assocs(node)?.into_iter().find(|a| a.primary))
    }

    /// Primary edges from the store root down to the node, root first.
    fn primary_path(&self, node: &NodeRef) -> Result<Vec<ChildAssoc>> {
        let mut chain = Vec::new();
        let mut current = node.clone();
        while let Some(assoc) = self.primary_parent(&current)? {
            current = assoc.parent.clone();
            chain.push(assoc);
        }
        chain.reverse();
        Ok(chain)
    }

    // ----- writes -----

    /// Create a node under `parent` through a new primary edge.
    fn create_node(
        &mut self,
        parent: &NodeRef,
        assoc_type: &QName,
        name: &QName,
        node: NewNode,
    ) -> Result<ChildAssoc>;

    /// Add a secondary edge.
    fn add_child(
        &mut self,
        parent: &NodeRef,
        child: &NodeRef,
        assoc_type: &QName,
        name: &QName,
    ) -> Result<ChildAssoc>;

    /// Add a peer association.
    fn create_association(
        &mut self,
        source: &NodeRef,
        target: &NodeRef,
        assoc_type: &QName,
    ) -> Result<PeerAssoc>;

    /// Attach an aspect.
    fn add_aspect(&mut self, node: &NodeRef, aspect: &QName) -> Result<()>;

    /// Set one property.
    fn set_property(&mut self, node: &NodeRef, name: &QName, value: PropertyValue) -> Result<()>;

    /// Set one directly-applied permission entry.
    fn set_permission(&mut self, node: &NodeRef, permission: &AccessPermission) -> Result<()>;

    /// Enable or disable permission inheritance.
    fn set_inherit_permissions(&mut self, node: &NodeRef, inherit: bool) -> Result<()>;

    /// Delete a node together with its primary descendants and every edge
    /// touching them. Store roots cannot be deleted.
    fn delete_node(&mut self, node: &NodeRef) -> Result<()>;

    /// Called once every child of an imported node has been imported.
    fn children_imported(&mut self, _node: &NodeRef) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// CONTENT SERVICE
// =============================================================================

/// A readable payload plus its descriptor.
pub struct ContentReader<'a> {
    pub data: ContentData,
    pub stream: Box<dyn Read + 'a>,
}

/// Binary payloads of content properties.
pub trait ContentService {
    /// Open the payload of a content property, if it has one.
    fn reader(&self, node: &NodeRef, property: &QName) -> Result<Option<ContentReader<'_>>>;

    /// Store a payload and set the property to the resulting descriptor.
    fn write(
        &mut self,
        node: &NodeRef,
        property: &QName,
        data: &ContentData,
        stream: &mut dyn Read,
    ) -> Result<ContentData>;
}

// =============================================================================
// PERMISSION SERVICE
// =============================================================================

/// Rights of the user running an export or import.
pub trait PermissionService {
    /// Whether the actor is the trusted system actor.
    fn is_system(&self) -> bool {
        false
    }

    /// Whether the actor may read the node's permissions.
    fn can_read_permissions(&self, node: &NodeRef) -> bool;

    /// Whether the actor may change the node's permissions.
    fn can_change_permissions(&self, node: &NodeRef) -> bool;

    /// Name recorded as the exporting user.
    fn actor(&self) -> String;
}

/// The system actor: every check passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPermissions;

impl PermissionService for SystemPermissions {
    fn is_system(&self) -> bool {
        true
    }

    fn can_read_permissions(&self, _node: &NodeRef) -> bool {
        true
    }

    fn can_change_permissions(&self, _node: &NodeRef) -> bool {
        true
    }

    fn actor(&self) -> String {
        "System".to_string()
    }
}
