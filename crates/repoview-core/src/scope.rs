//! # Export Scope
//!
//! What an export crawls: an explicit root list or a single location, plus the
//! flags and exclusion lists applied at every level of the walk.
//!
//! The scope is caller-supplied; this module only resolves it to concrete
//! root nodes and rejects scopes that do not resolve.

use crate::namespace::NamespaceRegistry;
use crate::primitives::VIEW_NAMESPACE_URI;
use crate::repository::NodeService;
use crate::types::{NodeRef, QName, Result, StoreRef, ViewError};
use serde::{Deserialize, Serialize};

// =============================================================================
// LOCATION
// =============================================================================

/// A store, an optional node within it, and an optional path below that node.
///
/// Also used as the import target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Location {
    pub store: StoreRef,
    #[serde(default)]
    pub node: Option<NodeRef>,
    /// Path query evaluated relative to `node` (or the store root).
    #[serde(default)]
    pub path: Option<String>,
    /// Child association used for top-level nodes on import.
    #[serde(default)]
    pub child_assoc_type: Option<QName>,
}

impl Location {
    /// The root of a store.
    #[must_use]
    pub fn store_root(store: StoreRef) -> Self {
        Self {
            store,
            node: None,
            path: None,
            child_assoc_type: None,
        }
    }

    /// A specific node.
    #[must_use]
    pub fn node(node: NodeRef) -> Self {
        Self {
            store: node.store().clone(),
            node: Some(node),
            path: None,
            child_assoc_type: None,
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_child_assoc_type(mut self, assoc_type: QName) -> Self {
        self.child_assoc_type = Some(assoc_type);
        self
    }

    /// Resolve to exactly one node.
    pub fn resolve(
        &self,
        nodes: &dyn NodeService,
        namespaces: &NamespaceRegistry,
    ) -> Result<NodeRef> {
        let base = match &self.node {
            Some(node) => {
                if !nodes.exists(node)? {
                    return Err(ViewError::ScopeResolution(format!(
                        "Node {} does not exist",
                        node
                    )));
                }
                node.clone()
            }
            None => nodes.root_node(&self.store).map_err(|e| {
                ViewError::ScopeResolution(format!("Store {}: {}", self.store, e))
            })?,
        };
        let Some(path) = self.path.as_deref().filter(|p| !p.trim().is_empty()) else {
            return Ok(base);
        };
        let mut found = nodes.select_nodes(&base, path, namespaces)?;
        match found.len() {
            1 => Ok(found.remove(0)),
            0 => Err(ViewError::ScopeResolution(format!(
                "Path {} within {} does not resolve to a node",
                path, base
            ))),
            n => Err(ViewError::ScopeResolution(format!(
                "Path {} within {} resolves to {} nodes",
                path, base, n
            ))),
        }
    }
}

// =============================================================================
// CRAWLER PARAMETERS
// =============================================================================

/// Where the export starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFrom {
    /// Explicit root list; every node must exist.
    Nodes(Vec<NodeRef>),
    /// A single location resolving to exactly one node.
    Location(Location),
}

impl Default for ExportFrom {
    fn default() -> Self {
        Self::Nodes(Vec::new())
    }
}

impl ExportFrom {
    /// Resolve to the export root list.
    pub fn resolve(
        &self,
        nodes: &dyn NodeService,
        namespaces: &NamespaceRegistry,
    ) -> Result<Vec<NodeRef>> {
        match self {
            Self::Nodes(list) => {
                for node in list {
                    if !nodes.exists(node)? {
                        return Err(ViewError::ScopeResolution(format!(
                            "Export root {} does not exist",
                            node
                        )));
                    }
                }
                Ok(list.clone())
            }
            Self::Location(location) => Ok(vec![location.resolve(nodes, namespaces)?]),
        }
    }
}

/// Flags and filters of one export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrawlerParameters {
    pub export_from: ExportFrom,
    /// Export each root itself (true) or only its children (false).
    pub crawl_self: bool,
    pub crawl_children: bool,
    pub crawl_associations: bool,
    pub crawl_content: bool,
    pub crawl_null_properties: bool,
    pub exclude_namespace_uris: Vec<String>,
    pub exclude_aspects: Vec<QName>,
    pub exclude_child_assocs: Vec<QName>,
    /// Path allow-list; `None` allows everything.
    pub included_paths: Option<Vec<String>>,
}

impl Default for CrawlerParameters {
    fn default() -> Self {
        Self {
            export_from: ExportFrom::default(),
            crawl_self: false,
            crawl_children: true,
            crawl_associations: true,
            crawl_content: true,
            crawl_null_properties: true,
            exclude_namespace_uris: vec![VIEW_NAMESPACE_URI.to_string()],
            exclude_aspects: Vec::new(),
            exclude_child_assocs: Vec::new(),
            included_paths: None,
        }
    }
}

impl CrawlerParameters {
    /// Default parameters over an explicit root list.
    #[must_use]
    pub fn for_nodes(nodes: Vec<NodeRef>) -> Self {
        Self {
            export_from: ExportFrom::Nodes(nodes),
            ..Self::default()
        }
    }

    /// Default parameters over a location.
    #[must_use]
    pub fn for_location(location: Location) -> Self {
        Self {
            export_from: ExportFrom::Location(location),
            ..Self::default()
        }
    }

    /// Whether names in this namespace are filtered out.
    #[must_use]
    pub fn is_excluded_namespace(&self, uri: &str) -> bool {
        self.exclude_namespace_uris.iter().any(|u| u == uri)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::memory::MemoryRepository;
    use crate::repository::NewNode;
    use std::collections::BTreeMap;

    const CM: &str = "urn:test:cm";

    fn setup() -> (MemoryRepository, NamespaceRegistry, NodeRef, NodeRef) {
        let mut repo = MemoryRepository::new();
        let root = repo.create_store(StoreRef::new("workspace", "test"));
        let new = || NewNode {
            node_type: QName::new(CM, "folder"),
            uuid: None,
            properties: BTreeMap::new(),
        };
        let a = repo
            .create_node(&root, &QName::new(CM, "contains"), &QName::new(CM, "a"), new())
            .unwrap()
            .child;
        for _ in 0..2 {
            repo.create_node(&a, &QName::new(CM, "contains"), &QName::new(CM, "dup"), new())
                .unwrap();
        }
        let mut ns = NamespaceRegistry::new();
        ns.register("cm", CM);
        (repo, ns, root, a)
    }

    #[test]
    fn defaults_exclude_the_view_namespace() {
        let params = CrawlerParameters::default();
        assert!(params.is_excluded_namespace(VIEW_NAMESPACE_URI));
        assert!(params.crawl_children && params.crawl_null_properties && !params.crawl_self);
    }

    #[test]
    fn location_resolves_paths() {
        let (repo, ns, root, a) = setup();
        let loc = Location::store_root(root.store().clone());
        assert_eq!(loc.resolve(&repo, &ns).unwrap(), root);
        assert_eq!(loc.clone().with_path("/cm:a").resolve(&repo, &ns).unwrap(), a);
    }

    #[test]
    fn location_must_resolve_to_exactly_one_node() {
        let (repo, ns, root, a) = setup();
        let none = Location::store_root(root.store().clone()).with_path("/cm:nothing");
        assert!(matches!(none.resolve(&repo, &ns), Err(ViewError::ScopeResolution(_))));

        let many = Location::node(a).with_path("cm:dup");
        let err = many.resolve(&repo, &ns).unwrap_err();
        assert!(err.to_string().contains("resolves to 2 nodes"));
    }

    #[test]
    fn missing_explicit_roots_are_rejected() {
        let (repo, ns, root, _) = setup();
        let ghost = NodeRef::new(root.store().clone(), "ghost");
        let from = ExportFrom::Nodes(vec![root, ghost]);
        assert!(matches!(from.resolve(&repo, &ns), Err(ViewError::ScopeResolution(_))));
    }
}
