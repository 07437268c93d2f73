//! # Export Run Context
//!
//! Run-scoped chunk state: the export roots partitioned into bounded batches,
//! the parent each root is exported relative to, and the nodes whose deferred
//! edges pass 2 must emit. Owned by a single export run; never shared.

use crate::types::NodeRef;
use std::collections::BTreeSet;

/// One export root and the node it is exported relative to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRoot {
    pub node: NodeRef,
    pub parent: NodeRef,
}

/// Markers recorded for one root during pass 1.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Markers {
    secondary_links: BTreeSet<NodeRef>,
    associations: BTreeSet<NodeRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Chunk {
    roots: Vec<ExportRoot>,
    markers: Vec<Markers>,
}

/// Chunk state of one export run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportContext {
    chunks: Vec<Chunk>,
    root_set: BTreeSet<NodeRef>,
    chunk: usize,
    position: usize,
}

impl ExportContext {
    /// Partition roots into chunks of at most `limit` (one chunk when `None`).
    #[must_use]
    pub fn new(roots: Vec<ExportRoot>, limit: Option<usize>) -> Self {
        let root_set = roots.iter().map(|r| r.node.clone()).collect();
        let size = limit.unwrap_or(roots.len()).max(1);
        let chunks = roots
            .chunks(size)
            .map(|batch| Chunk {
                roots: batch.to_vec(),
                markers: vec![Markers::default(); batch.len()],
            })
            .collect();
        Self {
            chunks,
            root_set,
            chunk: 0,
            position: 0,
        }
    }

    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Number of roots in a chunk.
    #[must_use]
    pub fn chunk_len(&self, chunk: usize) -> usize {
        self.chunks.get(chunk).map_or(0, |c| c.roots.len())
    }

    #[must_use]
    pub fn root_count(&self) -> usize {
        self.chunks.iter().map(|c| c.roots.len()).sum()
    }

    /// Whether a node is one of the export roots.
    #[must_use]
    pub fn is_export_root(&self, node: &NodeRef) -> bool {
        self.root_set.contains(node)
    }

    /// Every root in export order.
    pub fn roots(&self) -> impl Iterator<Item = &ExportRoot> {
        self.chunks.iter().flat_map(|c| c.roots.iter())
    }

    /// Make `(chunk, position)` current and return its root.
    pub fn enter(&mut self, chunk: usize, position: usize) -> Option<ExportRoot> {
        let root = self.chunks.get(chunk)?.roots.get(position)?.clone();
        self.chunk = chunk;
        self.position = position;
        Some(root)
    }

    /// The parent the current root is exported relative to.
    #[must_use]
    pub fn current_parent(&self) -> Option<&NodeRef> {
        self.chunks
            .get(self.chunk)
            .and_then(|c| c.roots.get(self.position))
            .map(|r| &r.parent)
    }

    fn current_markers(&mut self) -> Option<&mut Markers> {
        self.chunks
            .get_mut(self.chunk)
            .and_then(|c| c.markers.get_mut(self.position))
    }

    /// Mark a node as having secondary child edges to emit in pass 2.
    pub fn record_secondary_link(&mut self, node: &NodeRef) {
        if let Some(markers) = self.current_markers() {
            markers.secondary_links.insert(node.clone());
        }
    }

    /// Mark a node as having peer associations to emit in pass 2.
    pub fn record_association(&mut self, node: &NodeRef) {
        if let Some(markers) = self.current_markers() {
            markers.associations.insert(node.clone());
        }
    }

    /// Nodes marked with secondary edges under the current root.
    #[must_use]
    pub fn secondary_links(&self) -> Vec<NodeRef> {
        self.markers()
            .map(|m| m.secondary_links.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Nodes marked with peer associations under the current root.
    #[must_use]
    pub fn associations(&self) -> Vec<NodeRef> {
        self.markers()
            .map(|m| m.associations.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn markers(&self) -> Option<&Markers> {
        self.chunks
            .get(self.chunk)
            .and_then(|c| c.markers.get(self.position))
    }
}
