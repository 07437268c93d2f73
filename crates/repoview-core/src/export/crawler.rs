//! # Crawler
//!
//! The chunked two-pass export scheduler, the tree walker and the reference
//! emitter.
//!
//! Pass 1 walks every root of every chunk and describes node bodies. Secondary
//! child edges and peer associations are not written inline; the owning node
//! is marked in the run context instead. Pass 2 starts only after pass 1 has
//! finished for all chunks, and revisits each chunk to write those edges as
//! reference-only elements. Every node a reference can point at has therefore
//! already been described when an importer meets the reference.
//!
//! Per node the event order is fixed: aspects, acl, properties, child edges.

use super::context::{ExportContext, ExportRoot};
use super::events::{ExportMetadata, ReferenceTarget, ValueSlot, ViewEvent, ViewSink};
use crate::config::{ExportSettings, ReferenceType};
use crate::dictionary::Dictionary;
use crate::primitives::{CONVERSION_WARNING, SKIPPED_CONTENT_WARNING};
use crate::repository::{ContentService, NodeService, PermissionService};
use crate::scope::CrawlerParameters;
use crate::types::{
    AccessPermission, ChildAssoc, ContentData, DataType, NodeRef, PathElement, PeerAssoc,
    PropertyValue, QName, RepoPath, Result, Scalar, ViewError,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Outcome of one export run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub chunks: usize,
    pub roots: usize,
    /// Node bodies written.
    pub nodes: usize,
    /// Reference elements written.
    pub references: usize,
    pub warnings: Vec<String>,
}

/// State of one run, passed explicitly through the walk.
struct Run<'p> {
    params: &'p CrawlerParameters,
    ctx: ExportContext,
    included: Option<Vec<RepoPath>>,
    /// Indexed paths of the distinct export parents.
    parent_paths: Vec<Vec<PathElement>>,
    summary: ExportSummary,
}

/// Drives an export over the repository collaborators.
pub struct Crawler<'a> {
    nodes: &'a dyn NodeService,
    content: &'a dyn ContentService,
    permissions: &'a dyn PermissionService,
    dictionary: &'a dyn Dictionary,
    settings: &'a ExportSettings,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> Crawler<'a> {
    #[must_use]
    pub fn new(
        nodes: &'a dyn NodeService,
        content: &'a dyn ContentService,
        permissions: &'a dyn PermissionService,
        dictionary: &'a dyn Dictionary,
        settings: &'a ExportSettings,
    ) -> Self {
        Self {
            nodes,
            content,
            permissions,
            dictionary,
            settings,
            cancel: None,
        }
    }

    /// Abort with [`ViewError::Cancelled`] once `flag` is set.
    #[must_use]
    pub fn with_cancellation(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    // =========================================================================
    // SCHEDULER
    // =========================================================================

    /// Export the scope described by `params` into `sink`.
    pub fn crawl(
        &self,
        params: &CrawlerParameters,
        sink: &mut dyn ViewSink,
    ) -> Result<ExportSummary> {
        let namespaces = self.dictionary.namespaces();
        let nodes = params.export_from.resolve(self.nodes, namespaces)?;
        let included = match &params.included_paths {
            Some(paths) => Some(
                paths
                    .iter()
                    .map(|p| RepoPath::parse(p, namespaces))
                    .collect::<Result<Vec<_>>>()?,
            ),
            None => None,
        };

        let mut roots = Vec::with_capacity(nodes.len());
        for node in nodes {
            let parent = self.export_parent(&node, params.crawl_self)?;
            roots.push(ExportRoot { node, parent });
        }
        let ctx = ExportContext::new(roots, self.settings.chunk_limit());
        let mut parent_paths = Vec::new();
        for root in ctx.roots() {
            let path = self.indexed_path(&root.parent)?;
            if !parent_paths.contains(&path) {
                parent_paths.push(path);
            }
        }

        let mut run = Run {
            params,
            summary: ExportSummary {
                chunks: ctx.chunk_count(),
                roots: ctx.root_count(),
                ..ExportSummary::default()
            },
            ctx,
            included,
            parent_paths,
        };
        info!(
            roots = run.summary.roots,
            chunks = run.summary.chunks,
            "export started"
        );

        sink.event(&ViewEvent::Start(self.metadata(&run)?))?;

        for chunk in 0..run.ctx.chunk_count() {
            debug!(chunk, "pass 1: node bodies");
            for position in 0..run.ctx.chunk_len(chunk) {
                if let Some(root) = run.ctx.enter(chunk, position) {
                    self.check_cancelled()?;
                    self.export_root(&mut run, &root.node, sink)?;
                }
            }
        }

        for chunk in 0..run.ctx.chunk_count() {
            debug!(chunk, "pass 2: references");
            for position in 0..run.ctx.chunk_len(chunk) {
                if run.ctx.enter(chunk, position).is_some() {
                    self.check_cancelled()?;
                    self.export_references(&mut run, sink)?;
                }
            }
        }

        sink.event(&ViewEvent::End)?;
        info!(
            nodes = run.summary.nodes,
            references = run.summary.references,
            warnings = run.summary.warnings.len(),
            "export finished"
        );
        Ok(run.summary)
    }

    fn export_root(
        &self,
        run: &mut Run<'_>,
        root: &NodeRef,
        sink: &mut dyn ViewSink,
    ) -> Result<()> {
        let namespaces: Vec<(String, String)> = self
            .dictionary
            .namespaces()
            .iter()
            .map(|(p, u)| (p.to_string(), u.to_string()))
            .collect();
        for (prefix, uri) in &namespaces {
            sink.event(&ViewEvent::StartNamespace {
                prefix: prefix.clone(),
                uri: uri.clone(),
            })?;
        }

        if run.params.crawl_self {
            let as_reference = self.is_store_root(root)?;
            self.walk_node(run, root, as_reference, sink)?;
        } else if run.params.crawl_children {
            for assoc in self.nodes.child_assocs(root)? {
                if self.is_excluded_child_assoc(run.params, &assoc.assoc_type) {
                    continue;
                }
                if !assoc.primary && !self.settings.export_secondary_nodes {
                    run.ctx.record_secondary_link(root);
                    continue;
                }
                self.walk_node(run, &assoc.child, false, sink)?;
            }
        }

        for (prefix, _) in namespaces.iter().rev() {
            sink.event(&ViewEvent::EndNamespace {
                prefix: prefix.clone(),
            })?;
        }
        Ok(())
    }

    // =========================================================================
    // TREE WALKER (pass 1)
    // =========================================================================

    fn walk_node(
        &self,
        run: &mut Run<'_>,
        node: &NodeRef,
        as_reference: bool,
        sink: &mut dyn ViewSink,
    ) -> Result<()> {
        self.check_cancelled()?;
        let node_type = self.nodes.node_type(node)?;
        if run.params.is_excluded_namespace(node_type.namespace_uri()) {
            return Ok(());
        }
        if !self.is_included_path(run, node)? {
            return Ok(());
        }

        let child_name = self.nodes.primary_parent(node)?.map(|a| a.name);
        if as_reference {
            self.start_reference(run, node, child_name, sink)?;
        } else {
            run.summary.nodes = run.summary.nodes.saturating_add(1);
            sink.event(&ViewEvent::StartNode {
                node: node.clone(),
                node_type: node_type.clone(),
                child_name,
            })?;
        }

        let aspects: Vec<QName> = self.nodes.aspects(node)?.into_iter().collect();
        sink.event(&ViewEvent::StartAspects { node: node.clone() })?;
        for aspect in &aspects {
            if !self.is_excluded_aspect(run.params, aspect) {
                sink.event(&ViewEvent::Aspect {
                    node: node.clone(),
                    aspect: aspect.clone(),
                })?;
            }
        }
        sink.event(&ViewEvent::EndAspects { node: node.clone() })?;

        self.walk_acl(node, sink)?;

        sink.event(&ViewEvent::StartProperties { node: node.clone() })?;
        let mut properties = self.nodes.properties(node)?;
        if run.params.crawl_null_properties {
            for def in self.dictionary.anonymous_properties(&node_type, &aspects) {
                properties
                    .entry(def.name.clone())
                    .or_insert(PropertyValue::Null);
            }
        }
        for (name, value) in &properties {
            if self.is_excluded_property(run.params, name) {
                continue;
            }
            if value.is_null() && !run.params.crawl_null_properties {
                continue;
            }
            self.walk_property(run, node, name, value, sink)?;
        }
        sink.event(&ViewEvent::EndProperties { node: node.clone() })?;

        if run.params.crawl_children {
            let mut buckets: BTreeMap<QName, Vec<ChildAssoc>> = BTreeMap::new();
            for assoc in self.nodes.child_assocs(node)? {
                if self.is_excluded_child_assoc(run.params, &assoc.assoc_type) {
                    continue;
                }
                if !assoc.primary && !self.settings.export_secondary_nodes {
                    run.ctx.record_secondary_link(node);
                    continue;
                }
                if run.params.is_excluded_namespace(assoc.name.namespace_uri()) {
                    continue;
                }
                buckets
                    .entry(assoc.assoc_type.clone())
                    .or_default()
                    .push(assoc);
            }
            if !buckets.is_empty() {
                sink.event(&ViewEvent::StartAssocs { node: node.clone() })?;
                for (assoc_type, assocs) in buckets {
                    sink.event(&ViewEvent::StartAssoc {
                        node: node.clone(),
                        assoc_type: assoc_type.clone(),
                    })?;
                    for assoc in &assocs {
                        self.walk_node(run, &assoc.child, false, sink)?;
                    }
                    sink.event(&ViewEvent::EndAssoc {
                        node: node.clone(),
                        assoc_type,
                    })?;
                }
                sink.event(&ViewEvent::EndAssocs { node: node.clone() })?;
            }
        }

        if run.params.crawl_associations && !self.nodes.target_assocs(node)?.is_empty() {
            run.ctx.record_association(node);
        }

        if as_reference {
            sink.event(&ViewEvent::EndReference { node: node.clone() })
        } else {
            sink.event(&ViewEvent::EndNode { node: node.clone() })
        }
    }

    fn walk_acl(&self, node: &NodeRef, sink: &mut dyn ViewSink) -> Result<()> {
        if !self.permissions.is_system() && !self.permissions.can_read_permissions(node) {
            return Ok(());
        }
        let direct: Vec<AccessPermission> = self
            .nodes
            .permissions(node)?
            .into_iter()
            .filter(|p| p.set_directly)
            .collect();
        let inherit = self.nodes.inherits_permissions(node)?;
        if direct.is_empty() && inherit {
            return Ok(());
        }
        sink.event(&ViewEvent::StartAcl {
            node: node.clone(),
            inherit,
        })?;
        for permission in direct {
            sink.event(&ViewEvent::Permission {
                node: node.clone(),
                permission,
            })?;
        }
        sink.event(&ViewEvent::EndAcl { node: node.clone() })
    }

    fn walk_property(
        &self,
        run: &mut Run<'_>,
        node: &NodeRef,
        property: &QName,
        value: &PropertyValue,
        sink: &mut dyn ViewSink,
    ) -> Result<()> {
        let declared = self
            .dictionary
            .property(property)
            .map(|d| d.data_type)
            .filter(|t| *t != DataType::Any);

        sink.event(&ViewEvent::StartProperty {
            node: node.clone(),
            property: property.clone(),
        })?;
        match value {
            PropertyValue::Null => {
                self.walk_value(run, node, property, declared, None, None, sink)?;
            }
            PropertyValue::Single(scalar) => {
                self.walk_value(run, node, property, declared, Some(scalar), None, sink)?;
            }
            PropertyValue::Collection(items) => {
                sink.event(&ViewEvent::StartValues {
                    node: node.clone(),
                    property: property.clone(),
                })?;
                for (index, item) in items.iter().enumerate() {
                    self.walk_value(
                        run,
                        node,
                        property,
                        declared,
                        item.as_ref(),
                        Some(index),
                        sink,
                    )?;
                }
                sink.event(&ViewEvent::EndValues {
                    node: node.clone(),
                    property: property.clone(),
                })?;
            }
            PropertyValue::MlText(locales) => {
                for (locale, text) in locales {
                    sink.event(&ViewEvent::MlValue {
                        node: node.clone(),
                        property: property.clone(),
                        locale: locale.clone(),
                        value: text.clone(),
                    })?;
                }
            }
        }
        sink.event(&ViewEvent::EndProperty {
            node: node.clone(),
            property: property.clone(),
        })
    }

    fn walk_value(
        &self,
        run: &mut Run<'_>,
        node: &NodeRef,
        property: &QName,
        declared: Option<DataType>,
        value: Option<&Scalar>,
        index: Option<usize>,
        sink: &mut dyn ViewSink,
    ) -> Result<()> {
        let mut slot = ValueSlot {
            node: node.clone(),
            property: property.clone(),
            data_type: None,
            index,
        };
        let is_content = match value {
            Some(Scalar::Content(_)) => declared.is_none_or(|t| t == DataType::Content),
            Some(_) => false,
            None => declared == Some(DataType::Content),
        };
        if is_content {
            if declared.is_none() {
                slot.data_type = Some(DataType::Content);
            }
            let reader = match value {
                Some(_) if run.params.crawl_content => self.content.reader(node, property)?,
                _ => None,
            };
            return match reader {
                Some(mut reader) => {
                    let stream: &mut dyn std::io::Read = reader.stream.as_mut();
                    sink.content(&slot, Some(stream), &reader.data)
                }
                None => {
                    let pointer = match value {
                        Some(Scalar::Content(data)) => data.with_url(""),
                        _ => ContentData::new("", "", 0, "UTF-8"),
                    };
                    sink.content(&slot, None, &pointer)?;
                    self.warn(
                        run,
                        sink,
                        format!(
                            "{} {} on node {}",
                            SKIPPED_CONTENT_WARNING, property, node
                        ),
                    );
                    Ok(())
                }
            };
        }

        let Some(scalar) = value else {
            return sink.event(&ViewEvent::Value { slot, value: None });
        };
        if declared.is_none() {
            slot.data_type = Some(scalar.data_type());
        }

        if declared.is_some_and(|t| !t.accepts(scalar)) {
            self.warn(
                run,
                sink,
                format!("Value of property {} {}", property, CONVERSION_WARNING),
            );
            slot.data_type = None;
            return sink.event(&ViewEvent::Value {
                slot,
                value: Some(Scalar::Text(scalar.to_string())),
            });
        }

        let value = match (scalar, self.settings.reference_type) {
            (Scalar::NodeRef(target), ReferenceType::PathRef) if self.nodes.exists(target)? => {
                let path = self.reference_path(run, node, target)?;
                Scalar::Text(path.to_prefixed_string(self.dictionary.namespaces())?)
            }
            _ => scalar.clone(),
        };
        sink.event(&ViewEvent::Value {
            slot,
            value: Some(value),
        })
    }

    // =========================================================================
    // REFERENCE EMITTER (pass 2)
    // =========================================================================

    fn export_references(&self, run: &mut Run<'_>, sink: &mut dyn ViewSink) -> Result<()> {
        for node in run.ctx.secondary_links() {
            self.walk_secondary_links(run, &node, sink)?;
        }
        for node in run.ctx.associations() {
            self.walk_associations(run, &node, sink)?;
        }
        Ok(())
    }

    fn walk_secondary_links(
        &self,
        run: &mut Run<'_>,
        node: &NodeRef,
        sink: &mut dyn ViewSink,
    ) -> Result<()> {
        let mut buckets: BTreeMap<QName, Vec<ChildAssoc>> = BTreeMap::new();
        for assoc in self.nodes.child_assocs(node)? {
            if assoc.primary || self.is_excluded_child_assoc(run.params, &assoc.assoc_type) {
                continue;
            }
            if !self.is_within_export(run, &assoc.child)? {
                continue;
            }
            buckets
                .entry(assoc.assoc_type.clone())
                .or_default()
                .push(assoc);
        }
        if buckets.is_empty() {
            return Ok(());
        }

        self.start_reference(run, node, None, sink)?;
        sink.event(&ViewEvent::StartAssocs { node: node.clone() })?;
        for (assoc_type, assocs) in buckets {
            sink.event(&ViewEvent::StartAssoc {
                node: node.clone(),
                assoc_type: assoc_type.clone(),
            })?;
            for assoc in assocs {
                self.start_reference(run, &assoc.child, Some(assoc.name.clone()), sink)?;
                sink.event(&ViewEvent::EndReference {
                    node: assoc.child.clone(),
                })?;
            }
            sink.event(&ViewEvent::EndAssoc {
                node: node.clone(),
                assoc_type,
            })?;
        }
        sink.event(&ViewEvent::EndAssocs { node: node.clone() })?;
        sink.event(&ViewEvent::EndReference { node: node.clone() })
    }

    fn walk_associations(
        &self,
        run: &mut Run<'_>,
        node: &NodeRef,
        sink: &mut dyn ViewSink,
    ) -> Result<()> {
        let mut buckets: BTreeMap<QName, Vec<PeerAssoc>> = BTreeMap::new();
        for assoc in self.nodes.target_assocs(node)? {
            if run
                .params
                .is_excluded_namespace(assoc.assoc_type.namespace_uri())
            {
                continue;
            }
            if !self.is_within_export(run, &assoc.target)? {
                continue;
            }
            buckets
                .entry(assoc.assoc_type.clone())
                .or_default()
                .push(assoc);
        }
        if buckets.is_empty() {
            return Ok(());
        }

        self.start_reference(run, node, None, sink)?;
        sink.event(&ViewEvent::StartAssocs { node: node.clone() })?;
        for (assoc_type, assocs) in buckets {
            sink.event(&ViewEvent::StartAssoc {
                node: node.clone(),
                assoc_type: assoc_type.clone(),
            })?;
            for assoc in assocs {
                self.start_reference(run, &assoc.target, None, sink)?;
                sink.event(&ViewEvent::EndReference {
                    node: assoc.target.clone(),
                })?;
            }
            sink.event(&ViewEvent::EndAssoc {
                node: node.clone(),
                assoc_type,
            })?;
        }
        sink.event(&ViewEvent::EndAssocs { node: node.clone() })?;
        sink.event(&ViewEvent::EndReference { node: node.clone() })
    }

    fn start_reference(
        &self,
        run: &mut Run<'_>,
        node: &NodeRef,
        child_name: Option<QName>,
        sink: &mut dyn ViewSink,
    ) -> Result<()> {
        let target = self.reference_target(run, node)?;
        run.summary.references = run.summary.references.saturating_add(1);
        sink.event(&ViewEvent::StartReference {
            node: node.clone(),
            target,
            child_name,
        })
    }

    /// A root exported without itself stands for the import location and is
    /// written as `.`. Store roots are always written by path; other nodes per
    /// the settings.
    fn reference_target(&self, run: &Run<'_>, node: &NodeRef) -> Result<ReferenceTarget> {
        if !run.params.crawl_self && run.ctx.is_export_root(node) {
            return Ok(ReferenceTarget::Path(".".to_string()));
        }
        if self.is_store_root(node)? {
            return Ok(ReferenceTarget::Path("/".to_string()));
        }
        match self.settings.reference_type {
            ReferenceType::NodeRef => Ok(ReferenceTarget::NodeRef(node.clone())),
            ReferenceType::PathRef => {
                let path = match run.ctx.current_parent() {
                    Some(parent) => self.reference_path(run, parent, node)?,
                    None => RepoPath::absolute(self.indexed_path(node)?),
                };
                Ok(ReferenceTarget::Path(
                    path.to_prefixed_string(self.dictionary.namespaces())?,
                ))
            }
        }
    }

    /// Path from `from` to `to`: relative when `to` lies under an export
    /// parent, absolute otherwise.
    fn reference_path(&self, run: &Run<'_>, from: &NodeRef, to: &NodeRef) -> Result<RepoPath> {
        let to_path = self.indexed_path(to)?;
        if !run.parent_paths.iter().any(|p| to_path.starts_with(p)) {
            return Ok(RepoPath::absolute(to_path));
        }
        let from_path = self.indexed_path(from)?;
        let common = from_path
            .iter()
            .zip(to_path.iter())
            .take_while(|(a, b)| a == b)
            .count();
        let mut elements = vec![PathElement::Parent; from_path.len() - common];
        elements.extend(to_path[common..].iter().cloned());
        Ok(RepoPath::relative(elements))
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn check_cancelled(&self) -> Result<()> {
        match self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(ViewError::Cancelled),
            _ => Ok(()),
        }
    }

    fn warn(&self, run: &mut Run<'_>, sink: &mut dyn ViewSink, message: String) {
        warn!("{}", message);
        sink.warning(&message);
        run.summary.warnings.push(message);
    }

    fn metadata(&self, run: &Run<'_>) -> Result<ExportMetadata> {
        let namespaces = self.dictionary.namespaces();
        let mut export_of = Vec::with_capacity(run.summary.roots);
        for root in run.ctx.roots() {
            let path = self.node_path(&root.node)?;
            export_of.push(
                path.to_prefixed_string(namespaces)
                    .unwrap_or_else(|_| root.node.to_string()),
            );
        }
        Ok(ExportMetadata {
            exported_by: self
                .settings
                .exported_by
                .clone()
                .unwrap_or_else(|| self.permissions.actor()),
            export_date: self.settings.export_date.clone(),
            exporter_version: env!("CARGO_PKG_VERSION").to_string(),
            export_of,
        })
    }

    fn is_store_root(&self, node: &NodeRef) -> Result<bool> {
        Ok(&self.nodes.root_node(node.store())? == node)
    }

    /// The node a root is exported relative to.
    fn export_parent(&self, node: &NodeRef, crawl_self: bool) -> Result<NodeRef> {
        if !crawl_self || self.is_store_root(node)? {
            return Ok(node.clone());
        }
        Ok(self
            .nodes
            .primary_parent(node)?
            .map_or_else(|| node.clone(), |a| a.parent))
    }

    /// Primary path of a node, without sibling indices.
    fn node_path(&self, node: &NodeRef) -> Result<RepoPath> {
        Ok(RepoPath::absolute(
            self.nodes
                .primary_path(node)?
                .into_iter()
                .map(|a| PathElement::child(a.name))
                .collect(),
        ))
    }

    /// Primary path of a node with `[n]` indices where siblings share a name.
    fn indexed_path(&self, node: &NodeRef) -> Result<Vec<PathElement>> {
        let chain = self.nodes.primary_path(node)?;
        let mut elements = Vec::with_capacity(chain.len());
        for assoc in chain {
            let siblings: Vec<ChildAssoc> = self
                .nodes
                .child_assocs(&assoc.parent)?
                .into_iter()
                .filter(|a| a.name == assoc.name)
                .collect();
            let index = if siblings.len() > 1 {
                siblings
                    .iter()
                    .position(|a| a.child == assoc.child)
                    .map(|i| i + 1)
            } else {
                None
            };
            elements.push(PathElement::Child {
                name: assoc.name,
                index,
            });
        }
        Ok(elements)
    }

    fn is_included_path(&self, run: &Run<'_>, node: &NodeRef) -> Result<bool> {
        let Some(included) = &run.included else {
            return Ok(true);
        };
        let path = self.node_path(node)?;
        Ok(included.iter().any(|p| p.overlaps(&path)))
    }

    /// Whether pass 1 described the node, so a reference to it resolves on import.
    fn is_within_export(&self, run: &Run<'_>, node: &NodeRef) -> Result<bool> {
        if run
            .params
            .is_excluded_namespace(self.nodes.node_type(node)?.namespace_uri())
            || !self.is_included_path(run, node)?
        {
            return Ok(false);
        }
        if run.ctx.is_export_root(node) {
            return Ok(run.params.crawl_self);
        }
        Ok(self
            .nodes
            .primary_path(node)?
            .iter()
            .any(|a| run.ctx.is_export_root(&a.parent)))
    }

    fn is_excluded_aspect(&self, params: &CrawlerParameters, aspect: &QName) -> bool {
        params.is_excluded_namespace(aspect.namespace_uri()) || params.exclude_aspects.contains(aspect)
    }

    fn is_excluded_property(&self, params: &CrawlerParameters, property: &QName) -> bool {
        params.is_excluded_namespace(property.namespace_uri())
            || self.dictionary.property(property).is_some_and(|def| {
                self.dictionary.aspect(&def.container).is_some()
                    && params.exclude_aspects.contains(&def.container)
            })
    }

    fn is_excluded_child_assoc(&self, params: &CrawlerParameters, assoc_type: &QName) -> bool {
        params.is_excluded_namespace(assoc_type.namespace_uri())
            || params.exclude_child_assocs.contains(assoc_type)
            || self
                .dictionary
                .association(assoc_type)
                .is_some_and(|def| params.exclude_aspects.contains(&def.source))
    }
}
