//! # Node Importer
//!
//! Commits parsed nodes into a repository.
//!
//! Node creation happens as the parser hands nodes over. Reference-typed
//! property values can point at nodes described later in the document, so
//! they are held back and bound once the document has been read.

use super::Importer;
use super::context::{ImportMetadata, ImportNode, ImportValue};
use crate::config::{ImportSettings, UuidBinding};
use crate::dictionary::Dictionary;
use crate::namespace::NamespaceRegistry;
use crate::package::ImportPackageHandler;
use crate::primitives::{SKIPPED_CONTENT_WARNING, SYS_NAME, SYS_NODE_UUID, sys_name};
use crate::repository::{ContentService, NewNode, NodeService, PermissionService};
use crate::types::{
    ContentData, DataType, NodeRef, PropertyValue, QName, Result, Scalar, ViewError,
};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

/// Counts of an import run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub nodes_created: usize,
    /// Existing nodes merged into under [`UuidBinding::UpdateExisting`].
    pub nodes_updated: usize,
    pub references_linked: usize,
    /// Reference-typed properties bound after the document was read.
    pub deferred_bound: usize,
    pub warnings: Vec<String>,
}

/// A reference-typed property waiting for the end of the document.
#[derive(Debug, Clone)]
struct DeferredValue {
    node: NodeRef,
    property: QName,
    value: ImportValue,
}

/// Property values of a parsed node, split by how they are written.
#[derive(Debug, Default)]
struct StagedProperties {
    plain: BTreeMap<QName, PropertyValue>,
    contents: Vec<(QName, ImportValue)>,
    deferred: Vec<(QName, ImportValue)>,
}

/// Outcome of binding a recorded node id.
#[derive(Debug)]
enum Binding {
    /// Create a node; `uuid` is the id to create it with, if any.
    Create {
        parent: NodeRef,
        assoc_type: Option<QName>,
        uuid: Option<String>,
    },
    /// Merge into this existing node.
    Update(NodeRef),
}

/// Importer that writes into a [`NodeService`] and [`ContentService`].
pub struct NodeImporter<'a, R: NodeService + ContentService> {
    repo: &'a mut R,
    permissions: &'a dyn PermissionService,
    dictionary: &'a dyn Dictionary,
    package: Option<&'a mut dyn ImportPackageHandler>,
    settings: ImportSettings,
    root: NodeRef,
    root_assoc_type: Option<QName>,
    /// Node id recorded in the document → node created for it.
    remap: BTreeMap<String, NodeRef>,
    deferred: Vec<DeferredValue>,
    summary: ImportSummary,
}

impl<'a, R: NodeService + ContentService> NodeImporter<'a, R> {
    #[must_use]
    pub fn new(
        repo: &'a mut R,
        permissions: &'a dyn PermissionService,
        dictionary: &'a dyn Dictionary,
        settings: ImportSettings,
        root: NodeRef,
        root_assoc_type: Option<QName>,
    ) -> Self {
        Self {
            repo,
            permissions,
            dictionary,
            package: None,
            settings,
            root,
            root_assoc_type,
            remap: BTreeMap::new(),
            deferred: Vec::new(),
            summary: ImportSummary::default(),
        }
    }

    /// Resolve content pointers through `package`.
    #[must_use]
    pub fn with_package(mut self, package: &'a mut dyn ImportPackageHandler) -> Self {
        self.package = Some(package);
        self
    }

    pub fn summary(&self) -> &ImportSummary {
        &self.summary
    }

    #[must_use]
    pub fn into_summary(self) -> ImportSummary {
        self.summary
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.summary.warnings.push(message);
    }

    // =========================================================================
    // NODE CREATION
    // =========================================================================

    fn create_node(&mut self, node: &ImportNode) -> Result<NodeRef> {
        let staged = self.stage_properties(node)?;
        let (parent, assoc_type, uuid) = match self.bind_uuid(node)? {
            Binding::Update(existing) => {
                self.merge_into(&existing, node, staged)?;
                debug!(node = %existing, "node updated");
                self.summary.nodes_updated = self.summary.nodes_updated.saturating_add(1);
                return Ok(existing);
            }
            Binding::Create {
                parent,
                assoc_type,
                uuid,
            } => (parent, assoc_type, uuid),
        };
        let assoc_type = match assoc_type {
            Some(assoc_type) => assoc_type,
            None => self.derive_assoc_type(&parent, &node.node_type)?,
        };
        let name = self.child_name(node);

        let created = self
            .repo
            .create_node(
                &parent,
                &assoc_type,
                &name,
                NewNode {
                    node_type: node.node_type.clone(),
                    uuid,
                    properties: staged.plain,
                },
            )?
            .child;
        debug!(node = %created, node_type = %node.node_type, name = %name, "node created");

        for aspect in &node.aspects {
            self.repo.add_aspect(&created, aspect)?;
        }
        self.complete(&created, node, staged.contents, staged.deferred)?;
        self.summary.nodes_created = self.summary.nodes_created.saturating_add(1);
        Ok(created)
    }

    fn stage_properties(&self, node: &ImportNode) -> Result<StagedProperties> {
        let mut staged = StagedProperties::default();
        for (property, value) in &node.properties {
            if *property == sys_name(SYS_NODE_UUID) {
                continue;
            }
            let data_type = self
                .dictionary
                .property(property)
                .map(|def| def.data_type)
                .or_else(|| node.datatypes.get(property).copied());
            match data_type {
                Some(t) if t.is_reference() => {
                    staged.deferred.push((property.clone(), value.clone()));
                }
                Some(DataType::Content) => staged.contents.push((property.clone(), value.clone())),
                _ => {
                    staged
                        .plain
                        .insert(property.clone(), convert(value, data_type)?);
                }
            }
        }
        Ok(staged)
    }

    /// Write the body of `node` onto a node that already exists. Aspects and
    /// properties are added; nothing is removed.
    fn merge_into(
        &mut self,
        target: &NodeRef,
        node: &ImportNode,
        staged: StagedProperties,
    ) -> Result<()> {
        let present = self.repo.aspects(target)?;
        for aspect in node.aspects.iter().filter(|a| !present.contains(*a)) {
            self.repo.add_aspect(target, aspect)?;
        }
        for (property, value) in staged.plain {
            self.repo.set_property(target, &property, value)?;
        }
        self.complete(target, node, staged.contents, staged.deferred)
    }

    /// Content, permissions and held-back reference values, written once the
    /// node exists.
    fn complete(
        &mut self,
        target: &NodeRef,
        node: &ImportNode,
        contents: Vec<(QName, ImportValue)>,
        deferred: Vec<(QName, ImportValue)>,
    ) -> Result<()> {
        for (property, value) in contents {
            self.import_content(target, &property, &value)?;
        }
        self.apply_acl(target, node)?;
        for (property, value) in deferred {
            self.deferred.push(DeferredValue {
                node: target.clone(),
                property,
                value,
            });
        }
        if let Some(original) = node
            .properties
            .get(&sys_name(SYS_NODE_UUID))
            .and_then(ImportValue::as_text)
        {
            self.remap
                .insert(original.trim().to_string(), target.clone());
        }
        Ok(())
    }

    /// Closest child association of the parent's anonymous type whose target
    /// the node type satisfies.
    fn derive_assoc_type(&self, parent: &NodeRef, node_type: &QName) -> Result<QName> {
        let parent_type = self.repo.node_type(parent)?;
        let parent_aspects: Vec<QName> = self.repo.aspects(parent)?.into_iter().collect();
        self.dictionary
            .anonymous_associations(&parent_type, &parent_aspects)
            .into_iter()
            .filter(|def| def.child)
            .filter_map(|def| {
                self.dictionary
                    .class_distance(node_type, &def.target)
                    .map(|distance| (distance, def.name.clone()))
            })
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, name)| name)
            .ok_or_else(|| {
                ViewError::UnknownDefinition(format!(
                    "Cannot determine child association for type {} under {}",
                    node_type, parent
                ))
            })
    }

    fn child_name(&self, node: &ImportNode) -> QName {
        if let Some(name) = &node.child_name {
            return name.clone();
        }
        let namespace = node.node_type.namespace_uri();
        if let Some(name) = node
            .properties
            .get(&sys_name(SYS_NAME))
            .and_then(ImportValue::as_text)
            .map(str::trim)
            .filter(|name| !name.is_empty())
        {
            return QName::new(namespace, name);
        }
        match &node.import_id {
            Some(id) => QName::new(namespace, id.clone()),
            None => node.node_type.clone(),
        }
    }

    fn bind_uuid(&mut self, node: &ImportNode) -> Result<Binding> {
        let mut parent = node.parent.clone();
        let mut assoc_type = node.assoc_type.clone();
        let Some(uuid) = node
            .properties
            .get(&sys_name(SYS_NODE_UUID))
            .and_then(ImportValue::as_text)
            .map(str::trim)
            .filter(|uuid| !uuid.is_empty())
        else {
            return Ok(Binding::Create {
                parent,
                assoc_type,
                uuid: None,
            });
        };
        let existing = NodeRef::new(node.parent.store().clone(), uuid);
        let uuid = match self.settings.uuid_binding {
            UuidBinding::CreateNew => None,
            UuidBinding::PreserveUuid => {
                (!self.repo.exists(&existing)?).then(|| uuid.to_string())
            }
            UuidBinding::ThrowOnCollision => {
                if self.repo.exists(&existing)? {
                    return Err(ViewError::Store(format!(
                        "Node {} already exists",
                        existing
                    )));
                }
                Some(uuid.to_string())
            }
            UuidBinding::RemoveExisting => {
                if self.repo.exists(&existing)? {
                    debug!(node = %existing, "removing existing node");
                    self.repo.delete_node(&existing)?;
                }
                Some(uuid.to_string())
            }
            UuidBinding::ReplaceExisting => {
                if self.repo.exists(&existing)? {
                    if let Some(place) = self.repo.primary_parent(&existing)? {
                        parent = place.parent;
                        assoc_type = Some(place.assoc_type);
                    }
                    debug!(node = %existing, parent = %parent, "replacing existing node");
                    self.repo.delete_node(&existing)?;
                }
                Some(uuid.to_string())
            }
            UuidBinding::UpdateExisting => {
                if self.repo.exists(&existing)? {
                    return Ok(Binding::Update(existing));
                }
                Some(uuid.to_string())
            }
        };
        Ok(Binding::Create {
            parent,
            assoc_type,
            uuid,
        })
    }

    fn import_content(
        &mut self,
        node: &NodeRef,
        property: &QName,
        value: &ImportValue,
    ) -> Result<()> {
        let Some(text) = value.as_text().filter(|t| !t.trim().is_empty()) else {
            return Ok(());
        };
        let data: ContentData = text.parse()?;
        if data.url.is_empty() {
            debug!(node = %node, property = %property, "content pointer without url");
            return Ok(());
        }
        let Some(package) = self.package.as_deref_mut() else {
            self.warn(format!(
                "{} {} of node {}: no package to read from",
                SKIPPED_CONTENT_WARNING, property, node
            ));
            return Ok(());
        };
        let mut stream = package.import_stream(&data.url)?;
        self.repo.write(node, property, &data, &mut *stream)?;
        Ok(())
    }

    fn apply_acl(&mut self, created: &NodeRef, node: &ImportNode) -> Result<()> {
        if node.acl.is_empty() && node.inherit {
            return Ok(());
        }
        if !self.permissions.can_change_permissions(created) {
            self.warn(format!("Permissions of node {} were not applied", created));
            return Ok(());
        }
        for entry in &node.acl {
            self.repo.set_permission(created, entry)?;
        }
        if !node.inherit {
            self.repo.set_inherit_permissions(created, false)?;
        }
        Ok(())
    }

    // =========================================================================
    // REFERENCES
    // =========================================================================

    /// Link the target of a reference element under its parent, then write
    /// whatever body the element carries onto the target.
    fn link_reference(&mut self, node: &ImportNode, target: &NodeRef) -> Result<NodeRef> {
        let staged = self.stage_properties(node)?;
        if !node.at_import_root {
            self.link(node, target)?;
        }
        self.merge_into(target, node, staged)?;
        Ok(target.clone())
    }

    fn link(&mut self, node: &ImportNode, target: &NodeRef) -> Result<()> {
        let assoc_type = match &node.assoc_type {
            Some(assoc_type) => assoc_type.clone(),
            None => self.derive_assoc_type(&node.parent, &node.node_type)?,
        };
        let child = self
            .dictionary
            .association(&assoc_type)
            .map(|def| def.child)
            .ok_or_else(|| {
                ViewError::UnknownDefinition(format!(
                    "Association {} has not been defined",
                    assoc_type
                ))
            })?;
        if child {
            let name = match &node.child_name {
                Some(name) => name.clone(),
                None => match self.repo.primary_parent(target)? {
                    Some(assoc) => assoc.name,
                    None => self.child_name(node),
                },
            };
            self.repo
                .add_child(&node.parent, target, &assoc_type, &name)?;
        } else {
            self.repo
                .create_association(&node.parent, target, &assoc_type)?;
        }
        debug!(parent = %node.parent, target = %target, assoc = %assoc_type, "reference linked");
        self.summary.references_linked = self.summary.references_linked.saturating_add(1);
        Ok(())
    }

    /// Node a reference-typed value points at: a node identifier (remapped
    /// when the node was created by this import) or a path query relative to
    /// the owning node.
    fn resolve_value(
        &self,
        owner: &NodeRef,
        text: &str,
        namespaces: &NamespaceRegistry,
    ) -> Result<NodeRef> {
        let text = text.trim();
        if text.contains("://") {
            let node: NodeRef = text.parse()?;
            return Ok(self.remap.get(node.id()).cloned().unwrap_or(node));
        }
        self.select_one(owner, text, namespaces)
    }

    fn select_one(
        &self,
        context: &NodeRef,
        path: &str,
        namespaces: &NamespaceRegistry,
    ) -> Result<NodeRef> {
        let mut found = self.repo.select_nodes(context, path, namespaces)?;
        match found.len() {
            1 => Ok(found.remove(0)),
            n => Err(ViewError::ReferenceResolution(format!(
                "Path {} relative to {} matches {} nodes; expected exactly one",
                path, context, n
            ))),
        }
    }

    fn bind_deferred(
        &mut self,
        deferred: &DeferredValue,
        namespaces: &NamespaceRegistry,
    ) -> Result<()> {
        let bind = |text: &str| {
            self.resolve_value(&deferred.node, text, namespaces)
                .map(Scalar::NodeRef)
        };
        let value = match &deferred.value {
            ImportValue::Single(None) => PropertyValue::Null,
            ImportValue::Single(Some(text)) => PropertyValue::Single(bind(text)?),
            ImportValue::Collection(items) => PropertyValue::Collection(
                items
                    .iter()
                    .map(|item| item.as_deref().map(bind).transpose())
                    .collect::<Result<Vec<_>>>()?,
            ),
            ImportValue::MlText(_) => {
                return Err(ViewError::MalformedValue(format!(
                    "Property {} holds node references and cannot be multilingual",
                    deferred.property
                )));
            }
        };
        self.repo
            .set_property(&deferred.node, &deferred.property, value)?;
        self.summary.deferred_bound = self.summary.deferred_bound.saturating_add(1);
        Ok(())
    }
}

/// Convert raw document text to a property value. Without a datatype the
/// text is kept as is and the store decides.
fn convert(value: &ImportValue, data_type: Option<DataType>) -> Result<PropertyValue> {
    let scalar = |text: &str| match data_type {
        Some(data_type) => data_type.coerce(text),
        None => Ok(Scalar::Text(text.to_string())),
    };
    Ok(match value {
        ImportValue::Single(None) => PropertyValue::Null,
        ImportValue::Single(Some(text)) => PropertyValue::Single(scalar(text)?),
        ImportValue::Collection(items) => PropertyValue::Collection(
            items
                .iter()
                .map(|item| item.as_deref().map(scalar).transpose())
                .collect::<Result<Vec<_>>>()?,
        ),
        ImportValue::MlText(locales) => PropertyValue::MlText(locales.clone()),
    })
}

// =============================================================================
// IMPORTER
// =============================================================================

impl<R: NodeService + ContentService> Importer for NodeImporter<'_, R> {
    fn root(&self) -> &NodeRef {
        &self.root
    }

    fn root_assoc_type(&self) -> Option<&QName> {
        self.root_assoc_type.as_ref()
    }

    fn resolve_node_ref(&self, node: &NodeRef) -> Result<NodeRef> {
        if let Some(created) = self.remap.get(node.id()) {
            return Ok(created.clone());
        }
        if self.repo.exists(node)? {
            return Ok(node.clone());
        }
        Err(ViewError::ReferenceResolution(format!(
            "Cannot find node {}",
            node
        )))
    }

    fn resolve_path(
        &self,
        context: &NodeRef,
        path: &str,
        namespaces: &NamespaceRegistry,
    ) -> Result<NodeRef> {
        self.select_one(context, path, namespaces)
    }

    fn describe(&self, node: &NodeRef) -> Result<(QName, Vec<QName>)> {
        Ok((
            self.repo.node_type(node)?,
            self.repo.aspects(node)?.into_iter().collect(),
        ))
    }

    fn start(&mut self) -> Result<()> {
        debug!(root = %self.root, "import started");
        Ok(())
    }

    fn import_metadata(&mut self, metadata: &ImportMetadata) -> Result<()> {
        info!(
            exported_by = metadata.exported_by.as_deref().unwrap_or(""),
            exporter_version = metadata.exporter_version.as_deref().unwrap_or(""),
            roots = metadata.export_of.len(),
            "view metadata"
        );
        let whole_store = metadata.export_of.iter().any(|path| path == "/");
        if whole_store && self.repo.root_node(self.root.store())? != self.root {
            return Err(ViewError::ScopeResolution(
                "A complete repository store may only be imported into the root of a store"
                    .to_string(),
            ));
        }
        Ok(())
    }

    fn import_node(&mut self, node: &ImportNode) -> Result<NodeRef> {
        match &node.reference {
            Some(target) => self.link_reference(node, target),
            None => self.create_node(node),
        }
    }

    fn children_imported(&mut self, node: &NodeRef) -> Result<()> {
        self.repo.children_imported(node)
    }

    fn end(&mut self, namespaces: &NamespaceRegistry) -> Result<()> {
        for deferred in std::mem::take(&mut self.deferred) {
            self.bind_deferred(&deferred, namespaces)?;
        }
        debug!(
            nodes = self.summary.nodes_created,
            deferred = self.summary.deferred_bound,
            "import finished"
        );
        Ok(())
    }

    fn error(&mut self, error: &ViewError) {
        error!(root = %self.root, "view import failed: {}", error);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::dictionary::{AssociationDef, ClassDef, ModelDictionary, PropertyDef};
    use crate::memory::MemoryRepository;
    use crate::primitives::{SYS_BASE, SYS_STORE_ROOT};
    use crate::repository::SystemPermissions;
    use crate::types::{AccessPermission, AccessStatus, StoreRef};

    fn cm(local: &str) -> QName {
        QName::new("urn:cm", local)
    }

    fn dictionary() -> ModelDictionary {
        ModelDictionary::with_system_model()
            .namespace("cm", "urn:cm")
            .class(ClassDef::node_type(cm("folder")).parent(sys_name(SYS_BASE)))
            .class(ClassDef::node_type(cm("file")).parent(sys_name(SYS_BASE)))
            .property(PropertyDef::new(cm("link"), cm("folder"), DataType::NodeRef))
            .property(PropertyDef::new(cm("count"), cm("folder"), DataType::Long))
            .association(AssociationDef::child(
                cm("contains"),
                cm("folder"),
                sys_name(SYS_BASE),
            ))
            .association(AssociationDef::child(cm("files"), cm("folder"), cm("file")))
            .association(AssociationDef::peer(
                cm("related"),
                cm("folder"),
                sys_name(SYS_BASE),
            ))
    }

    fn setup() -> (MemoryRepository, NodeRef) {
        let mut repo = MemoryRepository::new();
        let root = repo.create_store(StoreRef::new("workspace", "test"));
        (repo, root)
    }

    fn folder(parent: &NodeRef, name: &str) -> ImportNode {
        let mut node = ImportNode::new(parent.clone(), None, cm("folder"));
        node.child_name = Some(cm(name));
        node
    }

    fn text(value: &str) -> ImportValue {
        ImportValue::Single(Some(value.to_string()))
    }

    #[test]
    fn closest_child_association_is_derived() {
        let (mut repo, root) = setup();
        let dictionary = dictionary();
        let (parent, file) = {
            let mut importer = NodeImporter::new(
                &mut repo,
                &SystemPermissions,
                &dictionary,
                ImportSettings::default(),
                root.clone(),
                None,
            );
            let parent = importer.import_node(&folder(&root, "a")).unwrap();
            let file = importer
                .import_node(&ImportNode::new(parent.clone(), None, cm("file")))
                .unwrap();
            (parent, file)
        };
        let to_parent = repo.primary_parent(&parent).unwrap().unwrap();
        assert_eq!(to_parent.assoc_type, sys_name("children"));
        let to_file = repo.primary_parent(&file).unwrap().unwrap();
        assert_eq!(to_file.assoc_type, cm("files"));
        assert_eq!(to_file.name, cm("file"));
    }

    #[test]
    fn child_name_falls_back_to_name_property_then_import_id() {
        let (mut repo, root) = setup();
        let dictionary = dictionary();
        let mut importer = NodeImporter::new(
            &mut repo,
            &SystemPermissions,
            &dictionary,
            ImportSettings::default(),
            root.clone(),
            None,
        );
        let mut named = ImportNode::new(root.clone(), None, cm("folder"));
        named.properties.insert(sys_name(SYS_NAME), text("Reports"));
        named.import_id = Some("r1".to_string());
        assert_eq!(importer.child_name(&named), cm("Reports"));

        named.properties.clear();
        assert_eq!(importer.child_name(&named), cm("r1"));
        named.import_id = None;
        assert_eq!(importer.child_name(&named), cm("folder"));
    }

    #[test]
    fn uuid_binding_modes() {
        let (mut repo, root) = setup();
        let dictionary = dictionary();
        let mut node = folder(&root, "a");
        node.properties
            .insert(sys_name(SYS_NODE_UUID), text("fixed-id"));

        let bind = |repo: &mut MemoryRepository, binding: UuidBinding| {
            let mut importer = NodeImporter::new(
                repo,
                &SystemPermissions,
                &dictionary,
                ImportSettings {
                    uuid_binding: binding,
                },
                root.clone(),
                None,
            );
            importer.import_node(&node)
        };

        let fresh = bind(&mut repo, UuidBinding::CreateNew).unwrap();
        assert_ne!(fresh.id(), "fixed-id");
        let preserved = bind(&mut repo, UuidBinding::PreserveUuid).unwrap();
        assert_eq!(preserved.id(), "fixed-id");
        let fallback = bind(&mut repo, UuidBinding::PreserveUuid).unwrap();
        assert_ne!(fallback.id(), "fixed-id");
        let err = bind(&mut repo, UuidBinding::ThrowOnCollision).unwrap_err();
        assert!(matches!(err, ViewError::Store(_)));
    }

    /// A folder `holder` holding `old` (id `fixed-id`, count 1), which holds `kid`.
    fn occupied() -> (MemoryRepository, NodeRef, NodeRef, NodeRef) {
        let (mut repo, root) = setup();
        let mut place = |parent: &NodeRef, name: &str, uuid: Option<&str>| {
            repo.create_node(
                parent,
                &cm("contains"),
                &cm(name),
                NewNode {
                    node_type: cm("folder"),
                    uuid: uuid.map(str::to_string),
                    properties: BTreeMap::new(),
                },
            )
            .unwrap()
            .child
        };
        let holder = place(&root, "holder", None);
        let old = place(&holder, "old", Some("fixed-id"));
        let kid = place(&old, "kid", None);
        repo.set_property(&old, &cm("count"), PropertyValue::Single(Scalar::Long(1)))
            .unwrap();
        (repo, root, holder, kid)
    }

    fn rebind(
        repo: &mut MemoryRepository,
        root: &NodeRef,
        binding: UuidBinding,
    ) -> (NodeRef, ImportSummary) {
        let dictionary = dictionary();
        let mut node = folder(root, "a");
        node.properties
            .insert(sys_name(SYS_NODE_UUID), text("fixed-id"));
        node.properties.insert(cm("count"), text("7"));
        node.add_aspect(cm("titled"));
        let mut importer = NodeImporter::new(
            repo,
            &SystemPermissions,
            &dictionary,
            ImportSettings {
                uuid_binding: binding,
            },
            root.clone(),
            None,
        );
        let imported = importer.import_node(&node).unwrap();
        (imported, importer.into_summary())
    }

    #[test]
    fn remove_existing_recreates_at_the_import_location() {
        let (mut repo, root, holder, kid) = occupied();
        let (imported, summary) = rebind(&mut repo, &root, UuidBinding::RemoveExisting);
        assert_eq!(imported.id(), "fixed-id");
        assert_eq!(summary.nodes_created, 1);
        assert_eq!(repo.primary_parent(&imported).unwrap().unwrap().parent, root);
        assert!(repo.child_assocs(&holder).unwrap().is_empty());
        assert!(!repo.exists(&kid).unwrap());
    }

    #[test]
    fn replace_existing_recreates_in_the_old_place() {
        let (mut repo, root, holder, kid) = occupied();
        let (imported, _) = rebind(&mut repo, &root, UuidBinding::ReplaceExisting);
        assert_eq!(imported.id(), "fixed-id");
        let place = repo.primary_parent(&imported).unwrap().unwrap();
        assert_eq!(place.parent, holder);
        assert_eq!(place.assoc_type, cm("contains"));
        assert_eq!(place.name, cm("a"));
        assert!(!repo.exists(&kid).unwrap());
        assert_eq!(
            repo.properties(&imported).unwrap()[&cm("count")],
            PropertyValue::Single(Scalar::Long(7))
        );
    }

    #[test]
    fn update_existing_merges_into_the_node() {
        let (mut repo, root, holder, kid) = occupied();
        let (imported, summary) = rebind(&mut repo, &root, UuidBinding::UpdateExisting);
        assert_eq!(imported.id(), "fixed-id");
        assert_eq!(summary.nodes_created, 0);
        assert_eq!(summary.nodes_updated, 1);
        assert_eq!(repo.primary_parent(&imported).unwrap().unwrap().parent, holder);
        assert!(repo.exists(&kid).unwrap());
        assert!(repo.aspects(&imported).unwrap().contains(&cm("titled")));
        assert_eq!(
            repo.properties(&imported).unwrap()[&cm("count")],
            PropertyValue::Single(Scalar::Long(7))
        );
    }

    #[test]
    fn update_existing_creates_when_the_id_is_free() {
        let (mut repo, root) = setup();
        let (imported, summary) = rebind(&mut repo, &root, UuidBinding::UpdateExisting);
        assert_eq!(imported.id(), "fixed-id");
        assert_eq!(summary.nodes_created, 1);
        assert_eq!(summary.nodes_updated, 0);
    }

    #[test]
    fn reference_bodies_are_written_onto_the_target() {
        let (mut repo, root) = setup();
        let dictionary = dictionary();
        {
            let mut importer = NodeImporter::new(
                &mut repo,
                &SystemPermissions,
                &dictionary,
                ImportSettings::default(),
                root.clone(),
                None,
            );
            let mut top = ImportNode::new(root.clone(), None, sys_name(SYS_STORE_ROOT));
            top.reference = Some(root.clone());
            top.at_import_root = true;
            top.add_aspect(cm("titled"));
            top.properties.insert(cm("count"), text("3"));
            top.acl
                .push(AccessPermission::new("bob", "Read", AccessStatus::Allowed));
            top.inherit = false;
            assert_eq!(importer.import_node(&top).unwrap(), root);
            assert_eq!(importer.summary().references_linked, 0);
        }
        assert!(repo.aspects(&root).unwrap().contains(&cm("titled")));
        assert_eq!(
            repo.properties(&root).unwrap()[&cm("count")],
            PropertyValue::Single(Scalar::Long(3))
        );
        assert_eq!(
            repo.permissions(&root).unwrap(),
            vec![AccessPermission::new("bob", "Read", AccessStatus::Allowed)]
        );
        assert!(!repo.inherits_permissions(&root).unwrap());
    }

    #[test]
    fn reference_values_are_bound_at_the_end() {
        let (mut repo, root) = setup();
        let dictionary = dictionary();
        let (a, b, c) = {
            let mut importer = NodeImporter::new(
                &mut repo,
                &SystemPermissions,
                &dictionary,
                ImportSettings::default(),
                root.clone(),
                None,
            );
            let mut a = folder(&root, "a");
            a.properties.insert(cm("link"), text("../cm:b"));
            a.properties.insert(cm("count"), text("7"));
            let a = importer.import_node(&a).unwrap();

            let mut b = folder(&root, "b");
            b.properties
                .insert(sys_name(SYS_NODE_UUID), text("old-b"));
            let b = importer.import_node(&b).unwrap();

            let mut c = folder(&root, "c");
            c.properties
                .insert(cm("link"), text("workspace://elsewhere/old-b"));
            let c = importer.import_node(&c).unwrap();

            importer.end(dictionary.namespaces()).unwrap();
            assert_eq!(importer.summary().deferred_bound, 2);
            (a, b, c)
        };
        let a_props = repo.properties(&a).unwrap();
        assert_eq!(
            a_props[&cm("link")],
            PropertyValue::Single(Scalar::NodeRef(b.clone()))
        );
        assert_eq!(a_props[&cm("count")], PropertyValue::Single(Scalar::Long(7)));
        assert_eq!(
            repo.properties(&c).unwrap()[&cm("link")],
            PropertyValue::Single(Scalar::NodeRef(b))
        );
    }

    #[test]
    fn unresolvable_reference_values_fail() {
        let (mut repo, root) = setup();
        let dictionary = dictionary();
        let mut importer = NodeImporter::new(
            &mut repo,
            &SystemPermissions,
            &dictionary,
            ImportSettings::default(),
            root.clone(),
            None,
        );
        let mut a = folder(&root, "a");
        a.properties.insert(cm("link"), text("/cm:missing"));
        importer.import_node(&a).unwrap();
        let err = importer.end(dictionary.namespaces()).unwrap_err();
        assert!(matches!(err, ViewError::ReferenceResolution(_)));
    }

    #[test]
    fn references_link_unless_at_the_import_root() {
        let (mut repo, root) = setup();
        let dictionary = dictionary();
        let (a, b) = {
            let mut importer = NodeImporter::new(
                &mut repo,
                &SystemPermissions,
                &dictionary,
                ImportSettings::default(),
                root.clone(),
                None,
            );
            let a = importer.import_node(&folder(&root, "a")).unwrap();
            let b = importer.import_node(&folder(&root, "b")).unwrap();

            let mut top = ImportNode::new(root.clone(), None, cm("folder"));
            top.reference = Some(a.clone());
            top.at_import_root = true;
            assert_eq!(importer.import_node(&top).unwrap(), a);

            let mut peer = ImportNode::new(a.clone(), Some(cm("related")), cm("folder"));
            peer.reference = Some(b.clone());
            importer.import_node(&peer).unwrap();

            let mut secondary = ImportNode::new(a.clone(), Some(cm("contains")), cm("folder"));
            secondary.reference = Some(b.clone());
            importer.import_node(&secondary).unwrap();
            assert_eq!(importer.summary().references_linked, 2);
            (a, b)
        };
        let peers = repo.target_assocs(&a).unwrap();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].target, b);
        let secondary: Vec<_> = repo
            .child_assocs(&a)
            .unwrap()
            .into_iter()
            .filter(|assoc| !assoc.primary)
            .collect();
        assert_eq!(secondary.len(), 1);
        assert_eq!(secondary[0].name, cm("b"));
    }

    #[test]
    fn whole_store_views_need_a_store_root() {
        let (mut repo, root) = setup();
        let dictionary = dictionary();
        let target = {
            let mut importer = NodeImporter::new(
                &mut repo,
                &SystemPermissions,
                &dictionary,
                ImportSettings::default(),
                root.clone(),
                None,
            );
            importer.import_node(&folder(&root, "a")).unwrap()
        };
        let metadata = ImportMetadata {
            export_of: vec!["/".to_string()],
            ..ImportMetadata::default()
        };
        let mut importer = NodeImporter::new(
            &mut repo,
            &SystemPermissions,
            &dictionary,
            ImportSettings::default(),
            target,
            None,
        );
        assert!(matches!(
            importer.import_metadata(&metadata).unwrap_err(),
            ViewError::ScopeResolution(_)
        ));
    }
}
