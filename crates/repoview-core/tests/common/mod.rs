//! # Shared Test Fixtures
//!
//! A small content model, repository builders, and a structural snapshot
//! used to compare a source subtree with its imported copy.

#![allow(dead_code)]

use repoview_core::primitives::{SYS_BASE, SYS_NODE_UUID, sys_name};
use repoview_core::{
    AccessPermission, AssociationDef, ClassDef, CrawlerParameters, DataType, ExportSettings,
    ExportSummary, ImportSettings, ImportSummary, Location, MemoryRepository, ModelDictionary,
    NewNode, NodeRef, NodeService, PropertyDef, PropertyValue, QName, Scalar, StoreRef,
    SystemPermissions, ViewExporter, ViewImporter,
};
use std::collections::{BTreeMap, BTreeSet};

pub const CM: &str = "http://www.repoview.org/model/content/1.0";

pub fn cm(local: &str) -> QName {
    QName::new(CM, local)
}

// =============================================================================
// MODEL
// =============================================================================

/// Folders and documents, a titled and a versionable aspect, one child and
/// one peer association.
pub fn dictionary() -> ModelDictionary {
    ModelDictionary::with_system_model()
        .namespace("cm", CM)
        .class(ClassDef::node_type(cm("folder")).parent(sys_name(SYS_BASE)))
        .class(ClassDef::node_type(cm("document")).parent(sys_name(SYS_BASE)))
        .class(ClassDef::aspect(cm("titled")))
        .class(ClassDef::aspect(cm("versionable")))
        .property(PropertyDef::new(cm("title"), cm("titled"), DataType::MlText))
        .property(PropertyDef::new(cm("description"), cm("titled"), DataType::Text))
        .property(PropertyDef::new(cm("version"), cm("versionable"), DataType::Long))
        .property(PropertyDef::new(cm("tags"), cm("folder"), DataType::Text).multi_valued())
        .property(PropertyDef::new(cm("rating"), cm("folder"), DataType::Double))
        .property(PropertyDef::new(cm("link"), sys_name(SYS_BASE), DataType::NodeRef))
        .property(PropertyDef::new(cm("content"), cm("document"), DataType::Content))
        .property(PropertyDef::new(cm("created"), cm("document"), DataType::DateTime))
        .association(AssociationDef::child(
            cm("contains"),
            cm("folder"),
            sys_name(SYS_BASE),
        ))
        .association(AssociationDef::peer(
            cm("related"),
            sys_name(SYS_BASE),
            sys_name(SYS_BASE),
        ))
}

// =============================================================================
// REPOSITORY BUILDERS
// =============================================================================

pub fn store(id: &str) -> StoreRef {
    StoreRef::new("workspace", id)
}

/// An empty repository with one store; returns the store root.
pub fn repository(id: &str) -> (MemoryRepository, NodeRef) {
    let mut repo = MemoryRepository::new();
    let root = repo.create_store(store(id));
    (repo, root)
}

pub fn add(repo: &mut MemoryRepository, parent: &NodeRef, node_type: &str, name: &str) -> NodeRef {
    let assoc_type = if repo.node_type(parent).expect("parent type") == cm("folder") {
        cm("contains")
    } else {
        sys_name("children")
    };
    repo.create_node(
        parent,
        &assoc_type,
        &cm(name),
        NewNode {
            node_type: cm(node_type),
            uuid: None,
            properties: BTreeMap::new(),
        },
    )
    .expect("create node")
    .child
}

pub fn folder(repo: &mut MemoryRepository, parent: &NodeRef, name: &str) -> NodeRef {
    add(repo, parent, "folder", name)
}

pub fn set(repo: &mut MemoryRepository, node: &NodeRef, property: &str, value: PropertyValue) {
    repo.set_property(node, &cm(property), value)
        .expect("set property");
}

// =============================================================================
// EXPORT / IMPORT
// =============================================================================

pub fn export(
    repo: &MemoryRepository,
    params: &CrawlerParameters,
    settings: ExportSettings,
) -> (String, ExportSummary) {
    let dictionary = dictionary();
    let exporter = ViewExporter::new(repo, repo, &SystemPermissions, &dictionary)
        .with_settings(settings);
    let mut out = Vec::new();
    let summary = exporter
        .export_view(&mut out, params, None)
        .expect("export view");
    (String::from_utf8(out).expect("utf-8 document"), summary)
}

pub fn import(
    repo: &mut MemoryRepository,
    document: &str,
    location: &Location,
    settings: ImportSettings,
) -> repoview_core::Result<ImportSummary> {
    let dictionary = dictionary();
    ViewImporter::new(&dictionary, &SystemPermissions)
        .with_settings(settings)
        .import_view(repo, document.as_bytes(), location, None)
}

// =============================================================================
// SNAPSHOTS
// =============================================================================

/// Repository-independent description of a subtree.
///
/// Node ids never appear: node references become paths below the snapshot
/// base, content descriptors lose their URL, and the synthesized node id
/// property and null values are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub node_type: QName,
    pub aspects: BTreeSet<QName>,
    pub properties: BTreeMap<QName, PropertyValue>,
    pub acl: Vec<AccessPermission>,
    pub inherit: bool,
    /// (association type, child name, child)
    pub children: Vec<(QName, QName, Snapshot)>,
    /// (association type, child name, target path)
    pub secondary: Vec<(QName, QName, String)>,
    /// (association type, target path)
    pub peers: Vec<(QName, String)>,
}

/// Local names of the primary path from `base` down to `node`.
pub fn path_below(repo: &MemoryRepository, base: &NodeRef, node: &NodeRef) -> String {
    let base_len = repo.primary_path(base).expect("base path").len();
    let chain = repo.primary_path(node).expect("node path");
    if chain.len() < base_len {
        return format!("!{}", node);
    }
    chain[base_len..]
        .iter()
        .map(|a| a.name.local_name().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn neutral(repo: &MemoryRepository, base: &NodeRef, scalar: &Scalar) -> Scalar {
    match scalar {
        Scalar::NodeRef(target) => Scalar::Text(format!("path:{}", path_below(repo, base, target))),
        Scalar::Content(data) => Scalar::Text(format!(
            "content:{}|{}|{}",
            data.mimetype, data.size, data.encoding
        )),
        other => other.clone(),
    }
}

pub fn snapshot(repo: &MemoryRepository, base: &NodeRef, node: &NodeRef) -> Snapshot {
    let mut properties = BTreeMap::new();
    for (name, value) in repo.properties(node).expect("properties") {
        if name == sys_name(SYS_NODE_UUID) {
            continue;
        }
        let value = match value {
            PropertyValue::Null => continue,
            PropertyValue::Single(scalar) => PropertyValue::Single(neutral(repo, base, &scalar)),
            PropertyValue::Collection(items) => PropertyValue::Collection(
                items
                    .iter()
                    .map(|item| item.as_ref().map(|s| neutral(repo, base, s)))
                    .collect(),
            ),
            PropertyValue::MlText(locales) => PropertyValue::MlText(locales),
        };
        properties.insert(name, value);
    }

    let mut acl: Vec<AccessPermission> = repo
        .permissions(node)
        .expect("permissions")
        .into_iter()
        .filter(|p| p.set_directly)
        .collect();
    acl.sort();

    let mut children = Vec::new();
    let mut secondary = Vec::new();
    for assoc in repo.child_assocs(node).expect("children") {
        if assoc.primary {
            children.push((
                assoc.assoc_type.clone(),
                assoc.name.clone(),
                snapshot(repo, base, &assoc.child),
            ));
        } else {
            secondary.push((
                assoc.assoc_type.clone(),
                assoc.name.clone(),
                path_below(repo, base, &assoc.child),
            ));
        }
    }
    let peers = repo
        .target_assocs(node)
        .expect("peers")
        .into_iter()
        .map(|a| (a.assoc_type.clone(), path_below(repo, base, &a.target)))
        .collect();

    Snapshot {
        node_type: repo.node_type(node).expect("type"),
        aspects: repo.aspects(node).expect("aspects"),
        properties,
        acl,
        inherit: repo.inherits_permissions(node).expect("inherit"),
        children,
        secondary,
        peers,
    }
}

/// The primary child of `parent` with the given local name.
pub fn child(repo: &MemoryRepository, parent: &NodeRef, name: &str) -> NodeRef {
    repo.child_assocs(parent)
        .expect("children")
        .into_iter()
        .find(|a| a.primary && a.name.local_name() == name)
        .map(|a| a.child)
        .expect("child exists")
}
