//! # Round Trips
//!
//! Export a subtree, import the document into an empty store, and compare
//! both sides structurally.

mod common;

use common::{add, child, cm, dictionary, folder, repository, set, snapshot};
use repoview_core::{
    AccessPermission, AccessStatus, ContentService, CrawlerParameters, DirectoryPackage,
    ExportSettings, ImportSettings, Location, MemoryPackage, MemoryRepository, NodeRef,
    NodeService, PropertyValue, ReferenceType, Scalar, SystemPermissions, UuidBinding,
    ViewExporter, ViewImporter,
};
use std::collections::BTreeMap;
use std::io::Read;

/// A folder `r` holding a sub folder and two documents, with a secondary
/// child, a peer association, a node reference property, and a local ACL.
struct Fixture {
    repo: MemoryRepository,
    root: NodeRef,
    r: NodeRef,
    d1: NodeRef,
}

fn fixture() -> Fixture {
    let (mut repo, root) = repository("source");
    let r = folder(&mut repo, &root, "r");
    repo.add_aspect(&r, &cm("titled")).expect("aspect");
    let mut title = BTreeMap::new();
    title.insert("en".to_string(), Some("Reports".to_string()));
    title.insert("fr".to_string(), Some("Rapports".to_string()));
    set(&mut repo, &r, "title", PropertyValue::MlText(title));
    set(&mut repo, &r, "tags", PropertyValue::Collection(vec![
        Some(Scalar::Text("q1".to_string())),
        Some(Scalar::Text("final".to_string())),
    ]));
    set(&mut repo, &r, "rating", PropertyValue::Single(Scalar::Double(4.5)));
    repo.set_permission(&r, &AccessPermission::new("GROUP_staff", "Read", AccessStatus::Allowed))
        .expect("permission");
    repo.set_permission(&r, &AccessPermission::new("guest", "Write", AccessStatus::Denied))
        .expect("permission");
    repo.set_inherit_permissions(&r, false).expect("inherit");

    let f = folder(&mut repo, &r, "f");
    let d1 = add(&mut repo, &r, "document", "d1");
    let d2 = add(&mut repo, &r, "document", "d2");
    repo.add_aspect(&d1, &cm("versionable")).expect("aspect");
    set(&mut repo, &d1, "version", PropertyValue::Single(Scalar::Long(3)));
    set(&mut repo, &d1, "created", PropertyValue::Single(Scalar::DateTime(
        "2024-01-02T03:04:05Z".to_string(),
    )));
    set(&mut repo, &d1, "link", PropertyValue::Single(Scalar::NodeRef(d2.clone())));
    repo.add_child(&f, &d2, &cm("contains"), &cm("alias"))
        .expect("secondary child");
    repo.create_association(&d1, &d2, &cm("related"))
        .expect("peer");

    Fixture { repo, root, r, d1 }
}

fn self_params(roots: Vec<NodeRef>) -> CrawlerParameters {
    CrawlerParameters {
        crawl_self: true,
        ..CrawlerParameters::for_nodes(roots)
    }
}

fn assert_same_subtree(source: &Fixture, target: &MemoryRepository, target_root: &NodeRef) {
    let copy = child(target, target_root, "r");
    assert_eq!(
        snapshot(&source.repo, &source.root, &source.r),
        snapshot(target, target_root, &copy)
    );
}

// =============================================================================
// VIEW DOCUMENTS
// =============================================================================

#[test]
fn node_ref_view_round_trips() {
    let source = fixture();
    let (document, summary) = common::export(
        &source.repo,
        &self_params(vec![source.r.clone()]),
        ExportSettings::default(),
    );
    assert_eq!(summary.nodes, 4);
    assert_eq!(summary.references, 4);

    let (mut target, target_root) = repository("target");
    let location = Location::store_root(target_root.store().clone());
    let imported = common::import(&mut target, &document, &location, ImportSettings::default())
        .expect("import");
    assert_eq!(imported.nodes_created, 4);
    assert_eq!(imported.references_linked, 2);
    // every node carries cm:link, bound to a node or to null
    assert_eq!(imported.deferred_bound, 4);
    assert_same_subtree(&source, &target, &target_root);
}

#[test]
fn path_ref_view_round_trips() {
    let source = fixture();
    let settings = ExportSettings {
        reference_type: ReferenceType::PathRef,
        ..ExportSettings::default()
    };
    let (document, _) = common::export(&source.repo, &self_params(vec![source.r.clone()]), settings);
    assert!(document.contains("view:pathref"));
    assert!(!document.contains("view:noderef"));

    let (mut target, target_root) = repository("target");
    let location = Location::store_root(target_root.store().clone());
    common::import(&mut target, &document, &location, ImportSettings::default())
        .expect("import");
    assert_same_subtree(&source, &target, &target_root);
}

#[test]
fn whole_store_view_round_trips() {
    let source = fixture();
    let params = CrawlerParameters::for_location(Location::store_root(source.root.store().clone()));
    let (document, summary) = common::export(&source.repo, &params, ExportSettings::default());
    assert_eq!(summary.roots, 1);

    let (mut target, target_root) = repository("target");
    let location = Location::store_root(target_root.store().clone());
    common::import(&mut target, &document, &location, ImportSettings::default())
        .expect("import");
    assert_eq!(
        snapshot(&source.repo, &source.root, &source.root),
        snapshot(&target, &target_root, &target_root)
    );
}

#[test]
fn whole_store_view_with_its_root_round_trips() {
    let mut source = fixture();
    let root = source.root.clone();
    source.repo.add_aspect(&root, &cm("titled")).expect("aspect");
    set(&mut source.repo, &root, "description", PropertyValue::text("Everything"));
    source
        .repo
        .set_permission(&root, &AccessPermission::new("bob", "Read", AccessStatus::Allowed))
        .expect("permission");

    let params = CrawlerParameters {
        crawl_self: true,
        ..CrawlerParameters::for_location(Location::store_root(root.store().clone()))
    };
    let (document, _) = common::export(&source.repo, &params, ExportSettings::default());
    assert!(document.contains(r#"view:pathref="/""#));

    let (mut target, target_root) = repository("target");
    let location = Location::store_root(target_root.store().clone());
    let imported = common::import(&mut target, &document, &location, ImportSettings::default())
        .expect("import");
    assert_eq!(imported.nodes_created, 4);
    assert!(target.aspects(&target_root).expect("aspects").contains(&cm("titled")));
    assert_eq!(
        snapshot(&source.repo, &root, &root),
        snapshot(&target, &target_root, &target_root)
    );
}

#[test]
fn secondary_children_of_an_uncrawled_root_round_trip() {
    let (mut repo, root) = repository("source");
    let r = folder(&mut repo, &root, "r");
    let a = folder(&mut repo, &r, "a");
    let x = folder(&mut repo, &a, "x");
    repo.add_child(&r, &x, &cm("contains"), &cm("x-link"))
        .expect("secondary child");

    let (document, summary) = common::export(
        &repo,
        &CrawlerParameters::for_nodes(vec![r.clone()]),
        ExportSettings::default(),
    );
    assert_eq!(summary.nodes, 2);
    assert!(document.contains(r#"view:pathref=".""#));

    let (mut target, target_root) = repository("target");
    let inbox = folder(&mut target, &target_root, "inbox");
    let imported = common::import(
        &mut target,
        &document,
        &Location::node(inbox.clone()),
        ImportSettings::default(),
    )
    .expect("import");
    assert_eq!(imported.references_linked, 1);
    assert_eq!(snapshot(&repo, &r, &r), snapshot(&target, &inbox, &inbox));
}

#[test]
fn re_import_with_update_existing_keeps_one_copy() {
    let source = fixture();
    let (document, _) = common::export(
        &source.repo,
        &self_params(vec![source.r.clone()]),
        ExportSettings::default(),
    );

    let (mut target, target_root) = repository("target");
    let location = Location::store_root(target_root.store().clone());
    let preserve = ImportSettings {
        uuid_binding: UuidBinding::PreserveUuid,
    };
    common::import(&mut target, &document, &location, preserve).expect("first import");
    let nodes = target.node_count();

    let update = ImportSettings {
        uuid_binding: UuidBinding::UpdateExisting,
    };
    let again = common::import(&mut target, &document, &location, update).expect("second import");
    assert_eq!(again.nodes_created, 0);
    assert_eq!(again.nodes_updated, 4);
    assert_eq!(target.node_count(), nodes);
    assert_same_subtree(&source, &target, &target_root);
}

#[test]
fn re_import_with_replace_existing_recreates_the_subtree() {
    let source = fixture();
    let (document, _) = common::export(
        &source.repo,
        &self_params(vec![source.r.clone()]),
        ExportSettings::default(),
    );

    let (mut target, target_root) = repository("target");
    let location = Location::store_root(target_root.store().clone());
    let preserve = ImportSettings {
        uuid_binding: UuidBinding::PreserveUuid,
    };
    common::import(&mut target, &document, &location, preserve).expect("first import");
    let nodes = target.node_count();

    let replace = ImportSettings {
        uuid_binding: UuidBinding::ReplaceExisting,
    };
    let again = common::import(&mut target, &document, &location, replace).expect("second import");
    assert_eq!(again.nodes_created, 4);
    assert_eq!(target.node_count(), nodes);
    assert_same_subtree(&source, &target, &target_root);
}

#[test]
fn chunked_roots_round_trip() {
    let (mut repo, root) = repository("chunks");
    let a = folder(&mut repo, &root, "a");
    let b = folder(&mut repo, &root, "b");
    let c = folder(&mut repo, &root, "c");
    repo.create_association(&a, &c, &cm("related")).expect("peer");
    repo.create_association(&c, &b, &cm("related")).expect("peer");

    let settings = ExportSettings {
        chunk_size: 2,
        ..ExportSettings::default()
    };
    let (document, summary) = common::export(&repo, &self_params(vec![a, b, c]), settings);
    assert_eq!(summary.chunks, 2);

    let (mut target, target_root) = repository("target");
    let location = Location::store_root(target_root.store().clone());
    common::import(&mut target, &document, &location, ImportSettings::default())
        .expect("import");
    assert_eq!(snapshot(&repo, &root, &root), snapshot(&target, &target_root, &target_root));
}

#[test]
fn preserved_ids_survive_import() {
    let source = fixture();
    let (document, _) = common::export(
        &source.repo,
        &self_params(vec![source.r.clone()]),
        ExportSettings::default(),
    );

    let (mut target, target_root) = repository("target");
    let location = Location::store_root(target_root.store().clone());
    let settings = ImportSettings {
        uuid_binding: UuidBinding::PreserveUuid,
    };
    common::import(&mut target, &document, &location, settings).expect("import");
    let copy = child(&target, &target_root, "r");
    assert_eq!(copy.id(), source.r.id());
    assert_eq!(child(&target, &copy, "d1").id(), source.d1.id());
}

#[test]
fn importing_below_a_folder_reparents_the_view() {
    let source = fixture();
    let (document, _) = common::export(
        &source.repo,
        &self_params(vec![source.r.clone()]),
        ExportSettings::default(),
    );

    let (mut target, target_root) = repository("target");
    let inbox = folder(&mut target, &target_root, "inbox");
    common::import(&mut target, &document, &Location::node(inbox.clone()), ImportSettings::default())
        .expect("import");
    let copy = child(&target, &inbox, "r");
    let assoc = target
        .primary_parent(&copy)
        .expect("parent")
        .expect("primary edge");
    assert_eq!(assoc.assoc_type, cm("contains"));
    assert_eq!(
        snapshot(&source.repo, &source.r, &source.r),
        snapshot(&target, &copy, &copy)
    );
}

// =============================================================================
// PACKAGES
// =============================================================================

fn document_fixture() -> (MemoryRepository, NodeRef, NodeRef) {
    let (mut repo, root) = repository("content");
    let r = folder(&mut repo, &root, "r");
    let doc = add(&mut repo, &r, "document", "notes");
    repo.put_content(&doc, &cm("content"), "text/plain", b"quarterly numbers")
        .expect("content");
    (repo, root, r)
}

fn payload(repo: &MemoryRepository, node: &NodeRef) -> Vec<u8> {
    let mut reader = repo
        .reader(node, &cm("content"))
        .expect("reader")
        .expect("payload present");
    let mut bytes = Vec::new();
    reader.stream.read_to_end(&mut bytes).expect("read payload");
    bytes
}

#[test]
fn memory_package_carries_content() {
    let (repo, root, r) = document_fixture();
    let dictionary = dictionary();
    let exporter = ViewExporter::new(&repo, &repo, &SystemPermissions, &dictionary);
    let mut package = MemoryPackage::new();
    exporter
        .export_package(&mut package, &self_params(vec![r.clone()]), None)
        .expect("export package");
    assert_eq!(package.content_count(), 1);
    let document = String::from_utf8(package.document()).expect("utf-8");
    assert!(!document.contains("memory://"));

    let (mut target, target_root) = repository("target");
    let summary = ViewImporter::new(&dictionary, &SystemPermissions)
        .import_package(
            &mut target,
            &mut package,
            &Location::store_root(target_root.store().clone()),
        )
        .expect("import package");
    assert!(summary.warnings.is_empty());

    let copy = child(&target, &target_root, "r");
    assert_eq!(snapshot(&repo, &root, &r), snapshot(&target, &target_root, &copy));
    let notes = child(&target, &copy, "notes");
    assert_eq!(payload(&target, &notes), b"quarterly numbers");
}

#[test]
fn directory_package_carries_content() {
    let (repo, root, r) = document_fixture();
    let dictionary = dictionary();
    let dir = tempfile::tempdir().expect("temp dir");
    let mut package = DirectoryPackage::new(dir.path());
    ViewExporter::new(&repo, &repo, &SystemPermissions, &dictionary)
        .export_package(&mut package, &self_params(vec![r.clone()]), None)
        .expect("export package");

    let (mut target, target_root) = repository("target");
    let mut reopened = DirectoryPackage::new(dir.path());
    ViewImporter::new(&dictionary, &SystemPermissions)
        .import_package(
            &mut target,
            &mut reopened,
            &Location::store_root(target_root.store().clone()),
        )
        .expect("import package");

    let copy = child(&target, &target_root, "r");
    assert_eq!(snapshot(&repo, &root, &r), snapshot(&target, &target_root, &copy));
    assert_eq!(payload(&target, &child(&target, &copy, "notes")), b"quarterly numbers");
}

#[test]
fn plain_views_skip_content_with_a_warning() {
    let (repo, _, r) = document_fixture();
    let (document, _) = common::export(&repo, &self_params(vec![r]), ExportSettings::default());

    let (mut target, target_root) = repository("target");
    let summary = common::import(
        &mut target,
        &document,
        &Location::store_root(target_root.store().clone()),
        ImportSettings::default(),
    )
    .expect("import");
    assert_eq!(summary.warnings.len(), 1);
    let notes = child(&target, &child(&target, &target_root, "r"), "notes");
    assert!(target.reader(&notes, &cm("content")).expect("reader").is_none());
}
