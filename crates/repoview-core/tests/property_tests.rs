//! # Property-Based Tests
//!
//! Random folder trees with properties, secondary children and peer
//! associations must survive an export/import round trip, and exporting
//! the imported copy must reproduce the original document.

mod common;

use common::{child, cm, folder, repository, set, snapshot};
use proptest::collection::vec;
use proptest::prelude::*;
use repoview_core::{
    CrawlerParameters, ExportSettings, ImportSettings, Location, MemoryRepository, NodeRef,
    NodeService, PropertyValue, ReferenceType, Scalar, UuidBinding,
};
use std::collections::BTreeMap;

/// Shape of one generated node.
#[derive(Debug, Clone)]
struct NodeShape {
    parent: usize,
    rating: Option<i32>,
    tags: Vec<String>,
    title: Option<String>,
}

fn node_shape() -> impl Strategy<Value = NodeShape> {
    (
        any::<usize>(),
        proptest::option::of(-500i32..500),
        vec("[a-z]{1,6}", 0..3),
        proptest::option::of("[A-Za-z]{1,12}"),
    )
        .prop_map(|(parent, rating, tags, title)| NodeShape {
            parent,
            rating,
            tags,
            title,
        })
}

/// Build the tree under a single top folder and return the repository, its
/// store root and the top folder.
fn build(
    shapes: &[NodeShape],
    secondary: &[(usize, usize)],
    peers: &[(usize, usize)],
) -> (MemoryRepository, NodeRef, NodeRef) {
    let (mut repo, root) = repository("source");
    let top = folder(&mut repo, &root, "top");
    let mut nodes = vec![top.clone()];
    for (i, shape) in shapes.iter().enumerate() {
        let parent = nodes[shape.parent % nodes.len()].clone();
        let node = folder(&mut repo, &parent, &format!("n{}", i));
        if let Some(rating) = shape.rating {
            set(&mut repo, &node, "rating", PropertyValue::Single(Scalar::Double(f64::from(rating))));
        }
        if !shape.tags.is_empty() {
            let tags = shape.tags.iter().map(|t| Some(Scalar::Text(t.clone()))).collect();
            set(&mut repo, &node, "tags", PropertyValue::Collection(tags));
        }
        if let Some(title) = &shape.title {
            repo.add_aspect(&node, &cm("titled")).expect("aspect");
            let mut locales = BTreeMap::new();
            locales.insert("en".to_string(), Some(title.clone()));
            set(&mut repo, &node, "title", PropertyValue::MlText(locales));
        }
        nodes.push(node);
    }

    for &(p, c) in secondary {
        let parent = &nodes[p % nodes.len()];
        let target = &nodes[c % nodes.len()];
        let primary = repo.primary_parent(target).expect("parent").map(|a| a.parent);
        if parent == target || primary.as_ref() == Some(parent) || *target == top {
            continue;
        }
        repo.add_child(parent, target, &cm("contains"), &cm(&format!("a{}", c % nodes.len())))
            .expect("secondary child");
    }
    for &(s, t) in peers {
        let source = nodes[s % nodes.len()].clone();
        let target = nodes[t % nodes.len()].clone();
        repo.create_association(&source, &target, &cm("related"))
            .expect("peer");
    }
    (repo, root, top)
}

fn params(top: &NodeRef) -> CrawlerParameters {
    CrawlerParameters {
        crawl_self: true,
        ..CrawlerParameters::for_nodes(vec![top.clone()])
    }
}

fn import_copy(document: &str, settings: ImportSettings) -> (MemoryRepository, NodeRef, NodeRef) {
    let (mut target, target_root) = repository("target");
    common::import(
        &mut target,
        document,
        &Location::store_root(target_root.store().clone()),
        settings,
    )
    .expect("import");
    let top = child(&target, &target_root, "top");
    (target, target_root, top)
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// An imported copy has the same structure as its source.
    #[test]
    fn round_trip_preserves_structure(
        shapes in vec(node_shape(), 0..12),
        secondary in vec((any::<usize>(), any::<usize>()), 0..4),
        peers in vec((any::<usize>(), any::<usize>()), 0..4),
        path_refs in any::<bool>(),
    ) {
        let (repo, root, top) = build(&shapes, &secondary, &peers);
        let settings = ExportSettings {
            reference_type: if path_refs { ReferenceType::PathRef } else { ReferenceType::NodeRef },
            chunk_size: 1,
            ..ExportSettings::default()
        };
        let (document, summary) = common::export(&repo, &params(&top), settings);
        prop_assert_eq!(summary.nodes, shapes.len() + 1);

        let (target, target_root, copy) = import_copy(&document, ImportSettings::default());
        prop_assert_eq!(snapshot(&repo, &root, &top), snapshot(&target, &target_root, &copy));
    }

    /// Exporting an id-preserving copy reproduces the source document.
    #[test]
    fn re_export_of_a_copy_is_identical(
        shapes in vec(node_shape(), 0..10),
        secondary in vec((any::<usize>(), any::<usize>()), 0..3),
        peers in vec((any::<usize>(), any::<usize>()), 0..3),
    ) {
        let (repo, _, top) = build(&shapes, &secondary, &peers);
        let settings = ExportSettings {
            reference_type: ReferenceType::PathRef,
            ..ExportSettings::default()
        };
        let (document, _) = common::export(&repo, &params(&top), settings.clone());

        let preserve = ImportSettings { uuid_binding: UuidBinding::PreserveUuid };
        let (target, _, copy) = import_copy(&document, preserve);
        prop_assert_eq!(copy.id(), top.id());
        let (again, _) = common::export(&target, &params(&copy), settings);
        prop_assert_eq!(document, again);
    }
}
