//! # Dictionary
//!
//! The type system a view is checked against: node types and aspects (facets)
//! arranged in single-inheritance hierarchies, the properties they declare, and
//! the child/peer associations that may leave them.
//!
//! The exporter uses it to find declared datatypes and null-valued properties;
//! the importer uses it to classify every element name it meets.

use crate::namespace::NamespaceRegistry;
use crate::primitives::{
    DICTIONARY_MODEL_URI, DICTIONARY_PREFIX, SYS_BASE, SYS_CHILDREN, SYS_NAME, SYS_NODE_UUID,
    SYS_REFERENCEABLE, SYS_STORE_ROOT, SYSTEM_MODEL_URI, SYSTEM_PREFIX, sys_name,
};
use crate::types::{DataType, QName};
use std::collections::BTreeMap;

/// Upper bound on class hierarchy depth; guards against cyclic models.
const MAX_CLASS_DEPTH: usize = 64;

// =============================================================================
// DEFINITIONS
// =============================================================================

/// Whether a class is a node type or an aspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Type,
    Aspect,
}

/// A node type or aspect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDef {
    pub name: QName,
    pub kind: ClassKind,
    pub parent: Option<QName>,
}

impl ClassDef {
    /// A node type.
    #[must_use]
    pub fn node_type(name: QName) -> Self {
        Self {
            name,
            kind: ClassKind::Type,
            parent: None,
        }
    }

    /// An aspect.
    #[must_use]
    pub fn aspect(name: QName) -> Self {
        Self {
            name,
            kind: ClassKind::Aspect,
            parent: None,
        }
    }

    /// Set the parent class.
    #[must_use]
    pub fn parent(mut self, parent: QName) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// A property declared by a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDef {
    pub name: QName,
    /// The declaring type or aspect.
    pub container: QName,
    pub data_type: DataType,
    pub multi_valued: bool,
}

impl PropertyDef {
    #[must_use]
    pub fn new(name: QName, container: QName, data_type: DataType) -> Self {
        Self {
            name,
            container,
            data_type,
            multi_valued: false,
        }
    }

    #[must_use]
    pub fn multi_valued(mut self) -> Self {
        self.multi_valued = true;
        self
    }
}

/// A child or peer association declared by a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationDef {
    pub name: QName,
    /// The declaring (source) type or aspect.
    pub source: QName,
    /// The class targets must be an instance of.
    pub target: QName,
    /// Parent/child association (true) or peer association (false).
    pub child: bool,
}

impl AssociationDef {
    /// A parent/child association.
    #[must_use]
    pub fn child(name: QName, source: QName, target: QName) -> Self {
        Self {
            name,
            source,
            target,
            child: true,
        }
    }

    /// A peer association.
    #[must_use]
    pub fn peer(name: QName, source: QName, target: QName) -> Self {
        Self {
            name,
            source,
            target,
            child: false,
        }
    }
}

// =============================================================================
// DICTIONARY TRAIT
// =============================================================================

/// Read access to a type model.
///
/// Implementors provide the four lookups plus the per-class listings;
/// inheritance-aware helpers are derived from those.
pub trait Dictionary {
    /// Namespaces the model's names live in.
    fn namespaces(&self) -> &NamespaceRegistry;

    /// Look up a type or aspect.
    fn class(&self, name: &QName) -> Option<&ClassDef>;

    /// Look up a property.
    fn property(&self, name: &QName) -> Option<&PropertyDef>;

    /// Look up an association.
    fn association(&self, name: &QName) -> Option<&AssociationDef>;

    /// Properties declared directly on a class, in name order.
    fn class_properties(&self, class: &QName) -> Vec<&PropertyDef>;

    /// Associations declared directly on a class, in name order.
    fn class_associations(&self, class: &QName) -> Vec<&AssociationDef>;

    /// Look up a node type (not an aspect).
    fn node_type(&self, name: &QName) -> Option<&ClassDef> {
        self.class(name).filter(|c| c.kind == ClassKind::Type)
    }

    /// Look up an aspect (not a node type).
    fn aspect(&self, name: &QName) -> Option<&ClassDef> {
        self.class(name).filter(|c| c.kind == ClassKind::Aspect)
    }

    /// The class followed by its ancestors, nearest first.
    fn ancestry(&self, class: &QName) -> Vec<QName> {
        let mut chain = Vec::new();
        let mut current = Some(class.clone());
        while let Some(name) = current {
            if chain.len() >= MAX_CLASS_DEPTH || chain.contains(&name) {
                break;
            }
            current = self.class(&name).and_then(|c| c.parent.clone());
            chain.push(name);
        }
        chain
    }

    /// Number of inheritance steps from `class` up to `ancestor`.
    fn class_distance(&self, class: &QName, ancestor: &QName) -> Option<usize> {
        self.ancestry(class).iter().position(|c| c == ancestor)
    }

    /// Whether `class` is `ancestor` or derives from it.
    fn is_subclass(&self, class: &QName, ancestor: &QName) -> bool {
        self.class_distance(class, ancestor).is_some()
    }

    /// Properties of a class including inherited ones.
    fn properties_of(&self, class: &QName) -> Vec<&PropertyDef> {
        self.ancestry(class)
            .iter()
            .flat_map(|c| self.class_properties(c))
            .collect()
    }

    /// Associations of a class including inherited ones.
    fn associations_of(&self, class: &QName) -> Vec<&AssociationDef> {
        self.ancestry(class)
            .iter()
            .flat_map(|c| self.class_associations(c))
            .collect()
    }

    /// Properties of the anonymous type formed by a type and its aspects.
    fn anonymous_properties(&self, node_type: &QName, aspects: &[QName]) -> Vec<&PropertyDef> {
        let mut props = self.properties_of(node_type);
        for aspect in aspects {
            props.extend(self.properties_of(aspect));
        }
        props
    }

    /// Associations of the anonymous type formed by a type and its aspects.
    fn anonymous_associations(
        &self,
        node_type: &QName,
        aspects: &[QName],
    ) -> Vec<&AssociationDef> {
        let mut assocs = self.associations_of(node_type);
        for aspect in aspects {
            assocs.extend(self.associations_of(aspect));
        }
        assocs
    }

    /// Whether an association may leave a node of the given anonymous type.
    fn is_association_legal(&self, node_type: &QName, aspects: &[QName], assoc: &QName) -> bool {
        self.anonymous_associations(node_type, aspects)
            .iter()
            .any(|a| &a.name == assoc)
    }
}

// =============================================================================
// MODEL DICTIONARY
// =============================================================================

/// In-memory dictionary assembled with a builder.
#[derive(Debug, Clone, Default)]
pub struct ModelDictionary {
    namespaces: NamespaceRegistry,
    classes: BTreeMap<QName, ClassDef>,
    properties: BTreeMap<QName, PropertyDef>,
    associations: BTreeMap<QName, AssociationDef>,
}

impl ModelDictionary {
    /// An empty model (only the view namespace is known).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A model holding the system model every repository carries:
    /// `sys:base`, `sys:store_root` with its `sys:children` association,
    /// the `sys:referenceable` aspect with `sys:node-uuid`, and `sys:name`.
    #[must_use]
    pub fn with_system_model() -> Self {
        Self::new()
            .namespace(SYSTEM_PREFIX, SYSTEM_MODEL_URI)
            .namespace(DICTIONARY_PREFIX, DICTIONARY_MODEL_URI)
            .class(ClassDef::node_type(sys_name(SYS_BASE)))
            .class(ClassDef::node_type(sys_name(SYS_STORE_ROOT)).parent(sys_name(SYS_BASE)))
            .class(ClassDef::aspect(sys_name(SYS_REFERENCEABLE)))
            .property(PropertyDef::new(
                sys_name(SYS_NAME),
                sys_name(SYS_BASE),
                DataType::Text,
            ))
            .property(PropertyDef::new(
                sys_name(SYS_NODE_UUID),
                sys_name(SYS_REFERENCEABLE),
                DataType::Text,
            ))
            .association(AssociationDef::child(
                sys_name(SYS_CHILDREN),
                sys_name(SYS_STORE_ROOT),
                sys_name(SYS_BASE),
            ))
    }

    /// Register a namespace prefix.
    #[must_use]
    pub fn namespace(mut self, prefix: &str, uri: &str) -> Self {
        self.namespaces.register(prefix, uri);
        self
    }

    /// Add a type or aspect.
    #[must_use]
    pub fn class(mut self, class: ClassDef) -> Self {
        self.classes.insert(class.name.clone(), class);
        self
    }

    /// Add a property.
    #[must_use]
    pub fn property(mut self, property: PropertyDef) -> Self {
        self.properties.insert(property.name.clone(), property);
        self
    }

    /// Add an association.
    #[must_use]
    pub fn association(mut self, association: AssociationDef) -> Self {
        self.associations
            .insert(association.name.clone(), association);
        self
    }
}

impl Dictionary for ModelDictionary {
    fn namespaces(&self) -> &NamespaceRegistry {
        &self.namespaces
    }

    fn class(&self, name: &QName) -> Option<&ClassDef> {
        self.classes.get(name)
    }

    fn property(&self, name: &QName) -> Option<&PropertyDef> {
        self.properties.get(name)
    }

    fn association(&self, name: &QName) -> Option<&AssociationDef> {
        self.associations.get(name)
    }

    fn class_properties(&self, class: &QName) -> Vec<&PropertyDef> {
        self.properties
            .values()
            .filter(|p| &p.container == class)
            .collect()
    }

    fn class_associations(&self, class: &QName) -> Vec<&AssociationDef> {
        self.associations
            .values()
            .filter(|a| &a.source == class)
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    const CM: &str = "urn:test:cm";

    fn cm(local: &str) -> QName {
        QName::new(CM, local)
    }

    fn model() -> ModelDictionary {
        ModelDictionary::with_system_model()
            .namespace("cm", CM)
            .class(ClassDef::node_type(cm("object")).parent(sys_name(SYS_BASE)))
            .class(ClassDef::node_type(cm("folder")).parent(cm("object")))
            .class(ClassDef::aspect(cm("titled")))
            .property(PropertyDef::new(cm("title"), cm("titled"), DataType::MlText))
            .property(PropertyDef::new(cm("owner"), cm("object"), DataType::Text))
            .association(AssociationDef::child(cm("contains"), cm("folder"), sys_name(SYS_BASE)))
            .association(AssociationDef::peer(cm("related"), cm("titled"), cm("object")))
    }

    #[test]
    fn system_model_is_present() {
        let d = ModelDictionary::with_system_model();
        assert!(d.node_type(&sys_name(SYS_STORE_ROOT)).is_some());
        assert!(d.aspect(&sys_name(SYS_REFERENCEABLE)).is_some());
        assert!(d.aspect(&sys_name(SYS_BASE)).is_none());
        assert_eq!(d.namespaces().prefix(SYSTEM_MODEL_URI), Some("sys"));
    }

    #[test]
    fn ancestry_and_distance() {
        let d = model();
        assert_eq!(
            d.ancestry(&cm("folder")),
            vec![cm("folder"), cm("object"), sys_name(SYS_BASE)]
        );
        assert_eq!(d.class_distance(&cm("folder"), &sys_name(SYS_BASE)), Some(2));
        assert!(d.is_subclass(&cm("folder"), &cm("object")));
        assert!(!d.is_subclass(&cm("object"), &cm("folder")));
    }

    #[test]
    fn inherited_properties_are_listed() {
        let d = model();
        let names: Vec<_> = d
            .properties_of(&cm("folder"))
            .into_iter()
            .map(|p| p.name.clone())
            .collect();
        assert!(names.contains(&cm("owner")));
        assert!(names.contains(&sys_name(SYS_NAME)));
        assert!(!names.contains(&cm("title")));

        let anon = d.anonymous_properties(&cm("folder"), &[cm("titled")]);
        assert!(anon.iter().any(|p| p.name == cm("title")));
    }

    #[test]
    fn association_legality_follows_the_anonymous_type() {
        let d = model();
        assert!(d.is_association_legal(&cm("folder"), &[], &cm("contains")));
        assert!(!d.is_association_legal(&cm("object"), &[], &cm("contains")));
        assert!(!d.is_association_legal(&cm("object"), &[], &cm("related")));
        assert!(d.is_association_legal(&cm("object"), &[cm("titled")], &cm("related")));
    }

    #[test]
    fn cyclic_models_terminate() {
        let d = ModelDictionary::new()
            .class(ClassDef::node_type(cm("a")).parent(cm("b")))
            .class(ClassDef::node_type(cm("b")).parent(cm("a")));
        assert_eq!(d.ancestry(&cm("a")).len(), 2);
    }
}
