//! # View Primitives
//!
//! Fixed names and defaults of the view document format.
//!
//! These are compiled in and immutable at runtime. Changing any element or
//! attribute name breaks compatibility with documents already written.

use crate::types::QName;

// =============================================================================
// NAMESPACES
// =============================================================================

/// Namespace of the view document's structural elements.
pub const VIEW_NAMESPACE_URI: &str = "http://www.repoview.org/view/repository/1.0";

/// Prefix the view namespace is always bound to.
pub const VIEW_PREFIX: &str = "view";

/// Namespace of the system model (`sys:`).
pub const SYSTEM_MODEL_URI: &str = "http://www.repoview.org/model/system/1.0";

/// Prefix of the system model.
pub const SYSTEM_PREFIX: &str = "sys";

/// Namespace of the datatype definitions (`d:`).
pub const DICTIONARY_MODEL_URI: &str = "http://www.repoview.org/model/dictionary/1.0";

/// Prefix of the datatype definitions.
pub const DICTIONARY_PREFIX: &str = "d";

// =============================================================================
// VIEW ELEMENTS & ATTRIBUTES (local names in the view namespace)
// =============================================================================

pub const VIEW_ELEMENT: &str = "view";
pub const METADATA_ELEMENT: &str = "metadata";
pub const EXPORTED_BY_ELEMENT: &str = "exportBy";
pub const EXPORTED_DATE_ELEMENT: &str = "exportDate";
pub const EXPORTER_VERSION_ELEMENT: &str = "exporterVersion";
pub const EXPORT_OF_ELEMENT: &str = "exportOf";
pub const ASPECTS_ELEMENT: &str = "aspects";
pub const PROPERTIES_ELEMENT: &str = "properties";
pub const ASSOCIATIONS_ELEMENT: &str = "associations";
pub const VALUES_ELEMENT: &str = "values";
pub const VALUE_ELEMENT: &str = "value";
pub const MLVALUE_ELEMENT: &str = "mlvalue";
pub const ACL_ELEMENT: &str = "acl";
pub const ACE_ELEMENT: &str = "ace";
pub const AUTHORITY_ELEMENT: &str = "authority";
pub const PERMISSION_ELEMENT: &str = "permission";
pub const REFERENCE_ELEMENT: &str = "reference";

pub const CHILD_NAME_ATTRIBUTE: &str = "childName";
pub const DATATYPE_ATTRIBUTE: &str = "datatype";
pub const ISNULL_ATTRIBUTE: &str = "isNull";
pub const LOCALE_ATTRIBUTE: &str = "locale";
pub const ACCESS_STATUS_ATTRIBUTE: &str = "access";
pub const INHERIT_PERMISSIONS_ATTRIBUTE: &str = "inherit";
pub const ID_ATTRIBUTE: &str = "id";
pub const IDREF_ATTRIBUTE: &str = "idref";
pub const PATHREF_ATTRIBUTE: &str = "pathref";
pub const NODEREF_ATTRIBUTE: &str = "noderef";

/// Qualified name of a view element.
#[must_use]
pub fn view_name(local: &str) -> QName {
    QName::new(VIEW_NAMESPACE_URI, local)
}

// =============================================================================
// SYSTEM MODEL
// =============================================================================

/// Base type every node type derives from.
pub const SYS_BASE: &str = "base";
/// Type of store root nodes.
pub const SYS_STORE_ROOT: &str = "store_root";
/// Child association from a store root to its top-level nodes.
pub const SYS_CHILDREN: &str = "children";
/// Aspect carried by every node that can be referenced by id.
pub const SYS_REFERENCEABLE: &str = "referenceable";
/// Property holding the node id; used for uuid binding on import.
pub const SYS_NODE_UUID: &str = "node-uuid";
/// Property holding a human readable name; fallback child name on import.
pub const SYS_NAME: &str = "name";

/// Qualified name in the system model.
#[must_use]
pub fn sys_name(local: &str) -> QName {
    QName::new(SYSTEM_MODEL_URI, local)
}

// =============================================================================
// EXPORT DEFAULTS
// =============================================================================

/// Default number of export roots per chunk.
///
/// A chunk size ≤ 0 disables chunking entirely (single chunk).
pub const DEFAULT_CHUNK_SIZE: i64 = 10;

/// Warning emitted when a content property's bytes are not exported.
pub const SKIPPED_CONTENT_WARNING: &str = "Skipped content for property";

/// Warning emitted when a value does not fit its declared datatype.
pub const CONVERSION_WARNING: &str = "could not be converted to xml string";

// =============================================================================
// IMPORT RULES
// =============================================================================

/// Legacy authority names and their current equivalents.
///
/// Applied to every imported access control entry.
pub const LEGACY_AUTHORITIES: &[(&str, &str)] = &[
    ("ROLE_ALL", "GROUP_EVERYONE"),
    ("ALL", "GROUP_EVERYONE"),
    ("ROLE_GUEST", "guest"),
];

/// Map a legacy authority name to its current equivalent.
#[must_use]
pub fn modern_authority(authority: &str) -> &str {
    LEGACY_AUTHORITIES
        .iter()
        .find(|(legacy, _)| *legacy == authority)
        .map(|(_, modern)| *modern)
        .unwrap_or(authority)
}

/// Maximum nesting depth of a view document.
///
/// Bounds the context stack against hostile or corrupted input.
pub const MAX_DOCUMENT_DEPTH: usize = 4096;
