//! # Core Type Definitions
//!
//! This module contains the vocabulary shared by the exporter and the importer:
//! - Qualified names and repository identifiers (`QName`, `StoreRef`, `NodeRef`)
//! - Edges of the content graph (`ChildAssoc`, `PeerAssoc`)
//! - Access control entries (`AccessPermission`, `AccessStatus`)
//! - Property values and datatypes (see [`value`])
//! - Repository paths (see [`path`])
//! - Error types (`ViewError`)
//!
//! ## Determinism Guarantees
//!
//! Every identifier implements `Ord` so it can key a `BTreeMap`/`BTreeSet`.
//! Iteration order is therefore stable between runs, which is what makes
//! re-exporting an unchanged graph byte-identical.

pub mod path;
pub mod value;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use path::{PathElement, RepoPath};
pub use value::{ContentData, DataType, MlText, PropertyValue, Scalar};

// =============================================================================
// QUALIFIED NAMES
// =============================================================================

/// A namespace-qualified name.
///
/// Written as `{uri}local` in its canonical form and as `prefix:local`
/// once a [`crate::NamespaceRegistry`] is involved.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QName {
    namespace_uri: String,
    local_name: String,
}

impl QName {
    /// Create a qualified name from a namespace URI and a local name.
    #[must_use]
    pub fn new(namespace_uri: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace_uri: namespace_uri.into(),
            local_name: local_name.into(),
        }
    }

    /// The namespace URI.
    #[must_use]
    pub fn namespace_uri(&self) -> &str {
        &self.namespace_uri
    }

    /// The local part of the name.
    #[must_use]
    pub fn local_name(&self) -> &str {
        &self.local_name
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{}", self.namespace_uri, self.local_name)
    }
}

impl FromStr for QName {
    type Err = ViewError;

    fn from_str(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix('{')
            .ok_or_else(|| ViewError::MalformedValue(format!("QName '{}' is not in {{uri}}local form", s)))?;
        let (uri, local) = rest
            .split_once('}')
            .ok_or_else(|| ViewError::MalformedValue(format!("QName '{}' is missing '}}'", s)))?;
        if local.is_empty() {
            return Err(ViewError::MalformedValue(format!(
                "QName '{}' has an empty local name",
                s
            )));
        }
        Ok(Self::new(uri, local))
    }
}

impl TryFrom<String> for QName {
    type Error = ViewError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<QName> for String {
    fn from(q: QName) -> Self {
        q.to_string()
    }
}

// =============================================================================
// REPOSITORY IDENTIFIERS
// =============================================================================

/// Identifies one store of a repository, e.g. `workspace://SpacesStore`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoreRef {
    protocol: String,
    identifier: String,
}

impl StoreRef {
    /// Create a store reference.
    #[must_use]
    pub fn new(protocol: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            identifier: identifier.into(),
        }
    }

    /// The store protocol (`workspace`, `archive`, ...).
    #[must_use]
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// The store identifier within its protocol.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl fmt::Display for StoreRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.protocol, self.identifier)
    }
}

impl FromStr for StoreRef {
    type Err = ViewError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once("://") {
            Some((protocol, identifier)) if !protocol.is_empty() && !identifier.is_empty() => {
                Ok(Self::new(protocol, identifier))
            }
            _ => Err(ViewError::MalformedValue(format!(
                "'{}' is not a store reference",
                s
            ))),
        }
    }
}

impl TryFrom<String> for StoreRef {
    type Error = ViewError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<StoreRef> for String {
    fn from(s: StoreRef) -> Self {
        s.to_string()
    }
}

/// Identifies one node: its store plus an id unique within that store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeRef {
    store: StoreRef,
    id: String,
}

impl NodeRef {
    /// Create a node reference.
    #[must_use]
    pub fn new(store: StoreRef, id: impl Into<String>) -> Self {
        Self {
            store,
            id: id.into(),
        }
    }

    /// The store holding the node.
    #[must_use]
    pub fn store(&self) -> &StoreRef {
        &self.store
    }

    /// The node id within its store.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.store, self.id)
    }
}

impl FromStr for NodeRef {
    type Err = ViewError;

    fn from_str(s: &str) -> Result<Self> {
        let (store, id) = s
            .rsplit_once('/')
            .filter(|(store, id)| !id.is_empty() && store.contains("://"))
            .ok_or_else(|| ViewError::MalformedValue(format!("'{}' is not a node reference", s)))?;
        Ok(Self::new(store.parse()?, id))
    }
}

impl TryFrom<String> for NodeRef {
    type Error = ViewError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<NodeRef> for String {
    fn from(n: NodeRef) -> Self {
        n.to_string()
    }
}

// =============================================================================
// EDGES
// =============================================================================

/// A parent/child edge.
///
/// Exactly one primary edge leads to every node except a store root.
/// Secondary edges (`primary == false`) never define a node's location.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChildAssoc {
    /// The parent node.
    pub parent: NodeRef,
    /// The child node.
    pub child: NodeRef,
    /// The edge type (a child association definition).
    pub assoc_type: QName,
    /// The edge instance name, also the child's path segment.
    pub name: QName,
    /// Whether this is the child's primary edge.
    pub primary: bool,
}

/// A typed, directed edge between two nodes that is not a parent/child edge.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerAssoc {
    /// The source node.
    pub source: NodeRef,
    /// The target node.
    pub target: NodeRef,
    /// The association type.
    pub assoc_type: QName,
}

// =============================================================================
// ACCESS CONTROL
// =============================================================================

/// Whether an access control entry grants or denies its permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum AccessStatus {
    /// The permission is granted.
    #[default]
    Allowed,
    /// The permission is denied.
    Denied,
}

impl fmt::Display for AccessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Allowed => "ALLOWED",
            Self::Denied => "DENIED",
        })
    }
}

impl FromStr for AccessStatus {
    type Err = ViewError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ALLOWED" => Ok(Self::Allowed),
            "DENIED" => Ok(Self::Denied),
            other => Err(ViewError::MalformedValue(format!(
                "Unknown access status '{}'",
                other
            ))),
        }
    }
}

/// One access control entry of a node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccessPermission {
    /// The user or group the entry applies to.
    pub authority: String,
    /// The permission name.
    pub permission: String,
    /// Grant or deny.
    pub status: AccessStatus,
    /// False for entries inherited from an ancestor.
    pub set_directly: bool,
}

impl AccessPermission {
    /// Create a directly-set entry.
    #[must_use]
    pub fn new(
        authority: impl Into<String>,
        permission: impl Into<String>,
        status: AccessStatus,
    ) -> Self {
        Self {
            authority: authority.into(),
            permission: permission.into(),
            status,
            set_directly: true,
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ViewError>;

/// Errors that can occur while exporting or importing a view.
///
/// - No silent failures: structural and definition errors abort the run
/// - Recoverable export problems are reported as warnings, not errors
/// - The library never panics; every failure surfaces here
#[derive(Debug, Error)]
pub enum ViewError {
    /// The export scope or import location did not resolve to exactly one node,
    /// or an explicit root does not exist.
    #[error("Scope resolution failed: {0}")]
    ScopeResolution(String),

    /// A name does not resolve to a type, aspect, property or association,
    /// or an association is not legal for the node's effective type.
    #[error("Unknown definition: {0}")]
    UnknownDefinition(String),

    /// A reference element or reference value could not be resolved.
    #[error("Reference resolution failed: {0}")]
    ReferenceResolution(String),

    /// A value could not be read or converted.
    #[error("Malformed value: {0}")]
    MalformedValue(String),

    /// An element appears where the document structure does not allow it.
    #[error("Invalid view structure: {0}")]
    InvalidStructure(String),

    /// A content stream or package read/write failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The markup reader or writer failed.
    #[error("XML error: {0}")]
    Xml(String),

    /// The graph store rejected an operation.
    #[error("Store error: {0}")]
    Store(String),

    /// The caller cancelled the run.
    #[error("Operation cancelled")]
    Cancelled,

    /// Settings could not be parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An import error together with its position in the document.
    #[error("Failed to import view at line {line}, column {column}: {source}")]
    AtPosition {
        /// 1-based line of the offending element.
        line: u64,
        /// 1-based column of the offending element.
        column: u64,
        /// The underlying failure.
        source: Box<ViewError>,
    },
}

impl ViewError {
    /// The underlying error with any position wrapper removed.
    #[must_use]
    pub fn innermost(&self) -> &ViewError {
        match self {
            Self::AtPosition { source, .. } => source.innermost(),
            other => other,
        }
    }

    pub(crate) fn xml(err: impl fmt::Display) -> Self {
        Self::Xml(err.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================
