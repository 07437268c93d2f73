//! # repoview-core
//!
//! Streaming export and import of repository subgraphs as portable view
//! documents.
//!
//! An export walks caller-chosen roots of a typed content graph and writes
//! node bodies (aspects, permissions, properties, primary children) in a
//! first pass over bounded chunks, then the secondary children and peer
//! associations of every chunk in a second pass. An import reads such a
//! document forward-only and rebuilds an equivalent graph in a target
//! repository, binding references once the nodes they point at exist.
//!
//! ## Architectural Constraints
//!
//! - The graph store, dictionary, content transport and permission checks are
//!   collaborators behind traits; [`MemoryRepository`] and [`ModelDictionary`]
//!   are the in-memory implementations
//! - One sequential traversal per run: event order is part of the document
//!   contract
//! - Deterministic: `BTreeMap` only, so re-exporting an unchanged graph yields
//!   the same bytes

// =============================================================================
// MODULES
// =============================================================================

pub mod config;
pub mod dictionary;
pub mod export;
pub mod import;
pub mod iso9075;
pub mod memory;
pub mod namespace;
pub mod package;
pub mod primitives;
pub mod repository;
pub mod scope;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    AccessPermission, AccessStatus, ChildAssoc, ContentData, DataType, MlText, NodeRef,
    PathElement, PeerAssoc, PropertyValue, QName, RepoPath, Result, Scalar, StoreRef, ViewError,
};

// =============================================================================
// RE-EXPORTS: Model and Collaborators
// =============================================================================

pub use config::{ExportSettings, ImportSettings, ReferenceType, UuidBinding, ViewConfig};
pub use dictionary::{AssociationDef, ClassDef, ClassKind, Dictionary, ModelDictionary, PropertyDef};
pub use memory::MemoryRepository;
pub use namespace::NamespaceRegistry;
pub use repository::{
    ContentReader, ContentService, NewNode, NodeService, PermissionService, SystemPermissions,
};
pub use scope::{CrawlerParameters, ExportFrom, Location};

// =============================================================================
// RE-EXPORTS: Export and Import
// =============================================================================

pub use export::{
    ChainedSink, Crawler, EventLog, ExportMetadata, ExportProgress, ExportSummary,
    ReferenceTarget, ViewEvent, ViewExporter, ViewSink, ViewXmlWriter,
};
#[cfg(feature = "crypto-hash")]
pub use export::{document_digest, verify_document_digest};
pub use import::{
    ImportMetadata, ImportNode, ImportSummary, ImportValue, Importer, NodeImporter, ViewImporter,
    ViewParser,
};
pub use package::{DirectoryPackage, ExportPackageHandler, ImportPackageHandler, MemoryPackage};
