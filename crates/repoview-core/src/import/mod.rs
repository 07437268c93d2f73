//! # Import
//!
//! Entry points of the import side. A [`ViewParser`] reads a view document
//! and hands every described node to an [`Importer`]; [`NodeImporter`] is the
//! importer that commits them into a repository.
//!
//! [`ViewImporter`] binds the dictionary, the acting user and the settings,
//! resolves the target [`Location`] and runs the two together.

pub mod context;
pub mod importer;
pub mod parser;

pub use context::{ImportMetadata, ImportNode, ImportValue};
pub use importer::{ImportSummary, NodeImporter};
pub use parser::ViewParser;

use crate::config::ImportSettings;
use crate::dictionary::Dictionary;
use crate::namespace::NamespaceRegistry;
use crate::package::ImportPackageHandler;
use crate::repository::{ContentService, NodeService, PermissionService};
use crate::scope::Location;
use crate::types::{NodeRef, QName, Result, ViewError};
use std::io::BufRead;
use tracing::info;

// =============================================================================
// IMPORTER TRAIT
// =============================================================================

/// Receives the nodes a parsed document describes.
///
/// Calls arrive in document order. `import_node` is called exactly once per
/// node, before any of its children; `children_imported` follows once the
/// node's element has ended.
pub trait Importer {
    /// Parent of the document's top-level nodes.
    fn root(&self) -> &NodeRef;

    /// Child association used for top-level nodes, if fixed by the caller.
    fn root_assoc_type(&self) -> Option<&QName>;

    /// Map a node identifier found in the document to a node of the target.
    fn resolve_node_ref(&self, node: &NodeRef) -> Result<NodeRef>;

    /// Evaluate a path query relative to `context`; it must match exactly one node.
    fn resolve_path(
        &self,
        context: &NodeRef,
        path: &str,
        namespaces: &NamespaceRegistry,
    ) -> Result<NodeRef>;

    /// Type and aspects of an existing node.
    fn describe(&self, node: &NodeRef) -> Result<(QName, Vec<QName>)>;

    fn start(&mut self) -> Result<()>;

    fn import_metadata(&mut self, metadata: &ImportMetadata) -> Result<()>;

    /// Create (or, for references, link) a node and return its identifier.
    fn import_node(&mut self, node: &ImportNode) -> Result<NodeRef>;

    fn children_imported(&mut self, node: &NodeRef) -> Result<()>;

    /// The document has been read completely.
    fn end(&mut self, namespaces: &NamespaceRegistry) -> Result<()>;

    /// The import is being aborted with `error`.
    fn error(&mut self, error: &ViewError);
}

// =============================================================================
// VIEW IMPORTER
// =============================================================================

/// Imports view documents into a repository.
pub struct ViewImporter<'a> {
    dictionary: &'a dyn Dictionary,
    permissions: &'a dyn PermissionService,
    settings: ImportSettings,
}

impl<'a> ViewImporter<'a> {
    #[must_use]
    pub fn new(dictionary: &'a dyn Dictionary, permissions: &'a dyn PermissionService) -> Self {
        Self {
            dictionary,
            permissions,
            settings: ImportSettings::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: ImportSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    /// Import a view document below `location`.
    ///
    /// Content pointers are resolved through `package`; without one, content
    /// properties are skipped with a warning.
    pub fn import_view<R, B>(
        &self,
        repo: &mut R,
        input: B,
        location: &Location,
        package: Option<&mut dyn ImportPackageHandler>,
    ) -> Result<ImportSummary>
    where
        R: NodeService + ContentService,
        B: BufRead,
    {
        let root = location.resolve(&*repo, self.dictionary.namespaces())?;
        info!(root = %root, "importing view");

        let mut importer = NodeImporter::new(
            repo,
            self.permissions,
            self.dictionary,
            self.settings,
            root,
            location.child_assoc_type.clone(),
        );
        if let Some(package) = package {
            importer = importer.with_package(package);
        }
        ViewParser::new(input, self.dictionary, &mut importer).parse()?;

        let summary = importer.into_summary();
        info!(
            nodes = summary.nodes_created,
            references = summary.references_linked,
            warnings = summary.warnings.len(),
            "view imported"
        );
        Ok(summary)
    }

    /// Import the document of a package together with its content payloads.
    pub fn import_package<R>(
        &self,
        repo: &mut R,
        package: &mut dyn ImportPackageHandler,
        location: &Location,
    ) -> Result<ImportSummary>
    where
        R: NodeService + ContentService,
    {
        let data = package.data_stream()?;
        self.import_view(repo, data, location, Some(package))
    }
}
