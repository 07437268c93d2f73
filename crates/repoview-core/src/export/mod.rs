//! # Export
//!
//! Entry points of the export side. [`ViewExporter`] binds the repository
//! collaborators and settings, then drives a [`Crawler`] into one of three
//! destinations:
//!
//! - `export_events`: any [`ViewSink`]
//! - `export_view`: a view document written to a `Write`
//! - `export_package`: a document plus content payloads in a package
//!
//! A progress sink can ride along on the document exports; it is chained
//! after the document sink and sees the same events.

pub mod context;
pub mod crawler;
pub mod events;
pub mod url;
pub mod xml;

pub use context::{ExportContext, ExportRoot};
pub use crawler::{Crawler, ExportSummary};
pub use events::{
    ChainedSink, EventLog, ExportMetadata, ExportProgress, ReferenceTarget, ValueSlot, ViewEvent,
    ViewSink,
};
pub use url::ContentUrlDecorator;
pub use xml::ViewXmlWriter;

use crate::config::ExportSettings;
use crate::dictionary::Dictionary;
use crate::package::ExportPackageHandler;
use crate::repository::{ContentService, NodeService, PermissionService};
use crate::scope::CrawlerParameters;
use crate::types::Result;
use std::io::Write;
use std::sync::atomic::AtomicBool;

/// Exports views of a repository.
pub struct ViewExporter<'a> {
    nodes: &'a dyn NodeService,
    content: &'a dyn ContentService,
    permissions: &'a dyn PermissionService,
    dictionary: &'a dyn Dictionary,
    settings: ExportSettings,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> ViewExporter<'a> {
    #[must_use]
    pub fn new(
        nodes: &'a dyn NodeService,
        content: &'a dyn ContentService,
        permissions: &'a dyn PermissionService,
        dictionary: &'a dyn Dictionary,
    ) -> Self {
        Self {
            nodes,
            content,
            permissions,
            dictionary,
            settings: ExportSettings::default(),
            cancel: None,
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: ExportSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Abort the export once `flag` is set.
    #[must_use]
    pub fn with_cancellation(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    fn crawler(&self) -> Crawler<'_> {
        let crawler = Crawler::new(
            self.nodes,
            self.content,
            self.permissions,
            self.dictionary,
            &self.settings,
        );
        match self.cancel {
            Some(flag) => crawler.with_cancellation(flag),
            None => crawler,
        }
    }

    /// Export into an arbitrary sink.
    pub fn export_events(
        &self,
        params: &CrawlerParameters,
        sink: &mut dyn ViewSink,
    ) -> Result<ExportSummary> {
        self.crawler().crawl(params, sink)
    }

    /// Export a view document into `out`. Content is described but its bytes
    /// are not carried.
    pub fn export_view<W: Write>(
        &self,
        out: W,
        params: &CrawlerParameters,
        progress: Option<&mut dyn ViewSink>,
    ) -> Result<ExportSummary> {
        let mut writer = ViewXmlWriter::new(out, self.dictionary.namespaces().clone());
        let summary = match progress {
            Some(progress) => {
                let mut chain = ChainedSink::new(vec![
                    &mut writer as &mut dyn ViewSink,
                    progress as &mut dyn ViewSink,
                ]);
                self.export_events(params, &mut chain)?
            }
            None => self.export_events(params, &mut writer)?,
        };
        writer.flush()?;
        Ok(summary)
    }

    /// Export a view document and its content payloads into a package.
    pub fn export_package(
        &self,
        package: &mut dyn ExportPackageHandler,
        params: &CrawlerParameters,
        progress: Option<&mut dyn ViewSink>,
    ) -> Result<ExportSummary> {
        package.start_export()?;
        let data = package.create_data_stream()?;
        let mut writer = ViewXmlWriter::new(data, self.dictionary.namespaces().clone());
        let summary = {
            let mut decorator = ContentUrlDecorator::new(&mut writer, package);
            match progress {
                Some(progress) => {
                    let mut chain = ChainedSink::new(vec![
                        &mut decorator as &mut dyn ViewSink,
                        progress as &mut dyn ViewSink,
                    ]);
                    self.export_events(params, &mut chain)?
                }
                None => self.export_events(params, &mut decorator)?,
            }
        };
        writer.flush()?;
        drop(writer);
        package.end_export()?;
        Ok(summary)
    }
}

// =============================================================================
// DOCUMENT DIGEST (crypto-hash feature)
// =============================================================================

/// BLAKE3 digest of a view document, as lowercase hex.
///
/// Re-exporting an unchanged repository yields the same document, so the
/// digest identifies a view.
#[cfg(feature = "crypto-hash")]
#[must_use]
pub fn document_digest(document: &[u8]) -> String {
    blake3::hash(document).to_hex().to_string()
}

/// Check a view document against a digest from [`document_digest`].
#[cfg(feature = "crypto-hash")]
#[must_use]
pub fn verify_document_digest(document: &[u8], expected: &str) -> bool {
    document_digest(document) == expected
}

#[cfg(all(test, feature = "crypto-hash"))]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_and_verifiable() {
        let doc = b"<view:view/>";
        let digest = document_digest(doc);
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, document_digest(doc));
        assert!(verify_document_digest(doc, &digest));
        assert!(!verify_document_digest(b"<other/>", &digest));
    }
}
