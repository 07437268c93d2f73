//! # Packages
//!
//! A package carries one view document plus the binary payloads its content
//! properties point at. The exporter writes the document through
//! [`ExportPackageHandler::create_data_stream`] and hands each payload to
//! [`ExportPackageHandler::export_content`], which stores it and returns the
//! descriptor to write in its place. The importer reads both back through
//! [`ImportPackageHandler`].
//!
//! Two implementations are provided: [`MemoryPackage`] for tests and
//! in-process transfers, and [`DirectoryPackage`] for a document and its
//! payloads laid out in a directory.

use crate::types::{ContentData, Result, ViewError};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

/// File name of the view document inside a package directory.
pub const DATA_FILE: &str = "export.xml";

// =============================================================================
// TRAITS
// =============================================================================

/// Destination of an export.
pub trait ExportPackageHandler {
    /// Called once before anything is written.
    fn start_export(&mut self) -> Result<()>;

    /// Stream the view document is written to.
    fn create_data_stream(&mut self) -> Result<Box<dyn Write>>;

    /// Store a payload; returns the descriptor pointing at the stored copy.
    fn export_content(&mut self, stream: &mut dyn Read, data: &ContentData) -> Result<ContentData>;

    /// Called once after the document is complete.
    fn end_export(&mut self) -> Result<()>;
}

/// Source of an import.
pub trait ImportPackageHandler {
    /// Stream the view document is read from.
    fn data_stream(&mut self) -> Result<Box<dyn BufRead>>;

    /// Open the payload a content descriptor points at.
    fn import_stream(&mut self, url: &str) -> Result<Box<dyn Read>>;
}

fn content_name(index: usize) -> String {
    format!("content{}.bin", index)
}

// =============================================================================
// MEMORY PACKAGE
// =============================================================================

/// Shared in-memory document buffer.
#[derive(Debug, Clone, Default)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A package held in memory. Export into it, then import from it.
#[derive(Debug, Clone, Default)]
pub struct MemoryPackage {
    document: SharedBuffer,
    content: BTreeMap<String, Vec<u8>>,
}

impl MemoryPackage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A package around an existing document.
    #[must_use]
    pub fn from_document(document: impl Into<Vec<u8>>) -> Self {
        Self {
            document: SharedBuffer(Rc::new(RefCell::new(document.into()))),
            content: BTreeMap::new(),
        }
    }

    /// Add a payload under `url`.
    pub fn insert_content(&mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.content.insert(url.into(), bytes.into());
    }

    /// Copy of the view document.
    #[must_use]
    pub fn document(&self) -> Vec<u8> {
        self.document.0.borrow().clone()
    }

    /// Payload stored under `url`.
    #[must_use]
    pub fn content(&self, url: &str) -> Option<&[u8]> {
        self.content.get(url).map(Vec::as_slice)
    }

    /// Number of stored payloads.
    #[must_use]
    pub fn content_count(&self) -> usize {
        self.content.len()
    }
}

impl ExportPackageHandler for MemoryPackage {
    fn start_export(&mut self) -> Result<()> {
        self.document.0.borrow_mut().clear();
        self.content.clear();
        Ok(())
    }

    fn create_data_stream(&mut self) -> Result<Box<dyn Write>> {
        Ok(Box::new(self.document.clone()))
    }

    fn export_content(&mut self, stream: &mut dyn Read, data: &ContentData) -> Result<ContentData> {
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes)?;
        let url = content_name(self.content.len());
        let mut stored = data.with_url(url.clone());
        stored.size = bytes.len() as u64;
        self.content.insert(url, bytes);
        Ok(stored)
    }

    fn end_export(&mut self) -> Result<()> {
        Ok(())
    }
}

impl ImportPackageHandler for MemoryPackage {
    fn data_stream(&mut self) -> Result<Box<dyn BufRead>> {
        Ok(Box::new(Cursor::new(self.document())))
    }

    fn import_stream(&mut self, url: &str) -> Result<Box<dyn Read>> {
        let bytes = self.content.get(url).cloned().ok_or_else(|| {
            ViewError::ReferenceResolution(format!("Content {} is not in the package", url))
        })?;
        Ok(Box::new(Cursor::new(bytes)))
    }
}

// =============================================================================
// DIRECTORY PACKAGE
// =============================================================================

/// A package laid out in a directory: `export.xml` plus one file per payload.
#[derive(Debug, Clone)]
pub struct DirectoryPackage {
    root: PathBuf,
    written: usize,
}

impl DirectoryPackage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            written: 0,
        }
    }

    /// The package directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Payload urls must stay inside the package directory.
    fn resolve(&self, url: &str) -> Result<PathBuf> {
        let relative = Path::new(url);
        let contained = !url.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !contained {
            return Err(ViewError::ReferenceResolution(format!(
                "Content {} is outside the package",
                url
            )));
        }
        Ok(self.root.join(relative))
    }
}

impl ExportPackageHandler for DirectoryPackage {
    fn start_export(&mut self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        self.written = 0;
        debug!(root = %self.root.display(), "package export started");
        Ok(())
    }

    fn create_data_stream(&mut self) -> Result<Box<dyn Write>> {
        let file = File::create(self.root.join(DATA_FILE))?;
        Ok(Box::new(BufWriter::new(file)))
    }

    fn export_content(&mut self, stream: &mut dyn Read, data: &ContentData) -> Result<ContentData> {
        let url = content_name(self.written);
        let mut file = File::create(self.root.join(&url))?;
        let size = io::copy(stream, &mut file)?;
        file.flush()?;
        self.written = self.written.saturating_add(1);
        let mut stored = data.with_url(url);
        stored.size = size;
        Ok(stored)
    }

    fn end_export(&mut self) -> Result<()> {
        debug!(payloads = self.written, "package export finished");
        Ok(())
    }
}

impl ImportPackageHandler for DirectoryPackage {
    fn data_stream(&mut self) -> Result<Box<dyn BufRead>> {
        let file = File::open(self.root.join(DATA_FILE))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn import_stream(&mut self, url: &str) -> Result<Box<dyn Read>> {
        let path = self.resolve(url)?;
        let file = File::open(&path).map_err(|e| {
            ViewError::ReferenceResolution(format!("Content {} cannot be opened: {}", url, e))
        })?;
        Ok(Box::new(BufReader::new(file)))
    }
}
