//! # Settings
//!
//! Export and import settings, loadable from TOML.
//!
//! ```toml
//! [export]
//! chunk_size = 25
//! reference_type = "path_ref"
//!
//! [import]
//! uuid_binding = "preserve_uuid"
//! ```

use crate::primitives::DEFAULT_CHUNK_SIZE;
use crate::scope::CrawlerParameters;
use crate::types::{Result, ViewError};
use serde::{Deserialize, Serialize};

/// How references are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    /// By node identifier (`view:noderef`).
    #[default]
    NodeRef,
    /// By path relative to the export parents (`view:pathref`).
    PathRef,
}

/// Settings of the export side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportSettings {
    /// Roots per chunk; ≤ 0 disables chunking.
    pub chunk_size: i64,
    /// Walk secondary children inline instead of deferring them to references.
    pub export_secondary_nodes: bool,
    pub reference_type: ReferenceType,
    /// Overrides the actor name recorded in the metadata block.
    pub exported_by: Option<String>,
    /// Recorded in the metadata block when set.
    pub export_date: Option<String>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            export_secondary_nodes: false,
            reference_type: ReferenceType::default(),
            exported_by: None,
            export_date: None,
        }
    }
}

impl ExportSettings {
    /// The chunk size, or `None` when chunking is disabled.
    #[must_use]
    pub fn chunk_limit(&self) -> Option<usize> {
        usize::try_from(self.chunk_size).ok().filter(|n| *n > 0)
    }
}

/// What to do with the node ids recorded in a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UuidBinding {
    /// Ignore recorded ids; the store allocates new ones.
    #[default]
    CreateNew,
    /// Reuse recorded ids.
    PreserveUuid,
    /// Reuse recorded ids and fail if one is already taken.
    ThrowOnCollision,
    /// Delete the node holding a recorded id, then create the imported node
    /// at the import location.
    RemoveExisting,
    /// Delete the node holding a recorded id, then create the imported node
    /// in its place: same parent, same association type.
    ReplaceExisting,
    /// Merge aspects, properties, content and permissions into the node
    /// holding a recorded id. Nothing is removed from it.
    UpdateExisting,
}

/// Settings of the import side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportSettings {
    pub uuid_binding: UuidBinding,
}

/// Complete configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewConfig {
    pub export: ExportSettings,
    pub import: ImportSettings,
    pub crawl: CrawlerParameters,
}

impl ViewConfig {
    /// Parse a TOML document; every key is optional.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ViewError::Config(e.to_string()))
    }
}
