use crate::domains::wardrobe::types::{ClothingItem, ClothingRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub const BACKUP_FORMAT_VERSION: &str = "1.0";
pub const METADATA_FILE: &str = "metadata.json";
pub const IMAGES_DIR: &str = "images";
/// Appended to the notes of an imported record that collided with an existing id
pub const IMPORTED_COPY_MARKER: &str = "[imported copy]";

/// Backup (export/import) errors
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Export failed: {0}")]
    Export(String),

    #[error("Invalid backup file: {0}")]
    Format(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Image download failed: {0}")]
    ImageFetch(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Top-level fields of `metadata.json`, without the items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupHeader {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub export_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_items: usize,
}

/// One entry of the `items` array: the record plus backup-only image references
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupItem {
    #[serde(flatten)]
    pub record: ClothingRecord,
    #[serde(default)]
    pub image_filename: Option<String>,
    #[serde(default)]
    pub original_image_url: Option<String>,
}

/// The whole `metadata.json` document
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupMetadata {
    #[serde(flatten)]
    pub header: BackupHeader,
    pub items: Vec<BackupItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub filename: String,
    pub path: PathBuf,
    pub item_count: usize,
}

/// Parsed archive contents, ready to be merged into the local store
#[derive(Debug, Clone)]
pub struct ImportedBackup {
    pub metadata: BackupHeader,
    pub items: Vec<ClothingItem>,
    /// Entries of the `items` array that were not clothing records at all
    pub skipped: usize,
}

/// Policy for imported records whose id already exists locally
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStrategy {
    Replace,
    Skip,
    #[default]
    Duplicate,
}

impl ConflictStrategy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "replace" => Some(ConflictStrategy::Replace),
            "skip" => Some(ConflictStrategy::Skip),
            "duplicate" => Some(ConflictStrategy::Duplicate),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStrategy::Replace => "replace",
            ConflictStrategy::Skip => "skip",
            ConflictStrategy::Duplicate => "duplicate",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictSummary {
    pub total: usize,
    pub added: usize,
    pub skipped: usize,
    pub replaced: usize,
}

/// A write the caller has to make for the merged view to hold
#[derive(Debug, Clone, PartialEq)]
pub enum MergeChange {
    /// New record. An empty id asks the store to assign one.
    Add(ClothingItem),
    Replace(ClothingItem),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConflictResolution {
    /// Existing items followed by the additions, with replacements applied in place
    pub items: Vec<ClothingItem>,
    pub summary: ConflictSummary,
    pub changes: Vec<MergeChange>,
}
