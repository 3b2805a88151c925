pub mod conflict;
pub mod service;
pub mod types;

pub use conflict::resolve_conflicts;
pub use service::{validate_backup_bytes, BackupService, HttpImageFetcher, ImageFetcher};
pub use types::{
    BackupError, BackupHeader, ConflictResolution, ConflictStrategy, ConflictSummary, ExportSummary,
    ImportedBackup, MergeChange,
};
