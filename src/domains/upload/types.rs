use crate::domains::wardrobe::types::ClothingItem;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub const MAX_FILES: usize = 10;
pub const MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;
pub const MIN_FILE_SIZE: u64 = 1024;
pub const ALLOWED_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/gif", "image/webp"];
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(20);

/// Coarse grouping of failed upload statuses, each with advice for the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HttpStatusClass {
    BadRequest,
    Unauthorized,
    PayloadTooLarge,
    RateLimited,
    ServerError,
    Other,
}

impl HttpStatusClass {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => HttpStatusClass::BadRequest,
            401 => HttpStatusClass::Unauthorized,
            413 => HttpStatusClass::PayloadTooLarge,
            429 => HttpStatusClass::RateLimited,
            500..=599 => HttpStatusClass::ServerError,
            _ => HttpStatusClass::Other,
        }
    }

    pub fn suggestion(&self) -> &'static str {
        match self {
            HttpStatusClass::BadRequest => "The request was rejected as malformed. Check the selected files and try again.",
            HttpStatusClass::Unauthorized => "Your session has expired. Please sign in again.",
            HttpStatusClass::PayloadTooLarge => "The files are too large. Please choose smaller images.",
            HttpStatusClass::RateLimited => "Too many requests. Please wait a moment and retry.",
            HttpStatusClass::ServerError => "The server ran into a problem. Please try again later.",
            HttpStatusClass::Other => "The upload failed. Please try again.",
        }
    }
}

/// Upload errors
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Invalid upload: {0}")]
    Validation(String),

    #[error("Network connection failed, check the connection and retry: {0}")]
    Network(String),

    #[error("Upload timed out after {}s, please retry", .0.as_secs())]
    Timeout(Duration),

    #[error("Upload cancelled")]
    Cancelled,

    #[error("Upload failed with HTTP {status}. {}", .class.suggestion())]
    HttpStatus { status: u16, class: HttpStatusClass },

    #[error("Unexpected server response: {0}")]
    Format(String),
}

impl UploadError {
    pub fn http_status(status: u16) -> Self {
        UploadError::HttpStatus { status, class: HttpStatusClass::from_status(status) }
    }
}

/// A file selected for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self { name: name.into(), mime_type: mime_type.into(), data }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadLimits {
    pub max_files: usize,
    pub max_file_size: u64,
    pub min_file_size: u64,
    pub allowed_types: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRejection {
    pub file: UploadFile,
    pub reason: String,
}

/// Input partitioned into files that may be uploaded and files that may not
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileValidation {
    pub valid: Vec<UploadFile>,
    pub invalid: Vec<FileRejection>,
}

/// Per-request options. A `None` timeout defers to the service's configured default.
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl UploadOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout: Some(timeout), cancel: None }
    }

    pub fn cancellable(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Bytes handed to the transport so far
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadProgress {
    pub sent: u64,
    pub total: u64,
}

impl UploadProgress {
    /// Completed share in `[0, 1]`
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.sent as f64 / self.total as f64).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSummary {
    pub total: u32,
    pub success: u32,
    pub failed: u32,
    pub success_rate: f64,
}

/// Per-file outcome, keyed by the original file name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    #[serde(alias = "filename", alias = "fileName")]
    pub original_name: String,
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub clothing: Option<ClothingItem>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFailure {
    #[serde(alias = "filename", alias = "fileName")]
    pub original_name: String,
    #[serde(default)]
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUploadResponse {
    pub summary: UploadSummary,
    #[serde(default)]
    pub results: Vec<UploadResult>,
    #[serde(default)]
    pub errors: Vec<UploadFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleUploadResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub clothing: Option<ClothingItem>,
}
