pub mod service;
pub mod transport;
pub mod types;

pub use service::{
    upload_limits, validate_file, validate_files, BatchUploadService, ProgressStream, UploadCompletion, UploadTask,
};
pub use transport::{HttpUploadTransport, TransportResponse, UploadTransport};
pub use types::{
    BatchUploadResponse, FileValidation, HttpStatusClass, SingleUploadResponse, UploadError, UploadFile,
    UploadOptions, UploadProgress,
};
