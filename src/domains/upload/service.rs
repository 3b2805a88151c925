use crate::domains::upload::transport::{TransportResponse, UploadTransport};
use crate::domains::upload::types::{
    BatchUploadResponse, FileRejection, FileValidation, SingleUploadResponse, UploadError, UploadFile,
    UploadLimits, UploadOptions, UploadProgress, ALLOWED_TYPES, DEFAULT_UPLOAD_TIMEOUT, MAX_FILES, MAX_FILE_SIZE,
    MIN_FILE_SIZE,
};
use log::{info, warn};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

pub const BATCH_UPLOAD_PATH: &str = "/api/clothes/batch-upload";
pub const SINGLE_UPLOAD_PATH: &str = "/api/clothes/upload";

/// Stream of progress events for one upload. Ends when the upload settles.
pub type ProgressStream = UnboundedReceiverStream<UploadProgress>;

/// An upload running in the background
pub struct UploadTask<T> {
    progress: ProgressStream,
    completion: UploadCompletion<T>,
}

/// Resolves to the upload's result
pub struct UploadCompletion<T> {
    handle: JoinHandle<Result<T, UploadError>>,
}

impl<T> UploadCompletion<T> {
    pub async fn wait(self) -> Result<T, UploadError> {
        self.handle
            .await
            .map_err(|e| UploadError::Network(format!("upload task failed: {}", e)))?
    }
}

impl<T> UploadTask<T> {
    /// Separate the progress stream from the completion so both can be awaited.
    pub fn split(self) -> (ProgressStream, UploadCompletion<T>) {
        (self.progress, self.completion)
    }

    /// Wait for the result, discarding progress.
    pub async fn finish(self) -> Result<T, UploadError> {
        self.completion.wait().await
    }
}

pub fn upload_limits() -> UploadLimits {
    UploadLimits {
        max_files: MAX_FILES,
        max_file_size: MAX_FILE_SIZE,
        min_file_size: MIN_FILE_SIZE,
        allowed_types: ALLOWED_TYPES.to_vec(),
    }
}

/// Check one file against the type and size limits, returning a reason on failure.
pub fn validate_file(file: &UploadFile) -> Result<(), String> {
    if !ALLOWED_TYPES.contains(&file.mime_type.to_ascii_lowercase().as_str()) {
        return Err("Unsupported file type. Please choose a JPG, PNG, GIF or WebP image.".to_string());
    }
    if file.size() > MAX_FILE_SIZE {
        let size_mb = file.size() as f64 / (1024.0 * 1024.0);
        return Err(format!("File too large ({:.1}MB). Please choose an image under 5MB.", size_mb));
    }
    if file.size() < MIN_FILE_SIZE {
        return Err("File too small. Please choose a valid image file.".to_string());
    }
    Ok(())
}

/// Partition files into uploadable and rejected. Exceeding the batch cap rejects every file.
pub fn validate_files(files: Vec<UploadFile>) -> FileValidation {
    if files.len() > MAX_FILES {
        let reason = format!("At most {} images can be selected at once.", MAX_FILES);
        return FileValidation {
            valid: Vec::new(),
            invalid: files
                .into_iter()
                .map(|file| FileRejection { file, reason: reason.clone() })
                .collect(),
        };
    }

    let mut validation = FileValidation::default();
    for file in files {
        match validate_file(&file) {
            Ok(()) => validation.valid.push(file),
            Err(reason) => validation.invalid.push(FileRejection { file, reason }),
        }
    }
    validation
}

/// Multipart image uploads with progress, cancellation and a deadline
pub struct BatchUploadService {
    transport: Arc<dyn UploadTransport>,
    default_options: UploadOptions,
}

impl BatchUploadService {
    pub fn new(transport: Arc<dyn UploadTransport>, default_options: UploadOptions) -> Self {
        Self { transport, default_options }
    }

    /// Options carrying the configured timeout
    pub fn default_options(&self) -> UploadOptions {
        self.default_options.clone()
    }

    /// Caller override, then the configured default, then the built-in 20 s
    fn effective_timeout(&self, options: &UploadOptions) -> Duration {
        options.timeout.or(self.default_options.timeout).unwrap_or(DEFAULT_UPLOAD_TIMEOUT)
    }

    /// Upload up to ten files in one request. Count violations fail before any network traffic.
    pub fn upload_batch(
        &self,
        files: Vec<UploadFile>,
        options: UploadOptions,
    ) -> Result<UploadTask<BatchUploadResponse>, UploadError> {
        if files.is_empty() {
            return Err(UploadError::Validation("no files to upload".to_string()));
        }
        if files.len() > MAX_FILES {
            return Err(UploadError::Validation(format!(
                "at most {} images can be uploaded at once",
                MAX_FILES
            )));
        }

        info!("Starting batch upload of {} files", files.len());
        Ok(self.spawn(BATCH_UPLOAD_PATH, "images", files, options, |body| {
            let value: serde_json::Value = parse_json(body)?;
            if value.get("summary").is_none() {
                return Err(UploadError::Format("response has no summary".to_string()));
            }
            serde_json::from_value::<BatchUploadResponse>(value)
                .map_err(|e| UploadError::Format(format!("unreadable batch response: {}", e)))
        }))
    }

    pub fn upload_single(
        &self,
        file: UploadFile,
        options: UploadOptions,
    ) -> UploadTask<SingleUploadResponse> {
        self.spawn(SINGLE_UPLOAD_PATH, "image", vec![file], options, parse_json::<SingleUploadResponse>)
    }

    fn spawn<T, P>(
        &self,
        path: &'static str,
        field: &'static str,
        files: Vec<UploadFile>,
        options: UploadOptions,
        parse: P,
    ) -> UploadTask<T>
    where
        T: Send + 'static,
        P: FnOnce(&[u8]) -> Result<T, UploadError> + Send + 'static,
    {
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let transport = self.transport.clone();
        let timeout = self.effective_timeout(&options);

        let handle = tokio::spawn(async move {
            let response = run_request(transport, path, field, files, timeout, options.cancel, progress_tx).await?;
            if !(200..300).contains(&response.status) {
                warn!("Upload to {} failed with HTTP {}", path, response.status);
                return Err(UploadError::http_status(response.status));
            }
            parse(&response.body)
        });

        UploadTask {
            progress: UnboundedReceiverStream::new(progress_rx),
            completion: UploadCompletion { handle },
        }
    }
}

fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, UploadError> {
    serde_json::from_slice(body).map_err(|e| UploadError::Format(format!("invalid JSON: {}", e)))
}

/// Drive the transport while forwarding its progress, until it finishes, is cancelled or times out.
/// Progress stops the moment the request is abandoned because `progress` is dropped on return.
async fn run_request(
    transport: Arc<dyn UploadTransport>,
    path: &str,
    field: &str,
    files: Vec<UploadFile>,
    timeout: Duration,
    cancel: Option<CancellationToken>,
    progress: mpsc::UnboundedSender<UploadProgress>,
) -> Result<TransportResponse, UploadError> {
    let cancel = cancel.unwrap_or_else(CancellationToken::new);
    if cancel.is_cancelled() {
        return Err(UploadError::Cancelled);
    }

    let (raw_tx, mut raw_rx) = mpsc::unbounded_channel();
    let request = transport.post_multipart(path, field, files, raw_tx);
    tokio::pin!(request);
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Upload to {} cancelled", path);
                return Err(UploadError::Cancelled);
            }
            _ = &mut deadline => {
                warn!("Upload to {} timed out after {:?}", path, timeout);
                return Err(UploadError::Timeout(timeout));
            }
            Some(event) = raw_rx.recv() => {
                let _ = progress.send(event);
            }
            result = &mut request => {
                while let Ok(event) = raw_rx.try_recv() {
                    let _ = progress.send(event);
                }
                return result;
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio_stream::StreamExt;

    fn jpeg(name: &str, size: usize) -> UploadFile {
        UploadFile::new(name, "image/jpeg", vec![0xAB; size])
    }

    fn service(transport: Arc<MockTransport>) -> BatchUploadService {
        BatchUploadService::new(transport, UploadOptions::default())
    }

    #[tokio::test]
    async fn test_three_jpegs_all_succeed() {
        let transport = Arc::new(MockTransport::all_success());
        let files = vec![jpeg("a.jpg", 2048), jpeg("b.jpg", 2048), jpeg("c.jpg", 2048)];
        assert_eq!(validate_files(files.clone()).valid.len(), 3);

        let task = service(transport.clone()).upload_batch(files, UploadOptions::default()).unwrap();
        let (progress, completion) = task.split();
        let response = completion.wait().await.unwrap();

        assert_eq!(response.summary.total, 3);
        assert_eq!(response.summary.success, 3);
        assert_eq!(response.summary.failed, 0);
        assert_eq!(response.summary.success_rate, 100.0);
        assert_eq!(response.results.len(), 3);

        let fractions: Vec<f64> = progress.map(|p| p.fraction()).collect().await;
        assert_eq!(fractions, vec![0.5, 1.0]);
    }

    #[tokio::test]
    async fn test_bad_batch_sizes_never_reach_network() {
        let transport = Arc::new(MockTransport::all_success());
        let svc = service(transport.clone());

        assert!(matches!(svc.upload_batch(vec![], UploadOptions::default()), Err(UploadError::Validation(_))));
        let eleven: Vec<UploadFile> = (0..11).map(|i| jpeg(&format!("{}.jpg", i), 2048)).collect();
        assert!(matches!(svc.upload_batch(eleven, UploadOptions::default()), Err(UploadError::Validation(_))));

        tokio::task::yield_now().await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_mid_upload_stops_progress() {
        let transport = Arc::new(MockTransport { delay: Duration::from_millis(300), ..MockTransport::all_success() });
        let token = CancellationToken::new();
        let options = UploadOptions::default().cancellable(token.clone());

        let (mut progress, completion) = service(transport).upload_batch(vec![jpeg("a.jpg", 4096)], options).unwrap().split();

        let first = progress.next().await.unwrap();
        assert_eq!(first.fraction(), 0.5);
        token.cancel();

        assert!(matches!(completion.wait().await, Err(UploadError::Cancelled)));
        assert!(progress.next().await.is_none(), "no progress after cancellation");
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let transport = Arc::new(MockTransport::all_success());
        let token = CancellationToken::new();
        token.cancel();

        let task = service(transport.clone())
            .upload_single(jpeg("a.jpg", 2048), UploadOptions::default().cancellable(token));
        assert!(matches!(task.finish().await, Err(UploadError::Cancelled)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_timeout() {
        let transport = Arc::new(MockTransport { delay: Duration::from_millis(500), ..MockTransport::all_success() });
        let task = service(transport)
            .upload_batch(vec![jpeg("a.jpg", 2048)], UploadOptions::with_timeout(Duration::from_millis(50)))
            .unwrap();
        assert!(matches!(task.finish().await, Err(UploadError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_configured_timeout_applies_without_override() {
        let transport = Arc::new(MockTransport { delay: Duration::from_millis(500), ..MockTransport::all_success() });
        let svc = BatchUploadService::new(transport, UploadOptions::with_timeout(Duration::from_millis(40)));

        let err = svc
            .upload_batch(vec![jpeg("a.jpg", 2048)], UploadOptions::default())
            .unwrap()
            .finish()
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Timeout(d) if d == Duration::from_millis(40)));

        // A caller override still wins over the configured value
        let task = svc
            .upload_batch(vec![jpeg("b.jpg", 2048)], UploadOptions::with_timeout(Duration::from_secs(5)))
            .unwrap();
        assert!(task.finish().await.is_ok());
    }

    #[tokio::test]
    async fn test_http_status_and_format_errors() {
        let transport = Arc::new(MockTransport { status: 429, ..MockTransport::ok("{}") });
        let err = service(transport)
            .upload_batch(vec![jpeg("a.jpg", 2048)], UploadOptions::default())
            .unwrap()
            .finish()
            .await
            .unwrap_err();
        match err {
            UploadError::HttpStatus { status, class } => {
                assert_eq!(status, 429);
                assert_eq!(class, crate::domains::upload::types::HttpStatusClass::RateLimited);
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let transport = Arc::new(MockTransport::ok(r#"{"results": []}"#));
        let err = service(transport)
            .upload_batch(vec![jpeg("a.jpg", 2048)], UploadOptions::default())
            .unwrap()
            .finish()
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Format(_)));
    }

    #[tokio::test]
    async fn test_upload_single_parses_clothing() {
        let transport = Arc::new(MockTransport::ok(r#"{"message":"ok","clothing":{"_id":"s1","category":"shoes"}}"#));
        let response = service(transport)
            .upload_single(jpeg("a.jpg", 2048), UploadOptions::default())
            .finish()
            .await
            .unwrap();
        assert_eq!(response.clothing.unwrap().record.category, "shoes");
    }

    #[test]
    fn test_validate_files_partitions() {
        let files = vec![
            jpeg("ok.jpg", 2048),
            UploadFile::new("doc.pdf", "application/pdf", vec![0; 2048]),
            jpeg("tiny.jpg", 10),
            jpeg("huge.jpg", (MAX_FILE_SIZE + 1) as usize),
            UploadFile::new("pic.webp", "image/webp", vec![0; 4096]),
        ];
        let result = validate_files(files);
        let valid: Vec<&str> = result.valid.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(valid, vec!["ok.jpg", "pic.webp"]);
        assert_eq!(result.invalid.len(), 3);
        assert!(result.invalid[0].reason.contains("Unsupported"));
        assert!(result.invalid[1].reason.contains("too small"));
        assert!(result.invalid[2].reason.contains("5.0MB"));

        let eleven: Vec<UploadFile> = (0..11).map(|i| jpeg(&format!("{}.jpg", i), 2048)).collect();
        let result = validate_files(eleven);
        assert!(result.valid.is_empty());
        assert_eq!(result.invalid.len(), 11);

        assert_eq!(upload_limits().max_files, 10);
    }
}
