use crate::domains::upload::types::{UploadError, UploadFile, UploadProgress};
use async_trait::async_trait;
use log::debug;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

const CHUNK_SIZE: usize = 16 * 1024;

/// Raw outcome of a multipart POST
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// The HTTP round-trip of an upload, isolated so it can be replaced in tests
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// POST `files` under the multipart `field` to `path`, reporting bytes handed to the wire.
    async fn post_multipart(
        &self,
        path: &str,
        field: &str,
        files: Vec<UploadFile>,
        progress: UnboundedSender<UploadProgress>,
    ) -> Result<TransportResponse, UploadError>;
}

/// reqwest implementation streaming each file in chunks
pub struct HttpUploadTransport {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpUploadTransport {
    pub fn new(base_url: &str, api_token: Option<String>) -> Self {
        // Deadlines are enforced by the caller.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        }
    }

    fn file_part(
        file: UploadFile,
        sent: Arc<AtomicU64>,
        total: u64,
        progress: UnboundedSender<UploadProgress>,
    ) -> Result<Part, UploadError> {
        let length = file.size();
        let chunks: Vec<Vec<u8>> = file.data.chunks(CHUNK_SIZE).map(<[u8]>::to_vec).collect();
        let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
            let so_far = sent.fetch_add(chunk.len() as u64, Ordering::AcqRel) + chunk.len() as u64;
            let _ = progress.send(UploadProgress { sent: so_far, total });
            Ok::<_, std::io::Error>(chunk)
        }));

        Part::stream_with_length(Body::wrap_stream(stream), length)
            .file_name(file.name)
            .mime_str(&file.mime_type)
            .map_err(|e| UploadError::Validation(format!("invalid MIME type {}: {}", file.mime_type, e)))
    }
}

#[async_trait]
impl UploadTransport for HttpUploadTransport {
    async fn post_multipart(
        &self,
        path: &str,
        field: &str,
        files: Vec<UploadFile>,
        progress: UnboundedSender<UploadProgress>,
    ) -> Result<TransportResponse, UploadError> {
        let total: u64 = files.iter().map(UploadFile::size).sum();
        let sent = Arc::new(AtomicU64::new(0));

        let mut form = Form::new();
        for file in files {
            form = form.part(field.to_string(), Self::file_part(file, sent.clone(), total, progress.clone())?);
        }

        let url = format!("{}{}", self.base_url, path);
        debug!("POST {} ({} bytes)", url, total);

        let mut request = self.client.post(&url).multipart(form);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| UploadError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?
            .to_vec();

        Ok(TransportResponse { status, body })
    }
}
