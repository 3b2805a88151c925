use crate::domains::backup::types::{
    BackupError, BackupHeader, BackupItem, BackupMetadata, ExportSummary, ImportedBackup,
    BACKUP_FORMAT_VERSION, IMAGES_DIR, METADATA_FILE,
};
use crate::domains::wardrobe::types::{ClothingItem, ImageBlob};
use crate::validation::is_valid_record_id;
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use reqwest::Client;
use serde_json::Value;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const IMAGE_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Downloads images for records that only have a remote `image_url`
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, BackupError>;
}

/// reqwest-backed fetcher. Relative urls are resolved against `base_url`.
pub struct HttpImageFetcher {
    client: Client,
    base_url: String,
}

impl HttpImageFetcher {
    pub fn new(base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(IMAGE_FETCH_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}/{}", self.base_url, url.trim_start_matches('/'))
        }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, BackupError> {
        let response = self
            .client
            .get(self.resolve(url))
            .send()
            .await
            .map_err(|e| BackupError::ImageFetch(e.to_string()))?;
        if !response.status().is_success() {
            return Err(BackupError::ImageFetch(format!("HTTP {} for {}", response.status(), url)));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BackupError::ImageFetch(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Zip backup export/import of the catalogue
pub struct BackupService {
    fetcher: Option<Arc<dyn ImageFetcher>>,
}

/// Name used for the exported archive: `wardrobe-backup-YYYY-MM-DD.zip`
pub fn backup_filename() -> String {
    format!("wardrobe-backup-{}.zip", Utc::now().format("%Y-%m-%d"))
}

/// Archive name for an item's image. Ids unsafe as file names fall back to the item's position.
fn image_filename(item: &ClothingItem, index: usize) -> String {
    let id = item.record.id.as_str();
    if is_valid_record_id(id) {
        format!("{}.jpg", id)
    } else {
        format!("{}.jpg", index)
    }
}

impl BackupService {
    pub fn new(fetcher: Option<Arc<dyn ImageFetcher>>) -> Self {
        Self { fetcher }
    }

    async fn image_bytes(&self, item: &ClothingItem) -> Option<Vec<u8>> {
        if let Some(image) = &item.image {
            return Some(image.data.clone());
        }
        let url = item.image_url.as_deref()?;
        let fetcher = self.fetcher.as_ref()?;
        match fetcher.fetch_image(url).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Exporting {} without image: {}", item.record.id, e);
                None
            }
        }
    }

    /// Build the archive in memory.
    pub async fn export_to_bytes(&self, items: &[ClothingItem]) -> Result<Vec<u8>, BackupError> {
        let mut entries = Vec::new();
        let mut metadata_items = Vec::with_capacity(items.len());

        for (index, item) in items.iter().enumerate() {
            let image_filename = match self.image_bytes(item).await {
                Some(bytes) => {
                    let name = image_filename(item, index);
                    entries.push((format!("{}/{}", IMAGES_DIR, name), bytes));
                    Some(name)
                }
                None => None,
            };

            metadata_items.push(BackupItem {
                record: item.record.clone(),
                image_filename,
                original_image_url: item.image_url.clone(),
            });
        }

        let metadata = BackupMetadata {
            header: BackupHeader {
                version: BACKUP_FORMAT_VERSION.to_string(),
                export_date: Some(Utc::now()),
                total_items: items.len(),
            },
            items: metadata_items,
        };
        let metadata_json = serde_json::to_vec_pretty(&metadata)
            .map_err(|e| BackupError::Export(format!("metadata serialization failed: {}", e)))?;

        tokio::task::spawn_blocking(move || write_archive(metadata_json, entries))
            .await
            .map_err(|e| BackupError::Internal(format!("archive task failed: {}", e)))?
            .map_err(|e| match e {
                BackupError::Export(_) => e,
                other => BackupError::Export(other.to_string()),
            })
    }

    /// Write the archive into `output_dir`. An existing file of the same name is overwritten.
    pub async fn export_wardrobe(
        &self,
        items: &[ClothingItem],
        output_dir: &Path,
    ) -> Result<ExportSummary, BackupError> {
        let bytes = self.export_to_bytes(items).await?;
        let filename = backup_filename();
        let path = output_dir.join(&filename);

        let dir = output_dir.to_path_buf();
        let target = path.clone();
        tokio::task::spawn_blocking(move || persist_atomically(&dir, &target, &bytes))
            .await
            .map_err(|e| BackupError::Internal(format!("write task failed: {}", e)))?
            .map_err(|e| BackupError::Export(e.to_string()))?;

        info!("Exported {} items to {}", items.len(), path.display());
        Ok(ExportSummary { filename, path, item_count: items.len() })
    }

    /// Parse an archive. Items whose image is missing come back without one.
    pub async fn import_from_bytes(&self, bytes: Vec<u8>) -> Result<ImportedBackup, BackupError> {
        tokio::task::spawn_blocking(move || read_archive(bytes))
            .await
            .map_err(|e| BackupError::Internal(format!("archive task failed: {}", e)))?
    }

    pub async fn import_wardrobe(&self, path: &Path) -> Result<ImportedBackup, BackupError> {
        let bytes = tokio::fs::read(path).await?;
        self.import_from_bytes(bytes).await
    }

    /// Cheap structural check: a `.zip` whose `metadata.json` has an `items` array.
    pub async fn validate_backup_file(&self, path: &Path) -> bool {
        let is_zip = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
        if !is_zip {
            return false;
        }
        match tokio::fs::read(path).await {
            Ok(bytes) => validate_backup_bytes(&bytes),
            Err(e) => {
                debug!("Cannot read backup candidate {}: {}", path.display(), e);
                false
            }
        }
    }
}

pub fn validate_backup_bytes(bytes: &[u8]) -> bool {
    let Ok(mut archive) = ZipArchive::new(Cursor::new(bytes)) else {
        return false;
    };
    match read_metadata(&mut archive) {
        Ok(metadata) => metadata.get("items").is_some_and(Value::is_array),
        Err(_) => false,
    }
}

fn write_archive(metadata_json: Vec<u8>, images: Vec<(String, Vec<u8>)>) -> Result<Vec<u8>, BackupError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(METADATA_FILE, options)?;
    zip.write_all(&metadata_json)?;

    if !images.is_empty() {
        zip.add_directory(format!("{}/", IMAGES_DIR), options)?;
    }
    for (name, bytes) in images {
        // Images are already compressed
        zip.start_file(name, options.compression_method(CompressionMethod::Stored))?;
        zip.write_all(&bytes)?;
    }

    Ok(zip.finish()?.into_inner())
}

fn persist_atomically(dir: &Path, target: &PathBuf, bytes: &[u8]) -> Result<(), BackupError> {
    std::fs::create_dir_all(dir)?;
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(target).map_err(|e| BackupError::Io(e.error))?;
    Ok(())
}

fn read_metadata<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>) -> Result<Value, BackupError> {
    let mut file = archive
        .by_name(METADATA_FILE)
        .map_err(|_| BackupError::Format(format!("missing {}", METADATA_FILE)))?;
    let mut raw = String::new();
    file.read_to_string(&mut raw)
        .map_err(|e| BackupError::Format(format!("unreadable {}: {}", METADATA_FILE, e)))?;
    serde_json::from_str(&raw).map_err(|e| BackupError::Format(format!("malformed {}: {}", METADATA_FILE, e)))
}

fn read_image<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>, filename: &str) -> Option<Vec<u8>> {
    let mut file = archive.by_name(&format!("{}/{}", IMAGES_DIR, filename)).ok()?;
    let mut bytes = Vec::new();
    match file.read_to_end(&mut bytes) {
        Ok(_) => Some(bytes),
        Err(e) => {
            warn!("Cannot read image {}: {}", filename, e);
            None
        }
    }
}

fn read_archive(bytes: Vec<u8>) -> Result<ImportedBackup, BackupError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| BackupError::Format(format!("not a zip archive: {}", e)))?;

    let mut metadata = read_metadata(&mut archive)?;
    let raw_items = match metadata.get_mut("items").map(Value::take) {
        Some(Value::Array(items)) => items,
        _ => return Err(BackupError::Format("metadata has no items array".to_string())),
    };
    let header: BackupHeader = serde_json::from_value(metadata)
        .map_err(|e| BackupError::Format(format!("malformed metadata header: {}", e)))?;

    let mut items = Vec::with_capacity(raw_items.len());
    let mut skipped = 0;
    for (index, raw) in raw_items.into_iter().enumerate() {
        let entry: BackupItem = match serde_json::from_value(raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable backup item {}: {}", index, e);
                skipped += 1;
                continue;
            }
        };

        let image = entry
            .image_filename
            .as_deref()
            .and_then(|filename| read_image(&mut archive, filename));

        let mut item = ClothingItem::new(entry.record);
        match image {
            Some(bytes) => {
                item.record.has_local_image = true;
                item.image = Some(ImageBlob::new(item.record.id.clone(), bytes, None));
            }
            None => {
                item.record.has_local_image = false;
                item.image_url = entry.original_image_url;
            }
        }
        items.push(item);
    }

    if skipped > 0 {
        warn!("{} of {} backup items were unreadable", skipped, header.total_items);
    }
    info!("Parsed backup with {} items (version {})", items.len(), header.version);
    Ok(ImportedBackup { metadata: header, items, skipped })
}
