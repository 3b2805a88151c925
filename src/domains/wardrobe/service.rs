use crate::domains::backup::conflict::resolve_conflicts;
use crate::domains::backup::service::BackupService;
use crate::domains::backup::types::{BackupHeader, ConflictStrategy, ConflictSummary, ExportSummary, MergeChange};
use crate::domains::outfit::repository::OutfitRepository;
use crate::domains::outfit::types::SavedOutfit;
use crate::domains::settings::repository::SettingsRepository;
use crate::domains::settings::types::{UpdatePreferences, UserPreferences};
use crate::domains::sync::queue::SyncQueueManager;
use crate::domains::sync::remote::RemoteApi;
use crate::domains::sync::types::{BatchWear, OutfitDraft, OutfitFeedback, ProfileUpdate, SyncOperation};
use crate::domains::upload::service::BatchUploadService;
use crate::domains::upload::types::{BatchUploadResponse, UploadFile, UploadOptions};
use crate::domains::wardrobe::repository::ClothingRepository;
use crate::domains::wardrobe::types::{
    ClothingItem, ClothingQuery, ClothingRecord, ImageBlob, IndexFilter, NewClothing, UpdateClothing,
    WardrobeStatistics,
};
use crate::errors::{DomainError, ServiceResult};
use crate::validation::Validate;
use chrono::Utc;
use log::{debug, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Where a catalogue listing was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CatalogSource {
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogListing {
    pub items: Vec<ClothingItem>,
    /// `None` when every source failed or was empty
    pub source: Option<CatalogSource>,
}

/// What happened to the remote half of a mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RemoteOutcome {
    Synced,
    Queued,
}

/// Result of a local write plus its remote replay
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation<T> {
    pub value: T,
    pub remote: RemoteOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome {
    pub metadata: BackupHeader,
    pub summary: ConflictSummary,
    /// Changes written to the local store
    pub persisted: usize,
    /// Changes the local store rejected
    pub failed: usize,
    /// Archive entries that could not be read as clothing records
    pub unreadable: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub response: BatchUploadResponse,
    /// Ids of the uploaded records now stored locally
    pub stored: Vec<String>,
}

/// Application-facing wardrobe operations.
///
/// Reads walk `fallback_order` until a source yields items. Mutations hit the local
/// store first, then the remote API; if the remote call is skipped or fails the
/// mutation is queued for replay.
pub struct WardrobeService {
    store: Arc<dyn ClothingRepository>,
    settings: Arc<dyn SettingsRepository>,
    outfits: Arc<dyn OutfitRepository>,
    remote: Arc<dyn RemoteApi>,
    sync: SyncQueueManager,
    backup: Arc<BackupService>,
    uploads: Arc<BatchUploadService>,
    fallback_order: Vec<CatalogSource>,
    export_dir: PathBuf,
    offline_mode: AtomicBool,
}

impl WardrobeService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn ClothingRepository>,
        settings: Arc<dyn SettingsRepository>,
        outfits: Arc<dyn OutfitRepository>,
        remote: Arc<dyn RemoteApi>,
        sync: SyncQueueManager,
        backup: Arc<BackupService>,
        uploads: Arc<BatchUploadService>,
        offline_mode: bool,
    ) -> Self {
        Self {
            store,
            settings,
            outfits,
            remote,
            sync,
            backup,
            uploads,
            fallback_order: vec![CatalogSource::Local, CatalogSource::Remote],
            export_dir: std::env::temp_dir(),
            offline_mode: AtomicBool::new(offline_mode),
        }
    }

    pub fn with_fallback_order(mut self, order: Vec<CatalogSource>) -> Self {
        self.fallback_order = order;
        self
    }

    /// Directory backups are written to when the caller names none
    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = dir.into();
        self
    }

    pub fn fallback_order(&self) -> &[CatalogSource] {
        &self.fallback_order
    }

    pub fn sync(&self) -> &SyncQueueManager {
        &self.sync
    }

    pub fn uploads(&self) -> &BatchUploadService {
        &self.uploads
    }

    /// Offline when the user asked for it or connectivity is down
    pub fn is_offline(&self) -> bool {
        self.offline_mode.load(Ordering::Acquire) || !self.sync.is_online()
    }

    pub async fn set_offline_mode(&self, offline: bool) -> ServiceResult<UserPreferences> {
        let preferences = self
            .settings
            .update_preferences(&UpdatePreferences { offline_mode: Some(offline), ..Default::default() })
            .await?;
        self.offline_mode.store(offline, Ordering::Release);
        info!("Offline mode {}", if offline { "enabled" } else { "disabled" });

        if offline {
            self.sync.set_online(false).await;
        } else if self.remote.health_check().await {
            self.sync.set_online(true).await;
        } else {
            warn!("API unreachable, pending operations stay queued");
            self.sync.set_online(false).await;
        }
        Ok(preferences)
    }

    pub async fn list_clothes(&self, query: &ClothingQuery) -> CatalogListing {
        for source in &self.fallback_order {
            let items = match source {
                CatalogSource::Local => match self.store.get_all_clothes(query).await {
                    Ok(items) => items,
                    Err(e) => {
                        warn!("Local store unavailable, trying next source: {}", e);
                        continue;
                    }
                },
                CatalogSource::Remote => {
                    if self.is_offline() {
                        debug!("Offline, skipping remote catalogue");
                        continue;
                    }
                    match self.remote.list_clothes().await {
                        Ok(items) => apply_query(items, query),
                        Err(e) => {
                            warn!("Remote catalogue unavailable, trying next source: {}", e);
                            continue;
                        }
                    }
                }
            };

            if !items.is_empty() {
                return CatalogListing { items, source: Some(*source) };
            }
        }

        CatalogListing { items: Vec::new(), source: None }
    }

    pub async fn get_clothing(&self, id: &str) -> ServiceResult<Option<ClothingItem>> {
        Ok(self.store.get_clothing(id).await?)
    }

    pub async fn search_clothes(&self, query: &str) -> ServiceResult<Vec<ClothingItem>> {
        Ok(self.store.search_clothes(query).await?)
    }

    pub async fn get_statistics(&self) -> ServiceResult<WardrobeStatistics> {
        Ok(self.store.get_statistics().await?)
    }

    async fn replay_or_queue(&self, operation: SyncOperation) -> ServiceResult<RemoteOutcome> {
        if !self.is_offline() {
            match self.remote.dispatch(&operation).await {
                Ok(()) => return Ok(RemoteOutcome::Synced),
                Err(e) => warn!("Remote {} failed, queueing: {}", operation.kind().as_str(), e),
            }
        }
        self.sync.add_to_sync_queue(operation).await?;
        Ok(RemoteOutcome::Queued)
    }

    pub async fn add_clothing(
        &self,
        new_clothing: NewClothing,
        image: Option<ImageBlob>,
    ) -> ServiceResult<Mutation<String>> {
        let id = self.store.add_clothing(new_clothing.clone(), image).await?;
        let remote = self
            .replay_or_queue(SyncOperation::CreateClothing(NewClothing { id: Some(id.clone()), ..new_clothing }))
            .await?;
        Ok(Mutation { value: id, remote })
    }

    pub async fn update_clothing(
        &self,
        id: &str,
        changes: UpdateClothing,
        image: Option<ImageBlob>,
    ) -> ServiceResult<Mutation<ClothingRecord>> {
        let record = self.store.update_clothing(id, &changes, image).await?;
        let remote = self
            .replay_or_queue(SyncOperation::UpdateClothing { id: id.to_string(), changes })
            .await?;
        Ok(Mutation { value: record, remote })
    }

    pub async fn delete_clothing(&self, id: &str) -> ServiceResult<Mutation<()>> {
        self.store.delete_clothing(id).await?;
        let remote = self.replay_or_queue(SyncOperation::DeleteClothing { id: id.to_string() }).await?;
        Ok(Mutation { value: (), remote })
    }

    pub async fn record_wear(&self, id: &str) -> ServiceResult<Mutation<ClothingRecord>> {
        let record = self.store.record_wear(id, Utc::now()).await?;
        let remote = self.replay_or_queue(SyncOperation::RecordWear { id: id.to_string() }).await?;
        Ok(Mutation { value: record, remote })
    }

    /// Record wear for several items. Ids unknown locally are still sent to the server.
    pub async fn batch_record_wear(&self, ids: Vec<String>) -> ServiceResult<Mutation<Vec<ClothingRecord>>> {
        let worn_at = Utc::now();
        let mut records = Vec::with_capacity(ids.len());
        for id in &ids {
            match self.store.record_wear(id, worn_at).await {
                Ok(record) => records.push(record),
                Err(DomainError::EntityNotFound(_, missing)) => debug!("No local record {} to mark worn", missing),
                Err(e) => return Err(e.into()),
            }
        }

        let remote = self
            .replay_or_queue(SyncOperation::BatchRecordWear(BatchWear { clothing_ids: ids, worn_at: Some(worn_at) }))
            .await?;
        Ok(Mutation { value: records, remote })
    }

    /// Keep the outfit on this device, then send it to the server or queue it.
    pub async fn save_outfit(&self, outfit: OutfitDraft) -> ServiceResult<Mutation<SavedOutfit>> {
        let saved = self.outfits.add_outfit(&outfit).await?;
        let remote = self.replay_or_queue(SyncOperation::SaveOutfit(outfit)).await?;
        Ok(Mutation { value: saved, remote })
    }

    pub async fn get_outfits(&self) -> ServiceResult<Vec<SavedOutfit>> {
        Ok(self.outfits.get_outfits().await?)
    }

    pub async fn delete_outfit(&self, id: &str) -> ServiceResult<()> {
        Ok(self.outfits.delete_outfit(id).await?)
    }

    pub async fn submit_outfit_feedback(&self, feedback: OutfitFeedback) -> ServiceResult<RemoteOutcome> {
        feedback.validate()?;
        self.replay_or_queue(SyncOperation::OutfitFeedback(feedback)).await
    }

    pub async fn update_profile(&self, profile: ProfileUpdate) -> ServiceResult<RemoteOutcome> {
        self.replay_or_queue(SyncOperation::UpdateProfile(profile)).await
    }

    /// Upload a batch, then keep every recognised item locally with the uploaded bytes as its image.
    pub async fn upload_and_store(
        &self,
        files: Vec<UploadFile>,
        options: UploadOptions,
    ) -> ServiceResult<UploadOutcome> {
        let originals = files.clone();
        let response = self.uploads.upload_batch(files, options)?.finish().await?;

        let mut stored = Vec::new();
        for result in response.results.iter().filter(|result| result.success) {
            let Some(item) = &result.clothing else {
                continue;
            };
            let image = originals
                .iter()
                .find(|file| file.name == result.original_name)
                .map(|file| ImageBlob::new(item.record.id.clone(), file.data.clone(), Some(&file.mime_type)));

            let saved = if item.record.has_id() {
                self.store
                    .replace_clothing(item.record.clone(), image)
                    .await
                    .map(|_| item.record.id.clone())
            } else {
                self.store.add_clothing(NewClothing::from(item.record.clone()), image).await
            };

            match saved {
                Ok(id) => stored.push(id),
                Err(e) => warn!("Uploaded {} but could not store it locally: {}", result.original_name, e),
            }
        }

        info!("Stored {} of {} uploaded items", stored.len(), response.results.len());
        Ok(UploadOutcome { response, stored })
    }

    async fn all_local(&self, include_images: bool) -> ServiceResult<Vec<ClothingItem>> {
        let query = ClothingQuery { limit: u32::MAX, include_images, ..Default::default() };
        Ok(self.store.get_all_clothes(&query).await?)
    }

    /// Write a backup archive to `output_dir`, or to the configured export directory.
    pub async fn export_backup(&self, output_dir: Option<&Path>) -> ServiceResult<ExportSummary> {
        let items = self.all_local(true).await?;
        let dir = output_dir.unwrap_or(&self.export_dir);
        Ok(self.backup.export_wardrobe(&items, dir).await?)
    }

    /// Import an archive and merge it into the local store under `strategy`.
    pub async fn import_backup(&self, path: &Path, strategy: ConflictStrategy) -> ServiceResult<ImportOutcome> {
        let imported = self.backup.import_wardrobe(path).await?;
        let existing = self.all_local(false).await?;
        let resolution = resolve_conflicts(&existing, &imported.items, strategy);

        let mut persisted = 0;
        let mut failed = 0;
        for change in resolution.changes {
            let result = match change {
                // Archived records keep their id and fields as exported, even when sparse
                MergeChange::Add(item) if item.record.has_id() => {
                    self.store.replace_clothing(item.record, item.image).await
                }
                MergeChange::Add(item) => self
                    .store
                    .add_clothing(NewClothing::from(item.record), item.image)
                    .await
                    .map(|_| ()),
                MergeChange::Replace(item) => self.store.replace_clothing(item.record, item.image).await,
            };
            match result {
                Ok(()) => persisted += 1,
                Err(e) => {
                    failed += 1;
                    warn!("Skipping imported item: {}", e);
                }
            }
        }

        info!(
            "Import ({}) finished: {} added, {} replaced, {} skipped, {} failed, {} unreadable",
            strategy.as_str(),
            resolution.summary.added,
            resolution.summary.replaced,
            resolution.summary.skipped,
            failed,
            imported.skipped
        );
        Ok(ImportOutcome {
            metadata: imported.metadata,
            summary: resolution.summary,
            persisted,
            failed,
            unreadable: imported.skipped,
        })
    }

    pub async fn clear_local_data(&self) -> ServiceResult<()> {
        Ok(self.store.clear_all().await?)
    }
}

/// Apply the listing filter and page window to items that were not served from an index.
fn apply_query(items: Vec<ClothingItem>, query: &ClothingQuery) -> Vec<ClothingItem> {
    let filter = query.index_filter();
    items
        .into_iter()
        .filter(|item| match &filter {
            IndexFilter::All => true,
            IndexFilter::Category(category) => item.record.category == *category,
            IndexFilter::Style(style) => item.record.style.as_deref() == Some(*style),
            IndexFilter::Favorite(favorite) => item.record.favorite == *favorite,
        })
        .skip(query.offset as usize)
        .take(query.limit as usize)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{self, LocalDatabase};
    use crate::domains::outfit::repository::SqliteOutfitRepository;
    use crate::domains::settings::repository::SqliteSettingsRepository;
    use crate::domains::sync::remote::mock::MockRemoteApi;
    use crate::domains::upload::service::mock::MockTransport;
    use crate::domains::wardrobe::repository::SqliteClothingRepository;

    struct Fixture {
        service: WardrobeService,
        remote: Arc<MockRemoteApi>,
    }

    async fn fixture(remote: MockRemoteApi, online: bool, offline_mode: bool) -> Fixture {
        let pool = database::connect("sqlite::memory:").await.unwrap();
        let db = Arc::new(LocalDatabase::from_pool(pool));
        let store = Arc::new(SqliteClothingRepository::new(db.clone()));
        let settings = Arc::new(SqliteSettingsRepository::new(db.clone()));
        let outfits = Arc::new(SqliteOutfitRepository::new(db));
        let remote = Arc::new(remote);
        let sync = SyncQueueManager::new(remote.clone(), settings.clone(), 3, online);
        let uploads = BatchUploadService::new(Arc::new(MockTransport::all_success()), UploadOptions::default());

        let service = WardrobeService::new(
            store,
            settings,
            outfits,
            remote.clone(),
            sync,
            Arc::new(BackupService::new(None)),
            Arc::new(uploads),
            offline_mode,
        );
        Fixture { service, remote }
    }

    fn remote_item(id: &str, category: &str) -> ClothingItem {
        ClothingItem::new(NewClothing::new(category).into_record(id.to_string(), Utc::now(), false))
    }

    #[tokio::test]
    async fn test_listing_prefers_local_then_remote_then_empty() {
        let fx = fixture(MockRemoteApi::default(), true, false).await;
        fx.remote.listing.lock().unwrap().extend([remote_item("r1", "tops"), remote_item("r2", "shoes")]);

        let listing = fx.service.list_clothes(&ClothingQuery::default()).await;
        assert_eq!(listing.source, Some(CatalogSource::Remote));
        assert_eq!(listing.items.len(), 2);

        let filtered = fx
            .service
            .list_clothes(&ClothingQuery { category: Some("shoes".into()), ..Default::default() })
            .await;
        assert_eq!(filtered.items.len(), 1);

        fx.service.add_clothing(NewClothing::new("coats"), None).await.unwrap();
        let listing = fx.service.list_clothes(&ClothingQuery::default()).await;
        assert_eq!(listing.source, Some(CatalogSource::Local));
        assert_eq!(listing.items.len(), 1);
    }

    #[tokio::test]
    async fn test_listing_empty_when_all_sources_fail() {
        let fx = fixture(MockRemoteApi::failing(), true, false).await;
        let listing = fx.service.list_clothes(&ClothingQuery::default()).await;
        assert_eq!(listing, CatalogListing { items: Vec::new(), source: None });
    }

    #[tokio::test]
    async fn test_offline_mode_skips_remote_and_queues() {
        let fx = fixture(MockRemoteApi::default(), false, true).await;
        fx.remote.listing.lock().unwrap().push(remote_item("r1", "tops"));

        assert_eq!(fx.service.list_clothes(&ClothingQuery::default()).await.source, None);

        let added = fx.service.add_clothing(NewClothing::new("tops"), None).await.unwrap();
        assert_eq!(added.remote, RemoteOutcome::Queued);
        let outcome = fx
            .service
            .save_outfit(OutfitDraft { name: None, clothing_ids: vec![added.value.clone()], occasion: None, notes: None })
            .await
            .unwrap();
        assert_eq!(outcome.remote, RemoteOutcome::Queued);
        assert_eq!(fx.service.get_outfits().await.unwrap(), vec![outcome.value]);
        assert!(fx.remote.calls().is_empty());
        assert_eq!(fx.service.sync().queue_length().await, 2);

        fx.service.set_offline_mode(false).await.unwrap();
        assert!(!fx.service.is_offline());
        assert_eq!(fx.service.sync().queue_length().await, 0);
        assert_eq!(fx.remote.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_leaving_offline_mode_waits_for_reachable_api() {
        let fx = fixture(MockRemoteApi::failing(), false, true).await;
        fx.service.add_clothing(NewClothing::new("tops"), None).await.unwrap();

        let preferences = fx.service.set_offline_mode(false).await.unwrap();
        assert!(!preferences.offline_mode);
        assert!(fx.service.is_offline());
        assert!(!fx.service.sync().is_online());
        assert_eq!(fx.service.sync().queue_length().await, 1);
        assert!(fx.remote.calls().is_empty());

        fx.remote.fail.store(false, Ordering::SeqCst);
        fx.service.set_offline_mode(false).await.unwrap();
        assert!(!fx.service.is_offline());
        assert_eq!(fx.service.sync().queue_length().await, 0);
    }

    #[tokio::test]
    async fn test_saved_outfits_stay_local_after_sync() {
        let fx = fixture(MockRemoteApi::default(), true, false).await;
        let draft = OutfitDraft {
            name: Some("office".into()),
            clothing_ids: vec!["a".into(), "b".into()],
            occasion: Some("work".into()),
            notes: None,
        };
        let saved = fx.service.save_outfit(draft).await.unwrap();
        assert_eq!(saved.remote, RemoteOutcome::Synced);
        assert_eq!(fx.remote.calls().len(), 1);

        let outfits = fx.service.get_outfits().await.unwrap();
        assert_eq!(outfits.len(), 1);
        assert_eq!(outfits[0].name.as_deref(), Some("office"));
        assert_eq!(outfits[0].clothing_ids.len(), 2);

        fx.service.delete_outfit(&saved.value.id).await.unwrap();
        assert!(fx.service.get_outfits().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mutations_write_locally_then_remote() {
        let fx = fixture(MockRemoteApi::default(), true, false).await;
        let added = fx.service.add_clothing(NewClothing::new("tops"), None).await.unwrap();
        assert_eq!(added.remote, RemoteOutcome::Synced);

        let worn = fx.service.record_wear(&added.value).await.unwrap();
        assert_eq!(worn.value.wear_count, 1);

        let batch = fx
            .service
            .batch_record_wear(vec![added.value.clone(), "unknown".into()])
            .await
            .unwrap();
        assert_eq!(batch.value.len(), 1);
        assert_eq!(batch.value[0].wear_count, 2);

        fx.service.delete_clothing(&added.value).await.unwrap();
        assert!(fx.service.get_clothing(&added.value).await.unwrap().is_none());

        let calls = fx.remote.calls();
        assert_eq!(calls[0], "CREATE_CLOTHING tops");
        assert_eq!(calls[1], format!("RECORD_WEAR {}", added.value));
        assert!(calls[2].starts_with("BATCH_WEAR "));
        assert_eq!(calls[3], format!("DELETE_CLOTHING {}", added.value));
    }

    #[tokio::test]
    async fn test_feedback_rating_is_validated_before_sending() {
        let fx = fixture(MockRemoteApi::default(), true, false).await;
        let bad = OutfitFeedback { outfit_id: "o1".into(), rating: 9, comment: None };
        assert!(fx.service.submit_outfit_feedback(bad).await.is_err());
        assert!(fx.remote.calls().is_empty());

        let good = OutfitFeedback { outfit_id: "o1".into(), rating: 4, comment: Some("nice".into()) };
        assert_eq!(fx.service.submit_outfit_feedback(good).await.unwrap(), RemoteOutcome::Synced);
        assert_eq!(fx.remote.calls(), vec!["OUTFIT_FEEDBACK o1".to_string()]);
    }

    #[tokio::test]
    async fn test_remote_failure_queues_mutation() {
        let fx = fixture(MockRemoteApi::failing(), true, false).await;
        let added = fx.service.add_clothing(NewClothing::new("tops"), None).await.unwrap();
        assert_eq!(added.remote, RemoteOutcome::Queued);
        assert!(fx.service.get_clothing(&added.value).await.unwrap().is_some());
        assert_eq!(fx.service.sync().queue_length().await, 1);
    }

    #[tokio::test]
    async fn test_upload_and_store_keeps_images() {
        let fx = fixture(MockRemoteApi::default(), true, false).await;
        let files: Vec<UploadFile> = (0..3)
            .map(|i| UploadFile::new(format!("{}.jpg", i), "image/jpeg", vec![0xFF; 2048]))
            .collect();

        let outcome = fx.service.upload_and_store(files, UploadOptions::default()).await.unwrap();
        assert_eq!(outcome.response.summary.success, 3);
        assert_eq!(outcome.stored, vec!["srv-0", "srv-1", "srv-2"]);

        let item = fx.service.get_clothing("srv-1").await.unwrap().unwrap();
        assert!(item.record.has_local_image);
        assert_eq!(item.image.unwrap().data.len(), 2048);
    }

    #[tokio::test]
    async fn test_export_then_import_strategies() {
        let fx = fixture(MockRemoteApi::default(), false, true).await;
        let dir = tempfile::tempdir().unwrap();
        let first = fx
            .service
            .add_clothing(
                NewClothing { notes: Some("mine".into()), ..NewClothing::new("tops") },
                Some(ImageBlob::new("", vec![1, 2, 3], None)),
            )
            .await
            .unwrap();
        fx.service.add_clothing(NewClothing::new("shoes"), None).await.unwrap();

        let summary = fx.service.export_backup(Some(dir.path())).await.unwrap();
        assert_eq!(summary.item_count, 2);

        let skipped = fx.service.import_backup(&summary.path, ConflictStrategy::Skip).await.unwrap();
        assert_eq!(skipped.summary.skipped, 2);
        assert_eq!(fx.service.get_statistics().await.unwrap().total, 2);

        let duplicated = fx.service.import_backup(&summary.path, ConflictStrategy::Duplicate).await.unwrap();
        assert_eq!(duplicated.persisted, 2);
        assert_eq!(fx.service.get_statistics().await.unwrap().total, 4);
        let copies = fx.service.search_clothes("[imported copy]").await.unwrap();
        assert_eq!(copies.len(), 2);
        assert!(copies.iter().any(|c| c.image.is_some()));

        let replaced = fx.service.import_backup(&summary.path, ConflictStrategy::Replace).await.unwrap();
        assert_eq!(replaced.summary.replaced, 2);
        assert_eq!(fx.service.get_statistics().await.unwrap().total, 4);
        let original = fx.service.get_clothing(&first.value).await.unwrap().unwrap();
        assert_eq!(original.record.notes.as_deref(), Some("mine"));
        assert!(original.image.is_some());
    }

    #[tokio::test]
    async fn test_import_persists_sparse_archive_items() {
        use std::io::Write;
        use zip::write::FileOptions;

        let fx = fixture(MockRemoteApi::default(), false, true).await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old-backup.zip");

        let metadata = r#"{"version":"1.0","totalItems":2,"items":[
            {"_id":"a","category":"tops","colors":null,"tags":null},
            {"_id":"b","notes":"no category"}
        ]}"#;
        let mut zip = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
        zip.start_file("metadata.json", FileOptions::default()).unwrap();
        zip.write_all(metadata.as_bytes()).unwrap();
        zip.finish().unwrap();

        let outcome = fx.service.import_backup(&path, ConflictStrategy::Replace).await.unwrap();
        assert_eq!(outcome.summary.added, 2);
        assert_eq!(outcome.persisted, 2);
        assert_eq!(outcome.failed, 0);
        assert_eq!(outcome.unreadable, 0);

        let stored = fx.service.get_clothing("b").await.unwrap().unwrap();
        assert_eq!(stored.record.category, "");
        assert_eq!(stored.record.notes.as_deref(), Some("no category"));
        assert_eq!(fx.service.get_statistics().await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_export_defaults_to_configured_dir() {
        let dir = tempfile::tempdir().unwrap();
        let fx = fixture(MockRemoteApi::default(), false, true).await;
        let service = fx.service.with_export_dir(dir.path());
        service.add_clothing(NewClothing::new("tops"), None).await.unwrap();

        let summary = service.export_backup(None).await.unwrap();
        assert_eq!(summary.path.parent(), Some(dir.path()));
        assert!(summary.path.exists());
    }
}
