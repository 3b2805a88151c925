use crate::config::CoreConfig;
use crate::database::LocalDatabase;
use crate::domains::backup::service::{BackupService, HttpImageFetcher};
use crate::domains::outfit::repository::{OutfitRepository, SqliteOutfitRepository};
use crate::domains::settings::repository::{SettingsRepository, SqliteSettingsRepository};
use crate::domains::sync::queue::{SyncQueueManager, SyncWorkerHandle};
use crate::domains::sync::remote::{ApiRemoteService, RemoteApi};
use crate::domains::upload::service::BatchUploadService;
use crate::domains::upload::transport::HttpUploadTransport;
use crate::domains::upload::types::UploadOptions;
use crate::domains::wardrobe::repository::{ClothingRepository, SqliteClothingRepository};
use crate::domains::wardrobe::service::WardrobeService;
use crate::errors::{ServiceError, ServiceResult};
use log::{info, warn};
use std::sync::Arc;

/// Every service of the core, built once by the host and torn down explicitly.
pub struct WardrobeContext {
    pub config: CoreConfig,
    pub database: Arc<LocalDatabase>,
    pub store: Arc<dyn ClothingRepository>,
    pub settings: Arc<dyn SettingsRepository>,
    pub outfits: Arc<dyn OutfitRepository>,
    pub remote: Arc<dyn RemoteApi>,
    pub sync: SyncQueueManager,
    pub backup: Arc<BackupService>,
    pub uploads: Arc<BatchUploadService>,
    pub wardrobe: Arc<WardrobeService>,
    sync_worker: Option<SyncWorkerHandle>,
}

impl WardrobeContext {
    /// Open the store, restore the sync queue and start the periodic sync worker.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn initialize(config: CoreConfig) -> ServiceResult<Self> {
        // A host may already have installed a logger.
        let _ = env_logger::try_init();

        if let Err(e) = reqwest::Url::parse(&config.api_base_url) {
            return Err(ServiceError::Configuration(format!("Invalid API base URL {}: {}", config.api_base_url, e)));
        }

        let database = Arc::new(LocalDatabase::new(&config.database_url));
        let store: Arc<dyn ClothingRepository> = Arc::new(SqliteClothingRepository::new(database.clone()));
        store.initialize().await?;
        let settings: Arc<dyn SettingsRepository> = Arc::new(SqliteSettingsRepository::new(database.clone()));
        let outfits: Arc<dyn OutfitRepository> = Arc::new(SqliteOutfitRepository::new(database.clone()));

        let preferences = settings.get_preferences().await?;
        let offline_mode = config.offline_mode || preferences.offline_mode;

        let remote: Arc<dyn RemoteApi> =
            Arc::new(ApiRemoteService::new(&config.api_base_url, config.api_token.clone()));

        let sync = SyncQueueManager::new(remote.clone(), settings.clone(), config.sync_max_retries, !offline_mode);
        match sync.load_from_storage().await {
            Ok(restored) => info!("Restored {} pending sync operations", restored),
            Err(e) => warn!("Starting with an empty sync queue: {}", e),
        }

        let fetcher = Arc::new(HttpImageFetcher::new(&config.api_base_url));
        let backup = Arc::new(BackupService::new(Some(fetcher)));
        let transport = Arc::new(HttpUploadTransport::new(&config.api_base_url, config.api_token.clone()));
        let uploads = Arc::new(BatchUploadService::new(
            transport,
            UploadOptions::with_timeout(config.upload_timeout),
        ));

        let wardrobe = Arc::new(
            WardrobeService::new(
                store.clone(),
                settings.clone(),
                outfits.clone(),
                remote.clone(),
                sync.clone(),
                backup.clone(),
                uploads.clone(),
                offline_mode,
            )
            .with_export_dir(config.export_dir.clone()),
        );

        let sync_worker = Some(sync.spawn_periodic_sync(config.sync_interval));
        info!("Wardrobe core initialized (offline mode: {})", offline_mode);

        Ok(Self {
            config,
            database,
            store,
            settings,
            outfits,
            remote,
            sync,
            backup,
            uploads,
            wardrobe,
            sync_worker,
        })
    }

    /// Stop the sync worker and close the database. Pending operations stay persisted.
    pub async fn shutdown(mut self) {
        if let Some(worker) = self.sync_worker.take() {
            worker.shutdown().await;
        }
        self.database.close().await;
        info!("Wardrobe core shut down");
    }
}
