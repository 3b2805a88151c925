use crate::domains::settings::repository::SettingsRepository;
use crate::domains::settings::types::{LAST_SYNC_TIME_KEY, SYNC_QUEUE_KEY};
use crate::domains::sync::remote::RemoteApi;
use crate::domains::sync::types::{DrainReport, QueuedOperation, SyncNotice, SyncOperation, SyncStatus};
use crate::errors::{SyncError, SyncResult};
use crate::utils::{format_timestamp, parse_timestamp};
use chrono::Utc;
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use uuid::Uuid;

const NOTICE_CHANNEL_CAPACITY: usize = 64;

struct QueueState {
    queue: Mutex<Vec<QueuedOperation>>,
    remote: Arc<dyn RemoteApi>,
    settings: Arc<dyn SettingsRepository>,
    online: AtomicBool,
    draining: AtomicBool,
    max_retries: u32,
    notices: broadcast::Sender<SyncNotice>,
}

/// Clears the drain flag when a pass ends, however it ends.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Durable FIFO of mutations waiting to be replayed against the remote API.
///
/// Cheap to clone; clones share the same queue.
#[derive(Clone)]
pub struct SyncQueueManager {
    state: Arc<QueueState>,
}

impl SyncQueueManager {
    pub fn new(
        remote: Arc<dyn RemoteApi>,
        settings: Arc<dyn SettingsRepository>,
        max_retries: u32,
        online: bool,
    ) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(QueueState {
                queue: Mutex::new(Vec::new()),
                remote,
                settings,
                online: AtomicBool::new(online),
                draining: AtomicBool::new(false),
                max_retries,
                notices,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncNotice> {
        self.state.notices.subscribe()
    }

    pub fn is_online(&self) -> bool {
        self.state.online.load(Ordering::Acquire)
    }

    pub async fn queue_length(&self) -> usize {
        self.state.queue.lock().await.len()
    }

    /// Copy of the pending entries in replay order
    pub async fn pending_operations(&self) -> Vec<QueuedOperation> {
        self.state.queue.lock().await.clone()
    }

    fn notify(&self, notice: SyncNotice) {
        // No receivers is fine.
        let _ = self.state.notices.send(notice);
    }

    /// Restore the queue persisted by a previous run. Unreadable data yields an empty queue.
    pub async fn load_from_storage(&self) -> SyncResult<usize> {
        let restored = match self.state.settings.get_setting(SYNC_QUEUE_KEY).await? {
            None => Vec::new(),
            Some(value) => serde_json::from_value::<Vec<QueuedOperation>>(value).unwrap_or_else(|e| {
                error!("Persisted sync queue is corrupt, starting empty: {}", e);
                Vec::new()
            }),
        };

        let count = restored.len();
        *self.state.queue.lock().await = restored;
        info!("Restored {} pending sync operations", count);
        Ok(count)
    }

    async fn persist(&self, queue: &[QueuedOperation]) -> SyncResult<()> {
        let value = serde_json::to_value(queue)?;
        self.state.settings.set_setting(SYNC_QUEUE_KEY, &value).await?;
        Ok(())
    }

    /// Append an operation and persist the queue. When online a drain is started in the background.
    pub async fn add_to_sync_queue(&self, operation: SyncOperation) -> SyncResult<Uuid> {
        let entry = QueuedOperation::new(&operation, self.state.max_retries)?;
        let id = entry.id;

        {
            let mut queue = self.state.queue.lock().await;
            queue.push(entry);
            self.persist(&queue).await?;
            debug!("Queued {} ({} pending)", operation.kind().as_str(), queue.len());
        }

        if self.is_online() {
            let manager = self.clone();
            tokio::spawn(async move {
                manager.process_sync_queue().await;
            });
        }
        Ok(id)
    }

    /// Replay every pending operation once, in enqueue order.
    ///
    /// Never fails: per-operation errors are retried on a later pass or dropped with a notice.
    /// Returns a skipped report if a pass is already running or the queue is empty.
    pub async fn process_sync_queue(&self) -> DrainReport {
        if self
            .state
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Drain already in progress");
            return DrainReport::skipped();
        }
        let _guard = DrainGuard(&self.state.draining);

        let snapshot = self.state.queue.lock().await.clone();
        if snapshot.is_empty() {
            return DrainReport::skipped();
        }

        info!("Draining {} sync operations", snapshot.len());
        let mut report = DrainReport::default();

        for entry in snapshot {
            report.attempted += 1;

            let outcome = match entry.decode() {
                Ok(operation) => self.state.remote.dispatch(&operation).await,
                Err(e) => {
                    warn!("Dropping undispatchable operation {} ({}): {}", entry.id, entry.operation_type, e);
                    self.remove_entry(entry.id).await;
                    report.dropped += 1;
                    self.notify(SyncNotice::OperationDropped {
                        operation_id: entry.id,
                        operation_type: entry.operation_type.clone(),
                        error: e,
                    });
                    continue;
                }
            };

            match outcome {
                Ok(()) => {
                    self.remove_entry(entry.id).await;
                    report.succeeded += 1;
                }
                Err(e) => {
                    warn!("Sync operation {} ({}) failed: {}", entry.id, entry.operation_type, e);
                    if let Some(exhausted) = self.record_failure(entry.id).await {
                        report.dropped += 1;
                        error!(
                            "Sync operation {} ({}) dropped after {} attempts",
                            exhausted.id, exhausted.operation_type, exhausted.retry_count
                        );
                        self.notify(SyncNotice::OperationDropped {
                            operation_id: exhausted.id,
                            operation_type: exhausted.operation_type.clone(),
                            error: SyncError::RetryExhausted {
                                operation_type: exhausted.operation_type,
                                attempts: exhausted.retry_count,
                            },
                        });
                    } else {
                        report.retained += 1;
                    }
                }
            }
        }

        let queue = self.state.queue.lock().await;
        if let Err(e) = self.persist(&queue).await {
            error!("Failed to persist sync queue after drain: {}", e);
        }
        drop(queue);

        info!(
            "Drain finished: {} succeeded, {} retained, {} dropped",
            report.succeeded, report.retained, report.dropped
        );
        self.notify(SyncNotice::SyncCompleted(report.clone()));
        report
    }

    async fn remove_entry(&self, id: Uuid) {
        self.state.queue.lock().await.retain(|entry| entry.id != id);
    }

    /// Bump the retry count; returns the entry if it was removed for exhausting its retries.
    async fn record_failure(&self, id: Uuid) -> Option<QueuedOperation> {
        let mut queue = self.state.queue.lock().await;
        let position = queue.iter().position(|entry| entry.id == id)?;
        queue[position].retry_count += 1;
        if queue[position].is_exhausted() {
            Some(queue.remove(position))
        } else {
            None
        }
    }

    /// Record a connectivity change. Coming online runs a drain and returns its report.
    pub async fn set_online(&self, online: bool) -> Option<DrainReport> {
        let was_online = self.state.online.swap(online, Ordering::AcqRel);
        if online == was_online {
            return None;
        }

        if online {
            info!("Connectivity restored, syncing");
            self.notify(SyncNotice::Online);
            Some(self.process_sync_queue().await)
        } else {
            info!("Connectivity lost, mutations will be queued");
            self.notify(SyncNotice::Offline);
            None
        }
    }

    /// Run one drain pass now. Fails when offline.
    pub async fn force_sync(&self) -> SyncResult<DrainReport> {
        if !self.is_online() {
            self.notify(SyncNotice::SyncFailed(SyncError::Offline));
            return Err(SyncError::Offline);
        }

        let report = self.process_sync_queue().await;
        let now = serde_json::Value::String(format_timestamp(&Utc::now()));
        self.state.settings.set_setting(LAST_SYNC_TIME_KEY, &now).await?;
        Ok(report)
    }

    pub async fn get_sync_status(&self) -> SyncStatus {
        let last_sync = match self.state.settings.get_setting(LAST_SYNC_TIME_KEY).await {
            Ok(Some(serde_json::Value::String(raw))) => parse_timestamp(LAST_SYNC_TIME_KEY, &raw).ok(),
            Ok(_) => None,
            Err(e) => {
                warn!("Could not read last sync time: {}", e);
                None
            }
        };

        SyncStatus {
            is_online: self.is_online(),
            queue_length: self.queue_length().await,
            sync_in_progress: self.state.draining.load(Ordering::Acquire),
            last_sync,
        }
    }

    /// Drop entries queued longer than `max_age` ago. Returns how many were removed.
    pub async fn prune_stale_operations(&self, max_age: chrono::Duration) -> SyncResult<usize> {
        let cutoff = Utc::now() - max_age;
        let mut queue = self.state.queue.lock().await;
        let before = queue.len();
        queue.retain(|entry| entry.timestamp > cutoff);
        let removed = before - queue.len();
        if removed > 0 {
            self.persist(&queue).await?;
            info!("Pruned {} stale sync operations", removed);
        }
        Ok(removed)
    }

    /// Start the periodic backstop drain. The first pass runs one `period` after start.
    pub fn spawn_periodic_sync(&self, period: Duration) -> SyncWorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let manager = self.clone();

        let join = tokio::spawn(async move {
            info!("Starting periodic sync worker ({:?})", period);
            let mut interval = time::interval_at(Instant::now() + period, period);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if manager.is_online() && manager.queue_length().await > 0 {
                            manager.process_sync_queue().await;
                        }
                    }
                    _ = &mut shutdown_rx => {
                        info!("Periodic sync worker shutting down");
                        break;
                    }
                }
            }
        });

        SyncWorkerHandle { shutdown: Some(shutdown_tx), join }
    }
}

/// Handle to a running periodic sync worker
pub struct SyncWorkerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
}

impl SyncWorkerHandle {
    /// Signal the worker and wait for it. A drain in progress completes first.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.join.await {
            error!("Periodic sync worker ended abnormally: {}", e);
        }
    }
}
