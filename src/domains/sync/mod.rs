pub mod queue;
pub mod remote;
pub mod types;

pub use queue::{SyncQueueManager, SyncWorkerHandle};
pub use remote::{ApiRemoteService, RemoteApi};
pub use types::{
    BatchWear, DrainReport, OutfitDraft, OutfitFeedback, ProfileUpdate, QueuedOperation, SyncNotice, SyncOperation,
    SyncOperationKind, SyncStatus,
};
