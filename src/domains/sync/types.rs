use crate::domains::wardrobe::types::{NewClothing, UpdateClothing};
use crate::errors::{DomainResult, SyncError, SyncResult, ValidationError};
use crate::validation::{validate_required, NestedValidator, Validate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Default number of failed replays before a queued operation is dropped
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Wear recorded for several items at once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchWear {
    pub clothing_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worn_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutfitDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub clothing_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occasion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutfitFeedback {
    pub outfit_id: String,
    pub rating: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

pub const MIN_OUTFIT_RATING: u8 = 1;
pub const MAX_OUTFIT_RATING: u8 = 5;

impl Validate for OutfitFeedback {
    fn validate(&self) -> DomainResult<()> {
        let mut validator = NestedValidator::new();
        validator.check(validate_required("outfitId", &self.outfit_id));
        if !(MIN_OUTFIT_RATING..=MAX_OUTFIT_RATING).contains(&self.rating) {
            validator.check(Err(ValidationError::range("rating", MIN_OUTFIT_RATING, MAX_OUTFIT_RATING)));
        }
        validator.validate()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Value>,
}

/// A mutation that can be replayed against the remote API.
///
/// Serialized adjacently tagged: `{"type": "UPDATE_CLOTHING", "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncOperation {
    CreateClothing(NewClothing),
    UpdateClothing { id: String, changes: UpdateClothing },
    DeleteClothing { id: String },
    RecordWear { id: String },
    #[serde(rename = "BATCH_WEAR")]
    BatchRecordWear(BatchWear),
    SaveOutfit(OutfitDraft),
    OutfitFeedback(OutfitFeedback),
    UpdateProfile(ProfileUpdate),
}

/// Discriminant of [`SyncOperation`], matching its wire tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncOperationKind {
    CreateClothing,
    UpdateClothing,
    DeleteClothing,
    RecordWear,
    BatchRecordWear,
    SaveOutfit,
    OutfitFeedback,
    UpdateProfile,
}

impl SyncOperationKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "CREATE_CLOTHING" => Some(SyncOperationKind::CreateClothing),
            "UPDATE_CLOTHING" => Some(SyncOperationKind::UpdateClothing),
            "DELETE_CLOTHING" => Some(SyncOperationKind::DeleteClothing),
            "RECORD_WEAR" => Some(SyncOperationKind::RecordWear),
            "BATCH_WEAR" => Some(SyncOperationKind::BatchRecordWear),
            "SAVE_OUTFIT" => Some(SyncOperationKind::SaveOutfit),
            "OUTFIT_FEEDBACK" => Some(SyncOperationKind::OutfitFeedback),
            "UPDATE_PROFILE" => Some(SyncOperationKind::UpdateProfile),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOperationKind::CreateClothing => "CREATE_CLOTHING",
            SyncOperationKind::UpdateClothing => "UPDATE_CLOTHING",
            SyncOperationKind::DeleteClothing => "DELETE_CLOTHING",
            SyncOperationKind::RecordWear => "RECORD_WEAR",
            SyncOperationKind::BatchRecordWear => "BATCH_WEAR",
            SyncOperationKind::SaveOutfit => "SAVE_OUTFIT",
            SyncOperationKind::OutfitFeedback => "OUTFIT_FEEDBACK",
            SyncOperationKind::UpdateProfile => "UPDATE_PROFILE",
        }
    }
}

impl SyncOperation {
    pub fn kind(&self) -> SyncOperationKind {
        match self {
            SyncOperation::CreateClothing(_) => SyncOperationKind::CreateClothing,
            SyncOperation::UpdateClothing { .. } => SyncOperationKind::UpdateClothing,
            SyncOperation::DeleteClothing { .. } => SyncOperationKind::DeleteClothing,
            SyncOperation::RecordWear { .. } => SyncOperationKind::RecordWear,
            SyncOperation::BatchRecordWear(_) => SyncOperationKind::BatchRecordWear,
            SyncOperation::SaveOutfit(_) => SyncOperationKind::SaveOutfit,
            SyncOperation::OutfitFeedback(_) => SyncOperationKind::OutfitFeedback,
            SyncOperation::UpdateProfile(_) => SyncOperationKind::UpdateProfile,
        }
    }
}

/// Persisted queue entry.
///
/// The operation is kept as a raw tag plus JSON payload so that entries written by a
/// different build still load; they are rejected only when dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedOperation {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub operation_type: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl QueuedOperation {
    pub fn new(operation: &SyncOperation, max_retries: u32) -> SyncResult<Self> {
        let mut encoded = serde_json::to_value(operation)?;
        let payload = encoded.get_mut("payload").map(Value::take).unwrap_or(Value::Null);

        Ok(Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            operation_type: operation.kind().as_str().to_string(),
            payload,
            retry_count: 0,
            max_retries,
        })
    }

    /// Rebuild the typed operation. Unknown tags and malformed payloads are both unrecoverable.
    pub fn decode(&self) -> SyncResult<SyncOperation> {
        let kind = SyncOperationKind::from_str(&self.operation_type)
            .ok_or_else(|| SyncError::UnsupportedOperation(self.operation_type.clone()))?;

        let envelope = serde_json::json!({
            "type": kind.as_str(),
            "payload": self.payload,
        });
        serde_json::from_value(envelope).map_err(|e| {
            SyncError::Serialization(format!("Malformed {} payload: {}", kind.as_str(), e))
        })
    }

    pub fn is_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }
}

/// Snapshot of the sync subsystem for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub is_online: bool,
    pub queue_length: usize,
    pub sync_in_progress: bool,
    pub last_sync: Option<DateTime<Utc>>,
}

/// Outcome of one drain pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    /// True when the pass did nothing because another was running or the queue was empty
    pub skipped: bool,
    pub attempted: usize,
    pub succeeded: usize,
    /// Failed but kept for a later pass
    pub retained: usize,
    pub dropped: usize,
}

impl DrainReport {
    pub fn skipped() -> Self {
        Self { skipped: true, ..Default::default() }
    }
}

/// User-visible events raised by the sync queue
#[derive(Debug, Clone)]
pub enum SyncNotice {
    Online,
    Offline,
    /// An operation was removed without reaching the server
    OperationDropped {
        operation_id: Uuid,
        operation_type: String,
        error: SyncError,
    },
    SyncCompleted(DrainReport),
    SyncFailed(SyncError),
}
