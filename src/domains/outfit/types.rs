use crate::domains::sync::types::OutfitDraft;
use crate::errors::{DomainError, DomainResult};
use crate::utils::parse_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An outfit kept on this device, whether or not the server has it yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedOutfit {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub clothing_ids: Vec<String>,
    #[serde(default)]
    pub occasion: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SavedOutfit {
    pub fn from_draft(draft: OutfitDraft, id: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name,
            clothing_ids: draft.clothing_ids,
            occasion: draft.occasion,
            notes: draft.notes,
            created_at,
        }
    }
}

/// Raw `outfits` row
#[derive(Debug, Clone, FromRow)]
pub struct OutfitRow {
    pub id: String,
    pub name: Option<String>,
    pub clothing_ids: String,
    pub occasion: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
}

impl OutfitRow {
    pub fn into_entity(self) -> DomainResult<SavedOutfit> {
        Ok(SavedOutfit {
            clothing_ids: serde_json::from_str(&self.clothing_ids)
                .map_err(|e| DomainError::Internal(format!("Bad JSON list in clothing_ids: {}", e)))?,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            id: self.id,
            name: self.name,
            occasion: self.occasion,
            notes: self.notes,
        })
    }
}
