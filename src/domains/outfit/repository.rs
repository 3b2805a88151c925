use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{query, query_as};

use crate::database::LocalDatabase;
use crate::domains::outfit::types::{OutfitRow, SavedOutfit};
use crate::domains::sync::types::OutfitDraft;
use crate::errors::{DbError, DomainError, DomainResult};
use crate::utils::{format_timestamp, generate_local_id};

/// Outfits saved on this device
#[async_trait]
pub trait OutfitRepository: Send + Sync {
    async fn add_outfit(&self, draft: &OutfitDraft) -> DomainResult<SavedOutfit>;

    /// Newest first
    async fn get_outfits(&self) -> DomainResult<Vec<SavedOutfit>>;

    async fn delete_outfit(&self, id: &str) -> DomainResult<()>;
}

pub struct SqliteOutfitRepository {
    db: Arc<LocalDatabase>,
}

impl SqliteOutfitRepository {
    pub fn new(db: Arc<LocalDatabase>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OutfitRepository for SqliteOutfitRepository {
    async fn add_outfit(&self, draft: &OutfitDraft) -> DomainResult<SavedOutfit> {
        let outfit = SavedOutfit::from_draft(draft.clone(), generate_local_id(), Utc::now());

        query(
            "INSERT INTO outfits (id, name, clothing_ids, occasion, notes, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&outfit.id)
        .bind(&outfit.name)
        .bind(serde_json::to_string(&outfit.clothing_ids)?)
        .bind(&outfit.occasion)
        .bind(&outfit.notes)
        .bind(format_timestamp(&outfit.created_at))
        .execute(self.db.pool().await?)
        .await
        .map_err(DbError::from)?;

        log::debug!("Outfit {} saved locally", outfit.id);
        Ok(outfit)
    }

    async fn get_outfits(&self) -> DomainResult<Vec<SavedOutfit>> {
        let rows = query_as::<_, OutfitRow>("SELECT * FROM outfits ORDER BY created_at DESC, id DESC")
            .fetch_all(self.db.pool().await?)
            .await
            .map_err(DbError::from)?;
        rows.into_iter().map(OutfitRow::into_entity).collect()
    }

    async fn delete_outfit(&self, id: &str) -> DomainResult<()> {
        let result = query("DELETE FROM outfits WHERE id = ?")
            .bind(id)
            .execute(self.db.pool().await?)
            .await
            .map_err(DbError::from)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::EntityNotFound("Outfit".to_string(), id.to_string()));
        }
        Ok(())
    }
}
