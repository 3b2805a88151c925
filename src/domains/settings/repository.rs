use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{query, query_scalar};

use crate::database::LocalDatabase;
use crate::domains::settings::types::{UpdatePreferences, UserPreferences, PREFERENCES_KEY};
use crate::errors::{DbError, DomainResult};
use crate::utils::format_timestamp;

/// Flat key-value store for preferences and small pieces of core state
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get_setting(&self, key: &str) -> DomainResult<Option<serde_json::Value>>;

    async fn set_setting(&self, key: &str, value: &serde_json::Value) -> DomainResult<()>;

    async fn remove_setting(&self, key: &str) -> DomainResult<()>;

    /// Stored preferences, or defaults when none were saved (or the stored value is unreadable).
    async fn get_preferences(&self) -> DomainResult<UserPreferences> {
        match self.get_setting(PREFERENCES_KEY).await? {
            None => Ok(UserPreferences::default()),
            Some(value) => Ok(serde_json::from_value(value).unwrap_or_else(|e| {
                log::warn!("Stored preferences are unreadable, using defaults: {}", e);
                UserPreferences::default()
            })),
        }
    }

    async fn update_preferences(&self, update: &UpdatePreferences) -> DomainResult<UserPreferences> {
        let mut preferences = self.get_preferences().await?;
        update.apply_to(&mut preferences);
        self.set_setting(PREFERENCES_KEY, &serde_json::to_value(&preferences)?).await?;
        Ok(preferences)
    }
}

/// SQLite implementation backed by the `settings` table
pub struct SqliteSettingsRepository {
    db: Arc<LocalDatabase>,
}

impl SqliteSettingsRepository {
    pub fn new(db: Arc<LocalDatabase>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SettingsRepository for SqliteSettingsRepository {
    async fn get_setting(&self, key: &str) -> DomainResult<Option<serde_json::Value>> {
        let raw: Option<String> = query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(self.db.pool().await?)
            .await
            .map_err(DbError::from)?;

        raw.map(|raw| serde_json::from_str(&raw).map_err(Into::into)).transpose()
    }

    async fn set_setting(&self, key: &str, value: &serde_json::Value) -> DomainResult<()> {
        query(
            "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(serde_json::to_string(value)?)
        .bind(format_timestamp(&Utc::now()))
        .execute(self.db.pool().await?)
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    async fn remove_setting(&self, key: &str) -> DomainResult<()> {
        query("DELETE FROM settings WHERE key = ?")
            .bind(key)
            .execute(self.db.pool().await?)
            .await
            .map_err(DbError::from)?;
        Ok(())
    }
}
