use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{query, query_as, query_scalar, Sqlite, SqlitePool, Transaction};

use crate::database::LocalDatabase;
use crate::domains::settings::types::{LAST_SYNC_TIME_KEY, SYNC_QUEUE_KEY};
use crate::domains::wardrobe::types::{
    encode_list, encode_optional_timestamp, ClothingItem, ClothingQuery, ClothingRecord, ClothingRow,
    ImageBlob, ImageRow, IndexFilter, NewClothing, UpdateClothing, WardrobeStatistics,
};
use crate::errors::{DbError, DomainError, DomainResult};
use crate::utils::{format_timestamp, generate_local_id};
use crate::validation::Validate;

const ENTITY_NAME: &str = "ClothingRecord";
const RECENT_WINDOW_DAYS: i64 = 7;

/// Durable, queryable storage for clothing records and their images
#[async_trait]
pub trait ClothingRepository: Send + Sync {
    /// Open the database and apply migrations. Safe to call repeatedly.
    async fn initialize(&self) -> DomainResult<()>;

    /// Persist a new record (and optional image), returning its id.
    async fn add_clothing(&self, new_clothing: NewClothing, image: Option<ImageBlob>) -> DomainResult<String>;

    async fn get_clothing(&self, id: &str) -> DomainResult<Option<ClothingItem>>;

    async fn get_all_clothes(&self, query: &ClothingQuery) -> DomainResult<Vec<ClothingItem>>;

    async fn find_by_color(&self, color: &str) -> DomainResult<Vec<ClothingRecord>>;

    async fn find_by_tag(&self, tag: &str) -> DomainResult<Vec<ClothingRecord>>;

    /// Merge `update` onto an existing record, optionally replacing its image.
    async fn update_clothing(
        &self,
        id: &str,
        update: &UpdateClothing,
        image: Option<ImageBlob>,
    ) -> DomainResult<ClothingRecord>;

    /// Overwrite (or insert) a full record. An existing image is kept unless `image` is given.
    async fn replace_clothing(&self, record: ClothingRecord, image: Option<ImageBlob>) -> DomainResult<()>;

    async fn record_wear(&self, id: &str, worn_at: DateTime<Utc>) -> DomainResult<ClothingRecord>;

    /// Remove a record and its image. Succeeds when the record is already gone.
    async fn delete_clothing(&self, id: &str) -> DomainResult<()>;

    async fn search_clothes(&self, query: &str) -> DomainResult<Vec<ClothingItem>>;

    async fn get_statistics(&self) -> DomainResult<WardrobeStatistics>;

    /// Wipe records, images, outfits and preferences. The sync queue and last sync time survive.
    async fn clear_all(&self) -> DomainResult<()>;
}

/// SQLite implementation of ClothingRepository
pub struct SqliteClothingRepository {
    db: Arc<LocalDatabase>,
}

impl SqliteClothingRepository {
    pub fn new(db: Arc<LocalDatabase>) -> Self {
        Self { db }
    }

    async fn pool(&self) -> DomainResult<&SqlitePool> {
        Ok(self.db.pool().await?)
    }

    async fn find_row_with_tx(
        tx: &mut Transaction<'_, Sqlite>,
        id: &str,
    ) -> DomainResult<ClothingRecord> {
        let row = query_as::<_, ClothingRow>("SELECT * FROM clothes WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| DomainError::EntityNotFound(ENTITY_NAME.to_string(), id.to_string()))?;
        row.into_entity()
    }

    async fn insert_record_with_tx(
        tx: &mut Transaction<'_, Sqlite>,
        record: &ClothingRecord,
    ) -> DomainResult<()> {
        query(
            "INSERT INTO clothes (
                id, category, sub_category, colors, style, season, condition, notes, tags,
                favorite, wear_count, last_worn, created_at, updated_at, has_local_image
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.category)
        .bind(&record.sub_category)
        .bind(encode_list(&record.colors)?)
        .bind(&record.style)
        .bind(encode_list(&record.season)?)
        .bind(&record.condition)
        .bind(&record.notes)
        .bind(encode_list(&record.tags)?)
        .bind(record.favorite as i64)
        .bind(record.wear_count as i64)
        .bind(encode_optional_timestamp(&record.last_worn))
        .bind(format_timestamp(&record.created_at))
        .bind(format_timestamp(&record.updated_at))
        .bind(record.has_local_image as i64)
        .execute(&mut **tx)
        .await
        .map_err(DbError::from)?;

        Self::write_memberships_with_tx(tx, record).await
    }

    async fn update_record_with_tx(
        tx: &mut Transaction<'_, Sqlite>,
        record: &ClothingRecord,
    ) -> DomainResult<()> {
        let result = query(
            "UPDATE clothes SET
                category = ?, sub_category = ?, colors = ?, style = ?, season = ?, condition = ?,
                notes = ?, tags = ?, favorite = ?, wear_count = ?, last_worn = ?, created_at = ?,
                updated_at = ?, has_local_image = ?
             WHERE id = ?",
        )
        .bind(&record.category)
        .bind(&record.sub_category)
        .bind(encode_list(&record.colors)?)
        .bind(&record.style)
        .bind(encode_list(&record.season)?)
        .bind(&record.condition)
        .bind(&record.notes)
        .bind(encode_list(&record.tags)?)
        .bind(record.favorite as i64)
        .bind(record.wear_count as i64)
        .bind(encode_optional_timestamp(&record.last_worn))
        .bind(format_timestamp(&record.created_at))
        .bind(format_timestamp(&record.updated_at))
        .bind(record.has_local_image as i64)
        .bind(&record.id)
        .execute(&mut **tx)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::EntityNotFound(ENTITY_NAME.to_string(), record.id.clone()));
        }

        Self::write_memberships_with_tx(tx, record).await
    }

    /// Rebuild the color/tag membership rows backing the multi-entry indexes.
    async fn write_memberships_with_tx(
        tx: &mut Transaction<'_, Sqlite>,
        record: &ClothingRecord,
    ) -> DomainResult<()> {
        query("DELETE FROM clothing_colors WHERE clothing_id = ?")
            .bind(&record.id)
            .execute(&mut **tx)
            .await
            .map_err(DbError::from)?;
        query("DELETE FROM clothing_tags WHERE clothing_id = ?")
            .bind(&record.id)
            .execute(&mut **tx)
            .await
            .map_err(DbError::from)?;

        for color in &record.colors {
            query("INSERT OR IGNORE INTO clothing_colors (clothing_id, color) VALUES (?, ?)")
                .bind(&record.id)
                .bind(color)
                .execute(&mut **tx)
                .await
                .map_err(DbError::from)?;
        }
        for tag in &record.tags {
            query("INSERT OR IGNORE INTO clothing_tags (clothing_id, tag) VALUES (?, ?)")
                .bind(&record.id)
                .bind(tag)
                .execute(&mut **tx)
                .await
                .map_err(DbError::from)?;
        }
        Ok(())
    }

    async fn upsert_image_with_tx(
        tx: &mut Transaction<'_, Sqlite>,
        image: &ImageBlob,
    ) -> DomainResult<()> {
        query(
            "INSERT INTO clothing_images (id, data, mime_type, size_bytes, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                data = excluded.data,
                mime_type = excluded.mime_type,
                size_bytes = excluded.size_bytes,
                created_at = excluded.created_at",
        )
        .bind(&image.id)
        .bind(&image.data)
        .bind(&image.mime_type)
        .bind(image.size_bytes as i64)
        .bind(format_timestamp(&image.created_at))
        .execute(&mut **tx)
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    async fn fetch_image(pool: &SqlitePool, id: &str) -> DomainResult<Option<ImageBlob>> {
        query_as::<_, ImageRow>("SELECT * FROM clothing_images WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(DbError::from)?
            .map(ImageRow::into_entity)
            .transpose()
    }

    async fn hydrate(
        pool: &SqlitePool,
        rows: Vec<ClothingRow>,
        include_images: bool,
    ) -> DomainResult<Vec<ClothingItem>> {
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let record = row.into_entity()?;
            let mut item = ClothingItem::new(record);
            if include_images && item.record.has_local_image {
                match Self::fetch_image(pool, &item.record.id).await {
                    Ok(image) => item.image = image,
                    Err(e) => log::warn!("Failed to load image for {}: {}", item.record.id, e),
                }
            }
            items.push(item);
        }
        Ok(items)
    }

    /// Run `body` inside a transaction, committing on success and rolling back on error.
    async fn in_transaction<T, F>(&self, body: F) -> DomainResult<T>
    where
        F: for<'c> FnOnce(
                &'c mut Transaction<'static, Sqlite>,
            ) -> std::pin::Pin<Box<dyn std::future::Future<Output = DomainResult<T>> + Send + 'c>>
            + Send,
        T: Send,
    {
        let mut tx = self.pool().await?.begin().await.map_err(DbError::from)?;
        match body(&mut tx).await {
            Ok(value) => {
                tx.commit().await.map_err(DbError::from)?;
                Ok(value)
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }
}

/// Case-insensitive substring match over the searchable fields. `needle` must already be lowercase.
pub(crate) fn matches_search(record: &ClothingRecord, needle: &str) -> bool {
    let contains = |value: &str| value.to_lowercase().contains(needle);

    contains(&record.category)
        || record.sub_category.as_deref().is_some_and(contains)
        || record.style.as_deref().is_some_and(contains)
        || record.colors.iter().any(|color| contains(color))
        || record.tags.iter().any(|tag| contains(tag))
        || record.notes.as_deref().is_some_and(contains)
}

#[async_trait]
impl ClothingRepository for SqliteClothingRepository {
    async fn initialize(&self) -> DomainResult<()> {
        self.pool().await?;
        Ok(())
    }

    async fn add_clothing(&self, new_clothing: NewClothing, image: Option<ImageBlob>) -> DomainResult<String> {
        new_clothing.validate()?;

        let id = new_clothing
            .id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(generate_local_id);
        let record = new_clothing.into_record(id.clone(), Utc::now(), image.is_some());
        let image = image.map(|mut blob| {
            blob.id = id.clone();
            blob
        });

        self.in_transaction(move |tx| {
            Box::pin(async move {
                Self::insert_record_with_tx(tx, &record).await?;
                if let Some(blob) = &image {
                    Self::upsert_image_with_tx(tx, blob).await?;
                }
                Ok(())
            })
        })
        .await?;

        log::debug!("Clothing {} added", id);
        Ok(id)
    }

    async fn get_clothing(&self, id: &str) -> DomainResult<Option<ClothingItem>> {
        let pool = self.pool().await?;
        let row = query_as::<_, ClothingRow>("SELECT * FROM clothes WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(DbError::from)?;

        match row {
            None => Ok(None),
            Some(row) => Ok(Self::hydrate(pool, vec![row], true).await?.pop()),
        }
    }

    async fn get_all_clothes(&self, options: &ClothingQuery) -> DomainResult<Vec<ClothingItem>> {
        let pool = self.pool().await?;
        let limit = options.limit as i64;
        let offset = options.offset as i64;

        let rows = match options.index_filter() {
            IndexFilter::All => {
                query_as::<_, ClothingRow>("SELECT * FROM clothes ORDER BY id LIMIT ? OFFSET ?")
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(pool)
                    .await
            }
            IndexFilter::Category(category) => {
                query_as::<_, ClothingRow>(
                    "SELECT * FROM clothes WHERE category = ? ORDER BY id LIMIT ? OFFSET ?",
                )
                .bind(category)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await
            }
            IndexFilter::Style(style) => {
                query_as::<_, ClothingRow>(
                    "SELECT * FROM clothes WHERE style = ? ORDER BY id LIMIT ? OFFSET ?",
                )
                .bind(style)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await
            }
            IndexFilter::Favorite(favorite) => {
                query_as::<_, ClothingRow>(
                    "SELECT * FROM clothes WHERE favorite = ? ORDER BY id LIMIT ? OFFSET ?",
                )
                .bind(favorite as i64)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await
            }
        }
        .map_err(DbError::from)?;

        Self::hydrate(pool, rows, options.include_images).await
    }

    async fn find_by_color(&self, color: &str) -> DomainResult<Vec<ClothingRecord>> {
        let rows = query_as::<_, ClothingRow>(
            "SELECT c.* FROM clothes c
             JOIN clothing_colors cc ON cc.clothing_id = c.id
             WHERE cc.color = ? ORDER BY c.id",
        )
        .bind(color)
        .fetch_all(self.pool().await?)
        .await
        .map_err(DbError::from)?;

        rows.into_iter().map(ClothingRow::into_entity).collect()
    }

    async fn find_by_tag(&self, tag: &str) -> DomainResult<Vec<ClothingRecord>> {
        let rows = query_as::<_, ClothingRow>(
            "SELECT c.* FROM clothes c
             JOIN clothing_tags ct ON ct.clothing_id = c.id
             WHERE ct.tag = ? ORDER BY c.id",
        )
        .bind(tag)
        .fetch_all(self.pool().await?)
        .await
        .map_err(DbError::from)?;

        rows.into_iter().map(ClothingRow::into_entity).collect()
    }

    async fn update_clothing(
        &self,
        id: &str,
        update: &UpdateClothing,
        image: Option<ImageBlob>,
    ) -> DomainResult<ClothingRecord> {
        update.validate()?;
        let id = id.to_string();
        let update = update.clone();

        let record = self
            .in_transaction(move |tx| {
                Box::pin(async move {
                    let mut record = Self::find_row_with_tx(tx, &id).await?;
                    update.apply_to(&mut record);
                    record.updated_at = Utc::now();

                    if let Some(mut blob) = image {
                        blob.id = id.clone();
                        Self::upsert_image_with_tx(tx, &blob).await?;
                        record.has_local_image = true;
                    }

                    Self::update_record_with_tx(tx, &record).await?;
                    Ok(record)
                })
            })
            .await?;

        log::debug!("Clothing {} updated", record.id);
        Ok(record)
    }

    async fn replace_clothing(&self, record: ClothingRecord, image: Option<ImageBlob>) -> DomainResult<()> {
        if !record.has_id() {
            return Err(DomainError::Validation(crate::errors::ValidationError::required("id")));
        }

        self.in_transaction(move |tx| {
            Box::pin(async move {
                let mut record = record;
                record.updated_at = Utc::now();

                let existing: i64 = query_scalar("SELECT COUNT(*) FROM clothes WHERE id = ?")
                    .bind(&record.id)
                    .fetch_one(&mut **tx)
                    .await
                    .map_err(DbError::from)?;
                let stored_images: i64 = query_scalar("SELECT COUNT(*) FROM clothing_images WHERE id = ?")
                    .bind(&record.id)
                    .fetch_one(&mut **tx)
                    .await
                    .map_err(DbError::from)?;

                record.has_local_image = image.is_some() || stored_images > 0;
                if existing > 0 {
                    Self::update_record_with_tx(tx, &record).await?;
                } else {
                    Self::insert_record_with_tx(tx, &record).await?;
                }

                // The image row references the record, so it goes in second.
                if let Some(mut blob) = image {
                    blob.id = record.id.clone();
                    Self::upsert_image_with_tx(tx, &blob).await?;
                }
                Ok(())
            })
        })
        .await
    }

    async fn record_wear(&self, id: &str, worn_at: DateTime<Utc>) -> DomainResult<ClothingRecord> {
        let id = id.to_string();
        self.in_transaction(move |tx| {
            Box::pin(async move {
                let mut record = Self::find_row_with_tx(tx, &id).await?;
                record.wear_count = record.wear_count.saturating_add(1);
                record.last_worn = Some(worn_at);
                record.updated_at = Utc::now();
                Self::update_record_with_tx(tx, &record).await?;
                Ok(record)
            })
        })
        .await
    }

    async fn delete_clothing(&self, id: &str) -> DomainResult<()> {
        let id = id.to_string();
        self.in_transaction(move |tx| {
            Box::pin(async move {
                for statement in [
                    "DELETE FROM clothing_images WHERE id = ?",
                    "DELETE FROM clothing_colors WHERE clothing_id = ?",
                    "DELETE FROM clothing_tags WHERE clothing_id = ?",
                    "DELETE FROM clothes WHERE id = ?",
                ] {
                    query(statement)
                        .bind(&id)
                        .execute(&mut **tx)
                        .await
                        .map_err(DbError::from)?;
                }
                Ok(())
            })
        })
        .await
    }

    async fn search_clothes(&self, search: &str) -> DomainResult<Vec<ClothingItem>> {
        let all = self.get_all_clothes(&ClothingQuery::default()).await?;
        let needle = search.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(all);
        }
        Ok(all.into_iter().filter(|item| matches_search(&item.record, &needle)).collect())
    }

    async fn get_statistics(&self) -> DomainResult<WardrobeStatistics> {
        let pool = self.pool().await?;
        let since = format_timestamp(&(Utc::now() - Duration::days(RECENT_WINDOW_DAYS)));

        let total: i64 = query_scalar("SELECT COUNT(*) FROM clothes")
            .fetch_one(pool)
            .await
            .map_err(DbError::from)?;
        let favorites: i64 = query_scalar("SELECT COUNT(*) FROM clothes WHERE favorite = 1")
            .fetch_one(pool)
            .await
            .map_err(DbError::from)?;
        let recently_added: i64 = query_scalar("SELECT COUNT(*) FROM clothes WHERE created_at > ?")
            .bind(since)
            .fetch_one(pool)
            .await
            .map_err(DbError::from)?;

        let categories: Vec<(String, i64)> = query_as(
            "SELECT category, COUNT(*) FROM clothes WHERE category <> '' GROUP BY category",
        )
        .fetch_all(pool)
        .await
        .map_err(DbError::from)?;
        let styles: Vec<(String, i64)> = query_as(
            "SELECT style, COUNT(*) FROM clothes WHERE style IS NOT NULL AND style <> '' GROUP BY style",
        )
        .fetch_all(pool)
        .await
        .map_err(DbError::from)?;
        let colors: Vec<(String, i64)> = query_as("SELECT color, COUNT(*) FROM clothing_colors GROUP BY color")
            .fetch_all(pool)
            .await
            .map_err(DbError::from)?;

        Ok(WardrobeStatistics {
            total,
            favorites,
            recently_added,
            categories: categories.into_iter().collect(),
            styles: styles.into_iter().collect(),
            colors: colors.into_iter().collect(),
        })
    }

    async fn clear_all(&self) -> DomainResult<()> {
        self.in_transaction(|tx| {
            Box::pin(async move {
                for statement in [
                    "DELETE FROM clothing_images",
                    "DELETE FROM clothing_colors",
                    "DELETE FROM clothing_tags",
                    "DELETE FROM clothes",
                    "DELETE FROM outfits",
                ] {
                    query(statement).execute(&mut **tx).await.map_err(DbError::from)?;
                }

                // Pending remote mutations outlive a local wipe.
                query("DELETE FROM settings WHERE key NOT IN (?, ?)")
                    .bind(SYNC_QUEUE_KEY)
                    .bind(LAST_SYNC_TIME_KEY)
                    .execute(&mut **tx)
                    .await
                    .map_err(DbError::from)?;
                Ok(())
            })
        })
        .await?;

        log::info!("Local store cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database;

    async fn setup_repo() -> SqliteClothingRepository {
        let pool = database::connect("sqlite::memory:").await.unwrap();
        SqliteClothingRepository::new(Arc::new(LocalDatabase::from_pool(pool)))
    }

    fn shirt() -> NewClothing {
        NewClothing {
            sub_category: Some("T-Shirt".into()),
            colors: vec!["White".into(), "Navy".into()],
            style: Some("casual".into()),
            season: vec!["summer".into()],
            notes: Some("Linen blend".into()),
            tags: vec!["work".into()],
            ..NewClothing::new("tops")
        }
    }

    fn image_bytes() -> Vec<u8> {
        vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3, 4]
    }

    #[tokio::test]
    async fn test_add_then_get_preserves_fields() {
        let repo = setup_repo().await;
        repo.initialize().await.unwrap();
        repo.initialize().await.unwrap();

        let last_worn = DateTime::parse_from_rfc3339("2026-03-14T09:30:00.250Z").unwrap().with_timezone(&Utc);
        let new = NewClothing {
            condition: Some("good".into()),
            favorite: true,
            wear_count: 2,
            last_worn: Some(last_worn),
            ..shirt()
        };
        let id = repo.add_clothing(new, None).await.unwrap();
        assert!(id.starts_with("local_"));

        let item = repo.get_clothing(&id).await.unwrap().expect("record should exist");
        let record = item.record;
        assert_eq!(record.id, id);
        assert_eq!(record.category, "tops");
        assert_eq!(record.sub_category.as_deref(), Some("T-Shirt"));
        assert_eq!(record.colors, vec!["White".to_string(), "Navy".to_string()]);
        assert_eq!(record.season, vec!["summer".to_string()]);
        assert_eq!(record.tags, vec!["work".to_string()]);
        assert_eq!(record.notes.as_deref(), Some("Linen blend"));
        assert_eq!(record.style.as_deref(), Some("casual"));
        assert_eq!(record.condition.as_deref(), Some("good"));
        assert!(record.favorite);
        assert_eq!(record.wear_count, 2);
        assert_eq!(record.last_worn, Some(last_worn));
        assert!(!record.has_local_image);
        assert!(item.image.is_none());
    }

    #[tokio::test]
    async fn test_add_with_image_sets_flag_and_keeps_explicit_id() {
        let repo = setup_repo().await;
        let new = NewClothing { id: Some("server-1".into()), ..shirt() };
        let id = repo
            .add_clothing(new, Some(ImageBlob::new("ignored", image_bytes(), None)))
            .await
            .unwrap();
        assert_eq!(id, "server-1");

        let item = repo.get_clothing("server-1").await.unwrap().unwrap();
        assert!(item.record.has_local_image);
        let image = item.image.unwrap();
        assert_eq!(image.id, "server-1");
        assert_eq!(image.data, image_bytes());
        assert_eq!(image.mime_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_duplicate_id_is_a_storage_error() {
        let repo = setup_repo().await;
        let new = NewClothing { id: Some("dup".into()), ..shirt() };
        repo.add_clothing(new.clone(), None).await.unwrap();
        let err = repo.add_clothing(new, None).await.unwrap_err();
        assert!(matches!(err, DomainError::Database(_)));
    }

    #[tokio::test]
    async fn test_delete_cascades_to_image() {
        let repo = setup_repo().await;
        let id = repo
            .add_clothing(shirt(), Some(ImageBlob::new("x", image_bytes(), None)))
            .await
            .unwrap();

        repo.delete_clothing(&id).await.unwrap();
        assert!(repo.get_clothing(&id).await.unwrap().is_none());

        let pool = repo.pool().await.unwrap();
        let images: i64 = query_scalar("SELECT COUNT(*) FROM clothing_images WHERE id = ?")
            .bind(&id)
            .fetch_one(pool)
            .await
            .unwrap();
        assert_eq!(images, 0);

        // already gone
        repo.delete_clothing(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_missing_record_is_not_found() {
        let repo = setup_repo().await;
        let err = repo
            .update_clothing("nope", &UpdateClothing { favorite: Some(true), ..Default::default() }, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::EntityNotFound(_, id) if id == "nope"));
    }

    #[tokio::test]
    async fn test_update_merges_and_replaces_image() {
        let repo = setup_repo().await;
        let id = repo.add_clothing(shirt(), None).await.unwrap();
        let before = repo.get_clothing(&id).await.unwrap().unwrap().record;

        let update = UpdateClothing {
            favorite: Some(true),
            colors: Some(vec!["Black".into()]),
            ..Default::default()
        };
        let updated = repo
            .update_clothing(&id, &update, Some(ImageBlob::new(&id, image_bytes(), None)))
            .await
            .unwrap();

        assert!(updated.favorite);
        assert!(updated.has_local_image);
        assert_eq!(updated.style.as_deref(), Some("casual"));
        assert!(updated.updated_at >= before.updated_at);
        assert_eq!(repo.find_by_color("Black").await.unwrap().len(), 1);
        assert!(repo.find_by_color("White").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_filters_pagination_and_precedence() {
        let repo = setup_repo().await;
        for i in 0..5 {
            let new = NewClothing {
                id: Some(format!("item-{}", i)),
                favorite: i % 2 == 0,
                style: Some(if i < 3 { "casual".into() } else { "formal".into() }),
                ..NewClothing::new(if i < 2 { "tops" } else { "bottoms" })
            };
            repo.add_clothing(new, None).await.unwrap();
        }

        let tops = repo
            .get_all_clothes(&ClothingQuery { category: Some("tops".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(tops.len(), 2);

        // category wins over style
        let mixed = repo
            .get_all_clothes(&ClothingQuery {
                category: Some("bottoms".into()),
                style: Some("casual".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(mixed.len(), 3);

        let favorites = repo
            .get_all_clothes(&ClothingQuery { favorite: Some(true), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(favorites.len(), 3);

        let page = repo
            .get_all_clothes(&ClothingQuery { limit: 2, offset: 1, ..Default::default() })
            .await
            .unwrap();
        let ids: Vec<&str> = page.iter().map(|item| item.record.id.as_str()).collect();
        assert_eq!(ids, vec!["item-1", "item-2"]);
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_blank_returns_all() {
        let repo = setup_repo().await;
        repo.add_clothing(shirt(), None).await.unwrap();
        repo.add_clothing(
            NewClothing { colors: vec!["Red".into()], tags: vec!["party".into()], ..NewClothing::new("dresses") },
            None,
        )
        .await
        .unwrap();

        assert_eq!(repo.search_clothes("NAVY").await.unwrap().len(), 1);
        assert_eq!(repo.search_clothes("linen").await.unwrap().len(), 1);
        assert_eq!(repo.search_clothes("PART").await.unwrap().len(), 1);
        assert!(repo.search_clothes("wool").await.unwrap().is_empty());

        let all = repo.get_all_clothes(&ClothingQuery::default()).await.unwrap();
        let blank = repo.search_clothes("   ").await.unwrap();
        assert_eq!(blank.len(), all.len());
        assert_eq!(repo.search_clothes("").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_statistics() {
        let repo = setup_repo().await;
        repo.add_clothing(NewClothing { favorite: true, ..shirt() }, None).await.unwrap();
        repo.add_clothing(shirt(), None).await.unwrap();
        repo.add_clothing(
            NewClothing {
                colors: vec!["Navy".into()],
                created_at: Some(Utc::now() - Duration::days(30)),
                ..NewClothing::new("coats")
            },
            None,
        )
        .await
        .unwrap();

        let stats = repo.get_statistics().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.favorites, 1);
        assert_eq!(stats.recently_added, 2);
        assert_eq!(stats.categories.get("tops"), Some(&2));
        assert_eq!(stats.categories.get("coats"), Some(&1));
        assert_eq!(stats.styles.get("casual"), Some(&2));
        assert_eq!(stats.colors.get("Navy"), Some(&3));
        assert_eq!(stats.colors.get("White"), Some(&2));
    }

    #[tokio::test]
    async fn test_record_wear_and_replace() {
        let repo = setup_repo().await;
        let id = repo
            .add_clothing(shirt(), Some(ImageBlob::new("x", image_bytes(), None)))
            .await
            .unwrap();

        let worn_at = Utc::now();
        let worn = repo.record_wear(&id, worn_at).await.unwrap();
        assert_eq!(worn.wear_count, 1);
        assert_eq!(worn.last_worn.map(|t| t.timestamp_millis()), Some(worn_at.timestamp_millis()));

        let mut replacement = worn.clone();
        replacement.notes = Some("replaced".into());
        replacement.has_local_image = false;
        repo.replace_clothing(replacement, None).await.unwrap();

        let item = repo.get_clothing(&id).await.unwrap().unwrap();
        assert_eq!(item.record.notes.as_deref(), Some("replaced"));
        assert!(item.record.has_local_image, "existing image must be kept");
        assert!(item.image.is_some());
    }

    #[tokio::test]
    async fn test_clear_all() {
        let repo = setup_repo().await;
        repo.add_clothing(shirt(), Some(ImageBlob::new("x", image_bytes(), None))).await.unwrap();
        repo.clear_all().await.unwrap();
        assert!(repo.get_all_clothes(&ClothingQuery::default()).await.unwrap().is_empty());
        assert_eq!(repo.get_statistics().await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_clear_all_keeps_pending_sync_state() {
        use crate::domains::settings::repository::{SettingsRepository, SqliteSettingsRepository};
        use crate::domains::settings::types::UpdatePreferences;
        use crate::domains::sync::queue::SyncQueueManager;
        use crate::domains::sync::remote::mock::MockRemoteApi;
        use crate::domains::sync::types::SyncOperation;

        let pool = database::connect("sqlite::memory:").await.unwrap();
        let db = Arc::new(LocalDatabase::from_pool(pool));
        let repo = SqliteClothingRepository::new(db.clone());
        let settings = Arc::new(SqliteSettingsRepository::new(db));
        let remote = Arc::new(MockRemoteApi::default());

        let manager = SyncQueueManager::new(remote.clone(), settings.clone(), 3, false);
        manager.add_to_sync_queue(SyncOperation::DeleteClothing { id: "a".into() }).await.unwrap();
        settings
            .set_setting(LAST_SYNC_TIME_KEY, &serde_json::json!("2026-10-01T00:00:00.000Z"))
            .await
            .unwrap();
        settings
            .update_preferences(&UpdatePreferences { offline_mode: Some(true), ..Default::default() })
            .await
            .unwrap();

        repo.clear_all().await.unwrap();

        let restarted = SyncQueueManager::new(remote, settings.clone(), 3, false);
        assert_eq!(restarted.load_from_storage().await.unwrap(), manager.queue_length().await);
        assert_eq!(restarted.queue_length().await, 1);
        assert!(settings.get_setting(LAST_SYNC_TIME_KEY).await.unwrap().is_some());
        assert!(!settings.get_preferences().await.unwrap().offline_mode);
    }

    #[test]
    fn test_matches_search_fields() {
        let record = shirt().into_record("a".into(), Utc::now(), false);
        assert!(matches_search(&record, "tops"));
        assert!(matches_search(&record, "t-sh"));
        assert!(matches_search(&record, "casual"));
        assert!(matches_search(&record, "white"));
        assert!(matches_search(&record, "work"));
        assert!(matches_search(&record, "blend"));
        assert!(!matches_search(&record, "summer"));
    }
}
