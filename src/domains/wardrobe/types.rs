use crate::errors::{DomainError, DomainResult};
use crate::utils::{format_timestamp, parse_timestamp};
use crate::validation::{validate_record_id, validate_required, NestedValidator, Validate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;

/// Default page size for catalogue listings.
pub const DEFAULT_QUERY_LIMIT: u32 = 1000;

/// A catalogued piece of clothing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClothingRecord {
    /// Server-assigned or locally generated. Empty means "not yet assigned".
    #[serde(alias = "_id", default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(default)]
    pub sub_category: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub colors: Vec<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub season: Vec<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub favorite: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub wear_count: u32,
    #[serde(default)]
    pub last_worn: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now", deserialize_with = "null_as_now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now", deserialize_with = "null_as_now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub has_local_image: bool,
}

impl ClothingRecord {
    pub fn has_id(&self) -> bool {
        !self.id.trim().is_empty()
    }
}

/// Server payloads and older backups send `null` for absent lists and flags.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn null_as_now<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<DateTime<Utc>>::deserialize(deserializer).map(|value| value.unwrap_or_else(Utc::now))
}

/// Binary image owned by exactly one clothing record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageBlob {
    pub id: String,
    #[serde(skip)]
    pub data: Vec<u8>,
    pub mime_type: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

impl ImageBlob {
    /// Build a blob for `id`, sniffing the MIME type from the payload when `mime_type` is absent.
    pub fn new(id: impl Into<String>, data: Vec<u8>, mime_type: Option<&str>) -> Self {
        let mime_type = mime_type
            .map(str::to_string)
            .or_else(|| infer::get(&data).map(|kind| kind.mime_type().to_string()))
            .unwrap_or_else(|| mime::IMAGE_JPEG.to_string());
        Self {
            id: id.into(),
            size_bytes: data.len() as u64,
            data,
            mime_type,
            created_at: Utc::now(),
        }
    }
}

/// A record together with its resolved image, if any
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClothingItem {
    #[serde(flatten)]
    pub record: ClothingRecord,
    #[serde(skip)]
    pub image: Option<ImageBlob>,
    /// Remote location of the image for server-hosted records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl ClothingItem {
    pub fn new(record: ClothingRecord) -> Self {
        Self { record, image: None, image_url: None }
    }

    pub fn with_image(mut self, image: ImageBlob) -> Self {
        self.image = Some(image);
        self
    }
}

/// Input for creating a clothing record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClothing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub category: String,
    #[serde(default)]
    pub sub_category: Option<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub season: Vec<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub wear_count: u32,
    #[serde(default)]
    pub last_worn: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl NewClothing {
    pub fn new(category: impl Into<String>) -> Self {
        Self { category: category.into(), ..Default::default() }
    }

    pub fn into_record(self, id: String, now: DateTime<Utc>, has_local_image: bool) -> ClothingRecord {
        ClothingRecord {
            id,
            category: self.category,
            sub_category: self.sub_category,
            colors: self.colors,
            style: self.style,
            season: self.season,
            condition: self.condition,
            notes: self.notes,
            tags: self.tags,
            favorite: self.favorite,
            wear_count: self.wear_count,
            last_worn: self.last_worn,
            created_at: self.created_at.unwrap_or(now),
            updated_at: now,
            has_local_image,
        }
    }
}

impl From<ClothingRecord> for NewClothing {
    fn from(record: ClothingRecord) -> Self {
        let id = if record.has_id() { Some(record.id) } else { None };
        Self {
            id,
            category: record.category,
            sub_category: record.sub_category,
            colors: record.colors,
            style: record.style,
            season: record.season,
            condition: record.condition,
            notes: record.notes,
            tags: record.tags,
            favorite: record.favorite,
            wear_count: record.wear_count,
            last_worn: record.last_worn,
            created_at: Some(record.created_at),
        }
    }
}

impl Validate for NewClothing {
    fn validate(&self) -> DomainResult<()> {
        let mut validator = NestedValidator::new();
        validator.check(validate_required("category", &self.category));
        if let Some(id) = &self.id {
            validator.check(validate_record_id("id", id));
        }
        validator.validate()
    }
}

/// Partial update of a clothing record. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClothing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorite: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wear_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_worn: Option<DateTime<Utc>>,
}

impl UpdateClothing {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Merge the patch onto `record`. Timestamps are left to the caller.
    pub fn apply_to(&self, record: &mut ClothingRecord) {
        if let Some(category) = &self.category {
            record.category = category.clone();
        }
        if let Some(sub_category) = &self.sub_category {
            record.sub_category = Some(sub_category.clone());
        }
        if let Some(colors) = &self.colors {
            record.colors = colors.clone();
        }
        if let Some(style) = &self.style {
            record.style = Some(style.clone());
        }
        if let Some(season) = &self.season {
            record.season = season.clone();
        }
        if let Some(condition) = &self.condition {
            record.condition = Some(condition.clone());
        }
        if let Some(notes) = &self.notes {
            record.notes = Some(notes.clone());
        }
        if let Some(tags) = &self.tags {
            record.tags = tags.clone();
        }
        if let Some(favorite) = self.favorite {
            record.favorite = favorite;
        }
        if let Some(wear_count) = self.wear_count {
            record.wear_count = wear_count;
        }
        if let Some(last_worn) = self.last_worn {
            record.last_worn = Some(last_worn);
        }
    }
}

impl Validate for UpdateClothing {
    fn validate(&self) -> DomainResult<()> {
        let mut validator = NestedValidator::new();
        if let Some(category) = &self.category {
            validator.check(validate_required("category", category));
        }
        validator.validate()
    }
}

/// Listing options for the local store.
///
/// Only one indexed filter applies per call: `category` wins over `style`, which wins over `favorite`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClothingQuery {
    pub limit: u32,
    pub offset: u32,
    pub category: Option<String>,
    pub style: Option<String>,
    pub favorite: Option<bool>,
    pub include_images: bool,
}

impl Default for ClothingQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_QUERY_LIMIT,
            offset: 0,
            category: None,
            style: None,
            favorite: None,
            include_images: true,
        }
    }
}

/// The single index a listing is served from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexFilter<'a> {
    All,
    Category(&'a str),
    Style(&'a str),
    Favorite(bool),
}

impl ClothingQuery {
    pub fn index_filter(&self) -> IndexFilter<'_> {
        if let Some(category) = self.category.as_deref() {
            IndexFilter::Category(category)
        } else if let Some(style) = self.style.as_deref() {
            IndexFilter::Style(style)
        } else if let Some(favorite) = self.favorite {
            IndexFilter::Favorite(favorite)
        } else {
            IndexFilter::All
        }
    }

    pub fn without_images(mut self) -> Self {
        self.include_images = false;
        self
    }
}

/// Aggregates over the whole catalogue
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WardrobeStatistics {
    pub total: i64,
    pub favorites: i64,
    pub recently_added: i64,
    pub categories: BTreeMap<String, i64>,
    pub styles: BTreeMap<String, i64>,
    pub colors: BTreeMap<String, i64>,
}

/// Raw `clothes` row
#[derive(Debug, Clone, FromRow)]
pub struct ClothingRow {
    pub id: String,
    pub category: String,
    pub sub_category: Option<String>,
    pub colors: String,
    pub style: Option<String>,
    pub season: String,
    pub condition: Option<String>,
    pub notes: Option<String>,
    pub tags: String,
    pub favorite: i64,
    pub wear_count: i64,
    pub last_worn: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub has_local_image: i64,
}

impl ClothingRow {
    pub fn into_entity(self) -> DomainResult<ClothingRecord> {
        let parse_list = |field: &str, raw: &str| -> DomainResult<Vec<String>> {
            serde_json::from_str(raw)
                .map_err(|e| DomainError::Internal(format!("Bad JSON list in {}: {}", field, e)))
        };

        Ok(ClothingRecord {
            colors: parse_list("colors", &self.colors)?,
            season: parse_list("season", &self.season)?,
            tags: parse_list("tags", &self.tags)?,
            last_worn: self
                .last_worn
                .as_deref()
                .map(|raw| parse_timestamp("last_worn", raw))
                .transpose()?,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
            id: self.id,
            category: self.category,
            sub_category: self.sub_category,
            style: self.style,
            condition: self.condition,
            notes: self.notes,
            favorite: self.favorite != 0,
            wear_count: u32::try_from(self.wear_count).unwrap_or(0),
            has_local_image: self.has_local_image != 0,
        })
    }
}

/// Raw `clothing_images` row
#[derive(Debug, Clone, FromRow)]
pub struct ImageRow {
    pub id: String,
    pub data: Vec<u8>,
    pub mime_type: String,
    pub size_bytes: i64,
    pub created_at: String,
}

impl ImageRow {
    pub fn into_entity(self) -> DomainResult<ImageBlob> {
        Ok(ImageBlob {
            created_at: parse_timestamp("created_at", &self.created_at)?,
            id: self.id,
            data: self.data,
            mime_type: self.mime_type,
            size_bytes: u64::try_from(self.size_bytes).unwrap_or(0),
        })
    }
}

/// Serialized forms of the list columns, shared by insert and update paths
pub(crate) fn encode_list(values: &[String]) -> DomainResult<String> {
    Ok(serde_json::to_string(values)?)
}

pub(crate) fn encode_optional_timestamp(ts: &Option<DateTime<Utc>>) -> Option<String> {
    ts.as_ref().map(format_timestamp)
}
