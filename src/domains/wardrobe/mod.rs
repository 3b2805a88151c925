pub mod repository;
pub mod service;
pub mod types;

pub use repository::{ClothingRepository, SqliteClothingRepository};
pub use service::{CatalogListing, CatalogSource, ImportOutcome, Mutation, RemoteOutcome, UploadOutcome, WardrobeService};
pub use types::{
    ClothingItem, ClothingQuery, ClothingRecord, ImageBlob, NewClothing, UpdateClothing, WardrobeStatistics,
};
