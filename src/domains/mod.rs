pub mod backup;
pub mod outfit;
pub mod settings;
pub mod sync;
pub mod upload;
pub mod wardrobe;

pub use wardrobe::{WardrobeService, CatalogListing, CatalogSource};
pub use sync::SyncQueueManager;
