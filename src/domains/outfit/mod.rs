pub mod repository;
pub mod types;

pub use repository::{OutfitRepository, SqliteOutfitRepository};
pub use types::SavedOutfit;
