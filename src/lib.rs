//! Offline-first core of a wardrobe app: local clothing store, replayable sync
//! queue, backup archives and batch image uploads.

pub mod config;
pub mod context;
pub mod database;
pub mod domains;
pub mod errors;
pub mod validation;

mod db_migration;
mod utils;

pub use config::CoreConfig;
pub use context::WardrobeContext;
pub use errors::{ServiceError, ServiceResult};
