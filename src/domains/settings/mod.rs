pub mod repository;
pub mod types;

pub use repository::{SettingsRepository, SqliteSettingsRepository};
pub use types::{AppTheme, UpdatePreferences, UserPreferences};
