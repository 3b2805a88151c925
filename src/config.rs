use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://wardrobe.db";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 5 * 60;
pub const DEFAULT_SYNC_MAX_RETRIES: u32 = 3;
pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 20;

/// Runtime configuration for the wardrobe core.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub database_url: String,
    pub api_base_url: String,
    /// Forwarded as a bearer token when present. Authentication is otherwise disabled.
    pub api_token: Option<String>,
    pub offline_mode: bool,
    pub sync_interval: Duration,
    pub sync_max_retries: u32,
    pub upload_timeout: Duration,
    pub export_dir: PathBuf,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_token: None,
            offline_mode: false,
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            sync_max_retries: DEFAULT_SYNC_MAX_RETRIES,
            upload_timeout: Duration::from_secs(DEFAULT_UPLOAD_TIMEOUT_SECS),
            export_dir: env::temp_dir(),
        }
    }
}

impl CoreConfig {
    /// Build a configuration from the environment, loading a `.env` file first if one exists.
    /// Unset or unparseable variables keep their defaults.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            database_url: env::var("WARDROBE_DATABASE_URL").unwrap_or(defaults.database_url),
            api_base_url: env::var("WARDROBE_API_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base_url),
            api_token: env::var("WARDROBE_API_TOKEN").ok().filter(|t| !t.trim().is_empty()),
            offline_mode: parse_var("WARDROBE_OFFLINE_MODE").unwrap_or(defaults.offline_mode),
            sync_interval: parse_var("WARDROBE_SYNC_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.sync_interval),
            sync_max_retries: parse_var("WARDROBE_SYNC_MAX_RETRIES").unwrap_or(defaults.sync_max_retries),
            upload_timeout: parse_var("WARDROBE_UPLOAD_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.upload_timeout),
            export_dir: env::var("WARDROBE_EXPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.export_dir),
        };

        log::debug!("Database URL: {}", config.database_url);
        log::debug!("API base URL: {}", config.api_base_url);
        log::debug!("Offline mode: {}", config.offline_mode);
        config
    }
}

fn parse_var<T: FromStr>(key: &str) -> Option<T> {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("Ignoring unparseable value for {}: {:?}", key, raw);
                None
            }
        },
        Err(_) => None,
    }
}
