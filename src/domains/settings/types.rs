use serde::{Deserialize, Serialize};

/// Key holding the serialized pending sync operations
pub const SYNC_QUEUE_KEY: &str = "syncQueue";
/// Key holding the timestamp of the last completed forced sync
pub const LAST_SYNC_TIME_KEY: &str = "lastSyncTime";
/// Key holding [`UserPreferences`]
pub const PREFERENCES_KEY: &str = "preferences";

/// Enum for app theme options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppTheme {
    Light,
    Dark,
    #[default]
    System,
}

impl AppTheme {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "light" => Some(AppTheme::Light),
            "dark" => Some(AppTheme::Dark),
            "system" => Some(AppTheme::System),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppTheme::Light => "light",
            AppTheme::Dark => "dark",
            AppTheme::System => "system",
        }
    }
}

impl From<String> for AppTheme {
    fn from(s: String) -> Self {
        Self::from_str(&s).unwrap_or_default()
    }
}

/// Preferences persisted in the key-value settings store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPreferences {
    /// Skip the remote API entirely and queue every mutation
    pub offline_mode: bool,
    /// Reduced UI mode. Stored for the host application, not interpreted here.
    pub simplified_mode: bool,
    pub theme: AppTheme,
}

/// Partial update of [`UserPreferences`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePreferences {
    pub offline_mode: Option<bool>,
    pub simplified_mode: Option<bool>,
    pub theme: Option<AppTheme>,
}

impl UpdatePreferences {
    pub fn apply_to(&self, preferences: &mut UserPreferences) {
        if let Some(offline_mode) = self.offline_mode {
            preferences.offline_mode = offline_mode;
        }
        if let Some(simplified_mode) = self.simplified_mode {
            preferences.simplified_mode = simplified_mode;
        }
        if let Some(theme) = self.theme {
            preferences.theme = theme;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferences_tolerate_missing_fields() {
        let prefs: UserPreferences = serde_json::from_str(r#"{"offlineMode":true}"#).unwrap();
        assert!(prefs.offline_mode);
        assert!(!prefs.simplified_mode);
        assert_eq!(prefs.theme, AppTheme::System);
    }

    #[test]
    fn test_theme_from_string() {
        assert_eq!(AppTheme::from("dark".to_string()), AppTheme::Dark);
        assert_eq!(AppTheme::from("neon".to_string()), AppTheme::System);
        assert_eq!(AppTheme::Light.as_str(), "light");
    }
}
