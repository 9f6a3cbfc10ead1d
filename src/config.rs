use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Keys under which the theme store persists its two settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageKeys {
    #[serde(default = "default_theme_key")]
    pub theme: String,
    #[serde(default = "default_ambient_sounds_key")]
    pub ambient_sounds: String,
}

fn default_theme_key() -> String {
    "theme".to_string()
}

fn default_ambient_sounds_key() -> String {
    "ambientSounds".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            theme: default_theme_key(),
            ambient_sounds: default_ambient_sounds_key(),
        }
    }
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Key-value store file; defaults to ~/.serava/storage.json
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<PathBuf>,
    /// Directory of `<theme>.json` palette overrides; defaults to ~/.serava/themes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub themes_dir: Option<PathBuf>,
    /// Default tracing filter directive. RUST_LOG takes precedence.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub storage_keys: StorageKeys,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage_path: None,
            themes_dir: None,
            log_level: default_log_level(),
            storage_keys: StorageKeys::default(),
        }
    }
}

impl Settings {
    /// Returns the config directory path (~/.serava)
    pub fn config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".serava"))
    }

    /// Returns the config file path (~/.serava/settings.json)
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("settings.json"))
    }

    /// Where the key-value store lives
    pub fn storage_path(&self) -> Option<PathBuf> {
        self.storage_path
            .clone()
            .or_else(|| Self::config_dir().map(|d| d.join("storage.json")))
    }

    /// Where palette override files are looked up
    pub fn themes_dir(&self) -> Option<PathBuf> {
        self.themes_dir
            .clone()
            .or_else(|| Self::config_dir().map(|d| d.join("themes")))
    }

    /// Loads settings from the config file, returns default if not found or invalid
    pub fn load() -> Self {
        Self::load_with_error().unwrap_or_default()
    }

    /// Loads settings from the config file with error information
    pub fn load_with_error() -> Result<Self, ConfigError> {
        let config_path = Self::config_path().ok_or(ConfigError::NoConfigDir)?;
        if !config_path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Saves settings to ~/.serava/settings.json
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&config_path)
    }

    /// Saves settings using atomic write pattern
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(config_dir) = path.parent() {
            if !config_dir.as_os_str().is_empty() && !config_dir.exists() {
                fs::create_dir_all(config_dir)?;
                // Set directory permissions to user-only on Unix
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let perms = fs::Permissions::from_mode(0o700);
                    let _ = fs::set_permissions(config_dir, perms);
                }
            }
        }

        let temp_path = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(self)?;

        // Atomic write: write to temp file first, then rename
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.storage_keys.theme, "theme");
        assert_eq!(settings.storage_keys.ambient_sounds, "ambientSounds");
        assert!(settings.storage_path.is_none());
    }

    #[test]
    fn test_parse_partial_json() {
        let json = r#"{"storage_keys":{"theme":"mood"}}"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.storage_keys.theme, "mood");
        assert_eq!(settings.storage_keys.ambient_sounds, "ambientSounds");
        assert_eq!(settings.log_level, "warn");
    }

    #[test]
    fn test_explicit_paths_win() {
        let settings = Settings {
            storage_path: Some(PathBuf::from("/tmp/serava/store.json")),
            themes_dir: Some(PathBuf::from("/tmp/serava/themes")),
            ..Settings::default()
        };
        assert_eq!(
            settings.storage_path(),
            Some(PathBuf::from("/tmp/serava/store.json"))
        );
        assert_eq!(settings.themes_dir(), Some(PathBuf::from("/tmp/serava/themes")));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config").join("settings.json");
        let settings = Settings {
            log_level: "debug".to_string(),
            ..Settings::default()
        };

        settings.save_to(&path).unwrap();
        assert!(!path.with_extension("json.tmp").exists());
        assert_eq!(Settings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{").unwrap();
        assert!(matches!(Settings::load_from(&path), Err(ConfigError::Json(_))));
    }
}
