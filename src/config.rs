use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;

use crate::playlist::DEFAULT_TRANSITION_FLOOR;
use crate::preferences::UserPreferences;

/// Application configuration loaded from TOML config file.
/// Every field has a default, so the file is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Directories searched for feature files by `rank`.
    pub library_dirs: Vec<PathBuf>,
    /// Default scoring preferences.
    pub preferences: UserPreferences,
    pub playlist: PlaylistConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PlaylistConfig {
    /// Lowest acceptable single-transition probability.
    pub transition_floor: f64,
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        Self {
            transition_floor: DEFAULT_TRANSITION_FLOOR,
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/segue/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match Self::from_toml_str(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Get the config file path.
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
