//! Host configuration, read once at startup from `photo_manager.toml`
//!
//! ```toml
//! database_file = "photo_manager.db"
//! storage_dir = "photos"
//!
//! [photos]
//! capture_category = "roof"
//! capture_quality = 90
//! max_photos = 3
//! ```

use crate::error::AppError;
use crate::filesystem::in_data_dir;
use photo_capture::PhotoManagerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "photo_manager.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// SQLite file holding the shared store, relative to the data dir
    pub database_file: PathBuf,
    /// Persistent photo storage area, relative to the data dir
    pub storage_dir: PathBuf,
    /// Use the placeholder provider even when a camera is present
    pub force_synthetic_camera: bool,
    pub photos: PhotoManagerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_file: PathBuf::from("photo_manager.db"),
            storage_dir: PathBuf::from("photos"),
            force_synthetic_camera: false,
            photos: PhotoManagerConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        in_data_dir(data_dir, &self.database_file)
    }

    pub fn storage_path(&self, data_dir: &Path) -> PathBuf {
        in_data_dir(data_dir, &self.storage_dir)
    }
}

/// Loads and validates the configuration; a missing file yields the defaults
pub fn load_from_path(path: &Path) -> Result<AppConfig, AppError> {
    if !path.exists() {
        log::info!("No configuration at {}, using defaults", path.display());
        return Ok(AppConfig::default());
    }

    let content = fs::read_to_string(path)?;
    let mut config: AppConfig = toml::from_str(&content)?;
    config.photos = config.photos.validated()?;

    log::debug!("Configuration loaded from {}", path.display());
    Ok(config)
}
