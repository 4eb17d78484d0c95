/// Catalog configuration
///
/// Read from a JSON file. A missing file means defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{CatalogError, CatalogResult};

const APP_DIR: &str = "lesson-catalog";
const DB_FILE: &str = "lesson_catalog.db";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Where the SQLite snapshot lives (defaults to the user data directory)
    pub database_path: Option<PathBuf>,
    /// `tracing` filter used when RUST_LOG is not set
    pub log_filter: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            log_filter: "lesson_catalog=info".to_string(),
        }
    }
}

impl CatalogConfig {
    /// Load from `path`, or return defaults if it does not exist
    pub fn load(path: impl AsRef<Path>) -> CatalogResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: CatalogConfig = serde_json::from_str(&content)?;
        config.validate()?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Save with pretty formatting, creating the parent directory
    pub fn save(&self, path: impl AsRef<Path>) -> CatalogResult<()> {
        let path = path.as_ref();
        self.validate()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> CatalogResult<()> {
        if self.log_filter.trim().is_empty() {
            return Err(CatalogError::validation("log_filter must not be empty"));
        }
        if let Some(path) = &self.database_path {
            if path.as_os_str().is_empty() {
                return Err(CatalogError::validation("database_path must not be empty"));
            }
        }
        Ok(())
    }

    /// The configured database path, or the default one:
    /// - Linux: ~/.local/share/lesson-catalog/lesson_catalog.db
    /// - macOS: ~/Library/Application Support/lesson-catalog/lesson_catalog.db
    /// - Windows: %APPDATA%\lesson-catalog\lesson_catalog.db
    pub fn database_path(&self) -> CatalogResult<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(app_dir()?.join(DB_FILE)),
        }
    }

    /// Default location of the config file
    pub fn default_path() -> CatalogResult<PathBuf> {
        Ok(app_dir()?.join(CONFIG_FILE))
    }
}

fn app_dir() -> CatalogResult<PathBuf> {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .map(|dir| dir.join(APP_DIR))
        .ok_or_else(|| CatalogError::config("could not determine user data directory"))
}
