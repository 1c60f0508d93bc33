//! Configuration file handling.
//!
//! This module provides loading and parsing of `.sql_replay.json` configuration
//! files, which name the live backing database used for recording and the file
//! the cache is persisted to.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use crate::backing::BackingConfig;

/// Name of the configuration file looked up in the current directory.
pub const CONFIG_FILE_NAME: &str = ".sql_replay.json";

/// Default location of the persisted cache.
pub const DEFAULT_CACHE_PATH: &str = "./sql_replay.cache.json";

/// Top-level configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Live database used while recording
    pub backing: BackingConfigFile,

    /// Where recordings are stored
    #[serde(default)]
    pub cache: CacheConfigFile,
}

/// Backing database variants.
///
/// JSON format uses a "type" field with lowercase variant names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackingConfigFile {
    /// SQLite database file
    Sqlite { path: PathBuf },
    /// In-memory SQLite database
    #[serde(rename = "memory")]
    Mem,
    /// PostgreSQL server
    Postgres { connection_string: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfigFile {
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
}

impl Default for CacheConfigFile {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
        }
    }
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_PATH)
}

impl ConfigFile {
    /// Load configuration from `.sql_replay.json` in the current directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config file doesn't exist
    /// - The file cannot be read
    /// - The JSON is invalid
    pub fn load() -> Result<Self, Box<dyn Error>> {
        Self::load_from(Path::new(CONFIG_FILE_NAME))
    }

    pub fn load_from(config_path: &Path) -> Result<Self, Box<dyn Error>> {
        if !config_path.exists() {
            return Err(format!(
                "Configuration file not found: {}\n\n\
                 Example:\n\
                 {{\n  \
                   \"backing\": {{ \"type\": \"sqlite\", \"path\": \"./app.db\" }},\n  \
                   \"cache\": {{ \"path\": \"{}\" }}\n\
                 }}\n",
                config_path.display(),
                DEFAULT_CACHE_PATH
            )
            .into());
        }

        let content = fs::read_to_string(config_path)
            .map_err(|e| format!("Failed to read {}: {}", config_path.display(), e))?;

        let config: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| format!("Invalid JSON in {}: {}", config_path.display(), e))?;

        Ok(config)
    }
}

impl BackingConfigFile {
    pub fn to_backing_config(&self) -> BackingConfig {
        match self {
            Self::Sqlite { path } => BackingConfig::Sqlite { path: path.clone() },
            Self::Mem => BackingConfig::Memory,
            Self::Postgres { connection_string } => BackingConfig::Postgres {
                connection_string: connection_string.clone(),
            },
        }
    }
}
