//! `larder.toml` loading.

use std::path::{Path, PathBuf};

use larder_core::ServiceConfig;
use larder_pantry::PantryConfig;
use serde::{Deserialize, Serialize};

/// `[storage]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding `larder.sqlite`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Explicit database file; wins over `data_dir`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqlite_path: Option<PathBuf>,
}

/// Whole config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LarderConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub pantry: PantryConfig,
}

impl LarderConfig {
    /// Default config file path: ./larder.toml.
    pub fn default_path() -> PathBuf {
        PathBuf::from("larder.toml")
    }

    /// Load config from disk, or return default if file doesn't exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: LarderConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("invalid config {}: {e}", path.display()))?;
        Ok(config)
    }

    /// Storage settings from the file with command-line overrides on top.
    pub fn service_config(&self, overrides: ServiceConfig) -> ServiceConfig {
        ServiceConfig {
            data_dir: self.storage.data_dir.clone(),
            sqlite_path: self.storage.sqlite_path.clone(),
        }
        .merge(overrides)
    }
}
