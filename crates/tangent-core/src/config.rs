use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::catalog::ModelCatalog;
use crate::relay::RelayConfig;

pub const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:3000/api/chat";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Endpoint the canvas posts chat requests to
    pub relay_url: String,
    /// Models offered when spawning or branching panels
    pub catalog: ModelCatalog,
    /// Model new panels start with; the first catalog entry when unset
    pub default_model: Option<String>,
    /// Overrides the default credential storage file
    pub storage_path: Option<PathBuf>,
    /// Vendor settings used by the relay server
    pub relay: RelayConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            catalog: ModelCatalog::default(),
            default_model: None,
            storage_path: None,
            relay: RelayConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    /// Defaults when the file does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)
            .map_err(|e| anyhow!("Invalid config file {:?}: {}", path, e))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Rewrite only `default_model` in the file at `path`, keeping the rest
    pub fn save_default_model(path: &Path, model: &str) -> Result<()> {
        let mut config = Self::load_from(path)?;
        config.default_model = Some(model.to_string());
        config.save_to(path)
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("tangent"))
    }

    pub fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }
}
