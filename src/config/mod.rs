//! Configuration management for Kiln
//!
//! Two files are involved: global builder settings under the user's
//! config directory, and the per-project `kiln.toml`.

pub mod cuda;
pub mod project;
pub mod schema;

pub use project::{find_project_config, ProjectConfig, PROJECT_FILE};
pub use schema::{BackendKind, ProgressMode, Settings};

use crate::error::{KilnError, KilnResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Global settings manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kiln")
            .join("config.toml")
    }

    /// Load settings, falling back to defaults if the file does not exist
    pub async fn load(&self) -> KilnResult<Settings> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Settings::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load settings from a specific file
    pub async fn load_from_file(&self, path: &Path) -> KilnResult<Settings> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| KilnError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| KilnError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save settings to file
    pub async fn save(&self, settings: &Settings) -> KilnResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(settings)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            KilnError::io(format!("writing config to {}", self.config_path.display()), e)
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    async fn ensure_config_dir(&self) -> KilnResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| KilnError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// A discovered project: its directory and parsed `kiln.toml`
#[derive(Debug, Clone)]
pub struct Project {
    pub dir: PathBuf,
    pub config: ProjectConfig,
}

impl Project {
    /// Locate `kiln.toml` at or above `start` and load it
    pub async fn discover(start: &Path) -> KilnResult<Self> {
        let path = find_project_config(start)
            .ok_or_else(|| KilnError::ProjectConfigNotFound(start.to_path_buf()))?;
        debug!("Found project config: {}", path.display());

        let config = ProjectConfig::load(&path).await?;
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| start.to_path_buf());

        Ok(Self { dir, config })
    }
}
