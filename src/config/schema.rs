//! Global settings schema for Kiln
//!
//! Settings are stored at `~/.config/kiln/config.toml` and hold
//! user-level builder defaults. Per-project build settings live in
//! `kiln.toml` (see [`super::project`]).

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Root settings structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// General settings
    pub general: GeneralConfig,

    /// Builder defaults
    pub builder: BuilderConfig,

    /// Google Cloud Build settings
    pub cloud_build: CloudBuildConfig,

    /// Depot remote builder settings
    pub depot: DepotConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Which external tool performs the build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Local `docker buildx build`
    #[default]
    Buildx,
    /// `gcloud builds submit`
    CloudBuild,
    /// `depot build` remote builder
    Depot,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Buildx => "buildx",
            BackendKind::CloudBuild => "cloud-build",
            BackendKind::Depot => "depot",
        }
    }
}

/// BuildKit progress output mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProgressMode {
    #[default]
    Auto,
    Plain,
    Tty,
}

impl ProgressMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressMode::Auto => "auto",
            ProgressMode::Plain => "plain",
            ProgressMode::Tty => "tty",
        }
    }
}

/// Builder defaults, overridable per invocation from the command line
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Build backend
    pub backend: BackendKind,

    /// Target platform
    pub platform: String,

    /// Progress output mode passed to the build tool
    pub progress: ProgressMode,

    /// Image references used as cache sources
    pub cache_from: Vec<String>,

    /// Registry reference used as cache target (empty = none)
    pub cache_to: String,

    /// Push the image after a successful build
    pub push: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Buildx,
            platform: "linux/amd64".to_string(),
            progress: ProgressMode::Auto,
            cache_from: vec![],
            cache_to: String::new(),
            push: false,
        }
    }
}

/// Google Cloud Build settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudBuildConfig {
    /// Build region
    pub region: String,

    /// gcloud project (empty = gcloud's active project)
    pub project: String,
}

impl Default for CloudBuildConfig {
    fn default() -> Self {
        Self {
            region: "us-central1".to_string(),
            project: String::new(),
        }
    }
}

/// Depot remote builder settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DepotConfig {
    /// Depot project id (empty = depot.json discovery)
    pub project: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_serialize() {
        let settings = Settings::default();
        let toml = toml::to_string_pretty(&settings).unwrap();
        assert!(toml.contains("[general]"));
        assert!(toml.contains("[builder]"));
        assert!(toml.contains("backend = \"buildx\""));
    }

    #[test]
    fn settings_deserialize_empty() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings.builder.platform, "linux/amd64");
        assert_eq!(settings.cloud_build.region, "us-central1");
    }

    #[test]
    fn settings_deserialize_partial() {
        let toml = r#"
            [builder]
            backend = "cloud-build"
            progress = "plain"
        "#;
        let settings: Settings = toml::from_str(toml).unwrap();
        assert_eq!(settings.builder.backend, BackendKind::CloudBuild);
        assert_eq!(settings.builder.progress, ProgressMode::Plain);
        assert_eq!(settings.builder.platform, "linux/amd64"); // default preserved
    }

    #[test]
    fn unknown_backend_rejected() {
        let result: Result<Settings, _> = toml::from_str("[builder]\nbackend = \"kaniko\"");
        assert!(result.is_err());
    }
}
