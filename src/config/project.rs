//! Project build configuration (`kiln.toml`)

use crate::config::cuda;
use crate::error::{KilnError, KilnResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name looked up when discovering a project
pub const PROJECT_FILE: &str = "kiln.toml";

/// Root of `kiln.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// What goes into the image
    pub build: BuildConfig,

    /// How the image is named and labelled
    pub image: ImageConfig,
}

/// Build environment of the model image
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Use a CUDA base image with a pyenv-installed Python
    pub gpu: bool,

    /// Python version ("3.10", "3.11.4")
    pub python_version: String,

    /// CUDA version, only meaningful with `gpu`
    pub cuda: Option<String>,

    /// apt packages
    pub system_packages: Vec<String>,

    /// pip requirement specifiers
    pub python_packages: Vec<String>,

    /// requirements.txt path relative to the project directory
    pub python_requirements: Option<String>,

    /// Shell commands, one RUN instruction each
    pub run: Vec<String>,

    /// Older name for `run`; appended after it
    pub pre_install: Vec<String>,

    /// Run the server inside the `worker` network namespace
    pub network_isolation: bool,

    /// Module started with `python -m` as the image command
    pub server_module: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            gpu: false,
            python_version: "3.10".to_string(),
            cuda: None,
            system_packages: vec![],
            python_packages: vec![],
            python_requirements: None,
            run: vec![],
            pre_install: vec![],
            network_isolation: true,
            server_module: "model_server.http".to_string(),
        }
    }
}

/// Image naming and metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Default image reference when none is given on the command line
    pub name: Option<String>,

    /// Extra image labels
    pub labels: BTreeMap<String, String>,
}

impl ProjectConfig {
    /// Parse a project config from TOML text
    pub fn parse(content: &str, path: &Path) -> KilnResult<Self> {
        toml::from_str(content).map_err(|e| KilnError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Load and parse a `kiln.toml`
    pub async fn load(path: &Path) -> KilnResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| KilnError::io(format!("reading {}", path.display()), e))?;
        Self::parse(&content, path)
    }

    /// Check field formats and resolve the CUDA version against the
    /// supported table. Returns the completed config.
    pub fn validate_and_complete(mut self) -> KilnResult<Self> {
        validate_python_version(&self.build.python_version)?;

        if self.build.gpu {
            let requested = self.build.cuda.as_deref();
            let resolved = cuda::resolve(requested)?;
            debug!(
                "CUDA {} resolved to {}",
                requested.unwrap_or("<default>"),
                resolved.version
            );
            self.build.cuda = Some(resolved.version.to_string());
        } else if let Some(ref version) = self.build.cuda {
            warn!("cuda = \"{}\" is ignored because gpu is disabled", version);
            self.build.cuda = None;
        }

        Ok(self)
    }

    /// pip requirements text for `python_packages`, one per line
    pub fn python_requirements_text(&self) -> String {
        let mut text = String::new();
        for package in &self.build.python_packages {
            let package = package.trim();
            if package.is_empty() {
                continue;
            }
            text.push_str(package);
            text.push('\n');
        }
        text
    }
}

/// Walk up from `start` looking for `kiln.toml`
pub fn find_project_config(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(PROJECT_FILE))
        .find(|candidate| candidate.is_file())
}

fn validate_python_version(version: &str) -> KilnResult<()> {
    let parts: Vec<&str> = version.split('.').collect();
    let valid = (2..=3).contains(&parts.len())
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));

    if valid {
        Ok(())
    } else {
        Err(KilnError::InvalidPythonVersion(version.to_string()))
    }
}
