//! Build backend abstraction
//!
//! A backend wraps one external build tool. It turns a [`BuildRequest`]
//! into an argument vector, runs it, and performs whatever publish steps
//! the tool does not do itself.

use crate::builder::process::check_tool;
use crate::config::ProgressMode;
use crate::error::{KilnError, KilnResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Everything a backend needs to build and publish one image
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Build context (the project directory)
    pub context_dir: PathBuf,
    /// Generated Dockerfile text
    pub dockerfile: String,
    /// Absolute staging directory inside the context
    pub staging_dir: PathBuf,
    /// Primary image reference
    pub image: String,
    /// Additional references for the same image
    pub extra_tags: Vec<String>,
    /// Target platform, e.g. `linux/amd64`
    pub platform: String,
    /// Cache source references
    pub cache_from: Vec<String>,
    /// Cache target reference
    pub cache_to: Option<String>,
    /// Progress output mode
    pub progress: ProgressMode,
    /// Push after building
    pub push: bool,
    /// Image labels
    pub labels: BTreeMap<String, String>,
}

impl BuildRequest {
    /// The primary image followed by the extra tags
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.image.as_str()).chain(self.extra_tags.iter().map(String::as_str))
    }

    /// Labels as `key=value` arguments
    pub fn label_args(&self) -> impl Iterator<Item = String> + '_ {
        self.labels.iter().map(|(k, v)| format!("{}={}", k, v))
    }
}

/// External build tool
#[async_trait]
pub trait BuildBackend: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &'static str;

    /// Executable invoked for builds
    fn program(&self) -> &'static str;

    /// Where to get the tool
    fn install_hint(&self) -> &'static str;

    /// Whether the tool pushes the image as part of the build
    fn pushes_during_build(&self, request: &BuildRequest) -> bool;

    /// Check that the tool is installed and runnable
    async fn is_available(&self) -> bool {
        check_tool(self.program(), &["--version"]).await
    }

    /// Fail with an install hint if the tool is unavailable
    async fn ensure_ready(&self) -> KilnResult<()> {
        if self.is_available().await {
            Ok(())
        } else {
            Err(KilnError::CliNotFound {
                name: self.program().to_string(),
                hint: self.install_hint().to_string(),
            })
        }
    }

    /// Run the build, streaming tool output to `on_output`
    async fn build(
        &self,
        request: &BuildRequest,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> KilnResult<()>;

    /// Follow-up steps after a successful build (tagging, pushing)
    async fn publish(
        &self,
        _request: &BuildRequest,
        _on_output: &(dyn Fn(String) + Send + Sync),
    ) -> KilnResult<()> {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn sample_request() -> BuildRequest {
    let mut labels = BTreeMap::new();
    labels.insert("team".to_string(), "ml".to_string());
    labels.insert("run.kiln.has_init".to_string(), "true".to_string());

    BuildRequest {
        context_dir: PathBuf::from("/work/model"),
        dockerfile: "FROM python:3.10".to_string(),
        staging_dir: PathBuf::from("/work/model/.kiln/tmp/build"),
        image: "registry.example.com/models/demo:v1".to_string(),
        extra_tags: vec!["registry.example.com/models/demo:latest".to_string()],
        platform: "linux/amd64".to_string(),
        cache_from: vec!["registry.example.com/models/demo:cache".to_string()],
        cache_to: None,
        progress: ProgressMode::Plain,
        push: false,
        labels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_lists_primary_first() {
        let request = sample_request();
        let tags: Vec<&str> = request.tags().collect();
        assert_eq!(
            tags,
            vec![
                "registry.example.com/models/demo:v1",
                "registry.example.com/models/demo:latest"
            ]
        );
    }

    #[test]
    fn label_args_are_sorted() {
        let request = sample_request();
        let labels: Vec<String> = request.label_args().collect();
        assert_eq!(labels, vec!["run.kiln.has_init=true", "team=ml"]);
    }
}
