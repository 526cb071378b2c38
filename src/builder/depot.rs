//! Remote builds with Depot
//!
//! `depot build` takes buildx-compatible flags and runs on Depot's
//! builders. It pushes directly when asked, otherwise it loads the result
//! into the local engine.

use crate::builder::backend::{BuildBackend, BuildRequest};
use crate::builder::process::{run_streaming, Invocation};
use crate::error::KilnResult;
use async_trait::async_trait;

/// `depot build` backend
pub struct DepotBackend {
    project: Option<String>,
}

impl DepotBackend {
    /// Create a Depot backend, optionally pinned to a project id
    pub fn new(project: Option<String>) -> Self {
        Self { project }
    }

    /// Arguments for `depot` that build (and optionally push) the image
    pub fn build_args(&self, request: &BuildRequest) -> Vec<String> {
        let mut args: Vec<String> = vec!["build".into()];

        if let Some(ref project) = self.project {
            args.push("--project".into());
            args.push(project.clone());
        }

        args.push("--platform".into());
        args.push(request.platform.clone());
        args.push("--file".into());
        args.push("-".into());

        for tag in request.tags() {
            args.push("--tag".into());
            args.push(tag.to_string());
        }

        for source in &request.cache_from {
            args.push("--cache-from".into());
            args.push(source.clone());
        }

        for label in request.label_args() {
            args.push("--label".into());
            args.push(label);
        }

        args.push("--progress".into());
        args.push(request.progress.as_str().into());
        args.push(if request.push { "--push" } else { "--load" }.into());
        args.push(".".into());

        args
    }
}

#[async_trait]
impl BuildBackend for DepotBackend {
    fn name(&self) -> &'static str {
        "Depot"
    }

    fn program(&self) -> &'static str {
        "depot"
    }

    fn install_hint(&self) -> &'static str {
        "Install the depot CLI: https://depot.dev/docs/cli/installation"
    }

    fn pushes_during_build(&self, request: &BuildRequest) -> bool {
        request.push
    }

    async fn build(
        &self,
        request: &BuildRequest,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> KilnResult<()> {
        let invocation = Invocation::new("depot", self.build_args(request), &request.context_dir)
            .stdin(request.dockerfile.clone());
        run_streaming(&invocation, on_output).await
    }
}
