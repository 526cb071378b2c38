//! Remote builds with Google Cloud Build
//!
//! `gcloud builds submit` uploads the build context, so the Dockerfile and
//! a build config are staged inside it. Cloud Build pushes every image
//! listed in the config, so there is no separate publish step.

use crate::builder::backend::{BuildBackend, BuildRequest};
use crate::builder::process::{run_streaming, Invocation};
use crate::dockerfile::stage_file;
use crate::error::KilnResult;
use async_trait::async_trait;
use serde_json::json;

const DOCKER_BUILDER_IMAGE: &str = "gcr.io/cloud-builders/docker";

/// `gcloud builds submit` backend
pub struct CloudBuildBackend {
    region: String,
    project: Option<String>,
}

impl CloudBuildBackend {
    /// Create a Cloud Build backend for a region and optional project
    pub fn new(region: String, project: Option<String>) -> Self {
        Self { region, project }
    }

    /// Cloud Build config with a single docker build step
    pub fn build_config(request: &BuildRequest, dockerfile_path: &str) -> serde_json::Value {
        let mut args: Vec<String> = vec![
            "build".into(),
            "--platform".into(),
            request.platform.clone(),
            "-f".into(),
            dockerfile_path.to_string(),
            "--build-arg".into(),
            "BUILDKIT_INLINE_CACHE=1".into(),
        ];

        for tag in request.tags() {
            args.push("-t".into());
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

        args.push(".".into());

        let images: Vec<&str> = request.tags().collect();

        json!({
            "steps": [{
                "name": DOCKER_BUILDER_IMAGE,
                "env": ["DOCKER_BUILDKIT=1"],
                "args": args,
            }],
            "images": images,
        })
    }

    /// Arguments for `gcloud` that submit the build
    pub fn submit_args(&self, config_path: &str) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "builds".into(),
            "submit".into(),
            "--region".into(),
            self.region.clone(),
        ];

        if let Some(ref project) = self.project {
            args.push("--project".into());
            args.push(project.clone());
        }

        args.push("--config".into());
        args.push(config_path.to_string());
        args.push(".".into());
        args
    }
}

#[async_trait]
impl BuildBackend for CloudBuildBackend {
    fn name(&self) -> &'static str {
        "Cloud Build"
    }

    fn program(&self) -> &'static str {
        "gcloud"
    }

    fn install_hint(&self) -> &'static str {
        "Install the Google Cloud SDK: https://cloud.google.com/sdk/docs/install"
    }

    fn pushes_during_build(&self, _request: &BuildRequest) -> bool {
        true
    }

    async fn build(
        &self,
        request: &BuildRequest,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> KilnResult<()> {
        let dockerfile_path =
            stage_file(&request.staging_dir, "Dockerfile", request.dockerfile.as_bytes()).await?;

        let config = Self::build_config(request, &dockerfile_path);
        let config_path = stage_file(
            &request.staging_dir,
            "cloudbuild.json",
            &serde_json::to_vec_pretty(&config)?,
        )
        .await?;

        let invocation = Invocation::new("gcloud", self.submit_args(&config_path), &request.context_dir);
        run_streaming(&invocation, on_output).await
    }
}
