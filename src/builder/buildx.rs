//! Local builds with `docker buildx`
//!
//! The Dockerfile is piped on stdin and the image is loaded into the local
//! engine. Extra tags and pushes are separate `docker` invocations run
//! after the build succeeds.

use crate::builder::backend::{BuildBackend, BuildRequest};
use crate::builder::process::{check_tool, run_streaming, Invocation};
use crate::error::KilnResult;
use async_trait::async_trait;
use tracing::info;

/// `docker buildx build` backend
pub struct BuildxBackend;

impl BuildxBackend {
    /// Create a new buildx backend
    pub fn new() -> Self {
        Self
    }

    /// Arguments for `docker` that build the image
    pub fn build_args(request: &BuildRequest) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "buildx".into(),
            "build".into(),
            "--platform".into(),
            request.platform.clone(),
            "--file".into(),
            "-".into(),
            "--build-arg".into(),
            "BUILDKIT_INLINE_CACHE=1".into(),
        ];

        for source in &request.cache_from {
            args.push("--cache-from".into());
            args.push(registry_cache_ref(source));
        }

        if let Some(ref target) = request.cache_to {
            args.push("--cache-to".into());
            args.push(registry_cache_target(target));
        }

        for label in request.label_args() {
            args.push("--label".into());
            args.push(label);
        }

        args.push("--tag".into());
        args.push(request.image.clone());
        args.push("--progress".into());
        args.push(request.progress.as_str().into());
        args.push("--load".into());
        args.push(".".into());

        args
    }

    /// `docker` argument vectors run after a successful build: a `tag`
    /// for each extra tag, then a `push` of every tag when pushing
    pub fn publish_args(request: &BuildRequest) -> Vec<Vec<String>> {
        let mut steps: Vec<Vec<String>> = request
            .extra_tags
            .iter()
            .map(|tag| vec!["tag".into(), request.image.clone(), tag.clone()])
            .collect();

        if request.push {
            steps.extend(request.tags().map(|tag| vec!["push".into(), tag.to_string()]));
        }

        steps
    }

    fn docker(request: &BuildRequest, args: Vec<String>) -> Invocation {
        Invocation::new("docker", args, &request.context_dir)
    }
}

impl Default for BuildxBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// `ref` becomes `type=registry,ref=<ref>`; explicit cache specs pass through
pub fn registry_cache_ref(reference: &str) -> String {
    if reference.contains("type=") {
        reference.to_string()
    } else {
        format!("type=registry,ref={}", reference)
    }
}

fn registry_cache_target(reference: &str) -> String {
    if reference.contains("type=") {
        reference.to_string()
    } else {
        format!("type=registry,ref={},mode=max", reference)
    }
}

#[async_trait]
impl BuildBackend for BuildxBackend {
    fn name(&self) -> &'static str {
        "docker buildx"
    }

    fn program(&self) -> &'static str {
        "docker"
    }

    fn install_hint(&self) -> &'static str {
        "Install Docker with the buildx plugin: https://docs.docker.com/get-docker/"
    }

    fn pushes_during_build(&self, _request: &BuildRequest) -> bool {
        false
    }

    async fn is_available(&self) -> bool {
        check_tool("docker", &["--version"]).await
            && check_tool("docker", &["buildx", "version"]).await
    }

    async fn build(
        &self,
        request: &BuildRequest,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> KilnResult<()> {
        let invocation = Self::docker(request, Self::build_args(request))
            .env("DOCKER_BUILDKIT", "1")
            .stdin(request.dockerfile.clone());
        run_streaming(&invocation, on_output).await
    }

    async fn publish(
        &self,
        request: &BuildRequest,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> KilnResult<()> {
        for args in Self::publish_args(request) {
            if let [verb, tag] = args.as_slice() {
                if verb == "push" {
                    info!("Pushing {}", tag);
                }
            }
            run_streaming(&Self::docker(request, args), on_output).await?;
        }

        Ok(())
    }
}
