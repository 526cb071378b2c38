//! Image build orchestration
//!
//! Ties generation and building together: validate the project config,
//! render the Dockerfile, hand it to a backend, publish, and always remove
//! the staging directory afterwards.

use crate::builder::{BuildBackend, BuildRequest};
use crate::config::{BackendKind, ProgressMode, ProjectConfig, Settings};
use crate::dockerfile::{fingerprint, Generator};
use crate::error::{KilnError, KilnResult};
use chrono::{SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Label prefix for metadata kiln attaches to images
pub const LABEL_PREFIX: &str = "run.kiln";

/// Per-invocation build settings
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Image reference; falls back to `[image].name`, then a derived name
    pub image: Option<String>,
    pub extra_tags: Vec<String>,
    pub backend: BackendKind,
    pub platform: String,
    pub cache_from: Vec<String>,
    pub cache_to: Option<String>,
    pub progress: ProgressMode,
    pub push: bool,
}

impl BuildOptions {
    /// Options seeded from global builder settings
    pub fn from_settings(settings: &Settings) -> Self {
        let builder = &settings.builder;
        let cache_to = builder.cache_to.trim();
        Self {
            image: None,
            extra_tags: vec![],
            backend: builder.backend,
            platform: builder.platform.clone(),
            cache_from: builder.cache_from.clone(),
            cache_to: (!cache_to.is_empty()).then(|| cache_to.to_string()),
            progress: builder.progress,
            push: builder.push,
        }
    }
}

/// A generated Dockerfile and its fingerprint
#[derive(Debug, Clone)]
pub struct Generated {
    pub dockerfile: String,
    pub fingerprint: String,
}

/// Result of a successful build
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub image: String,
    pub extra_tags: Vec<String>,
    pub dockerfile: String,
    pub fingerprint: String,
    pub pushed: bool,
}

/// Render the Dockerfile for a project without building it
pub async fn generate(config: &ProjectConfig, dir: &Path) -> KilnResult<Generated> {
    let config = config.clone().validate_and_complete()?;

    let generator = Generator::new(&config, dir)
        .await
        .map_err(KilnError::during("create Dockerfile generator"))?;

    let result = generator.generate().await;
    cleanup(&generator).await;

    let dockerfile = result.map_err(KilnError::during("generate Dockerfile"))?;
    let fingerprint = fingerprint(&dockerfile);
    Ok(Generated {
        dockerfile,
        fingerprint,
    })
}

/// Generate the Dockerfile and build it with `backend`.
///
/// Tool output goes to `on_output` line by line.
pub async fn build(
    config: &ProjectConfig,
    dir: &Path,
    options: &BuildOptions,
    backend: &dyn BuildBackend,
    on_output: &(dyn Fn(String) + Send + Sync),
) -> KilnResult<BuildOutcome> {
    let config = config.clone().validate_and_complete()?;

    let generator = Generator::new(&config, dir)
        .await
        .map_err(KilnError::during("create Dockerfile generator"))?;

    let result = match generator.generate().await {
        Ok(dockerfile) => {
            build_with(&generator, &config, dockerfile, options, backend, on_output).await
        }
        Err(e) => Err(KilnError::during("generate Dockerfile")(e)),
    };
    cleanup(&generator).await;
    result
}

/// Build a Dockerfile produced earlier by `kiln generate`.
///
/// The Dockerfile is built as given. The project's helper files are staged
/// again so `COPY .kiln/tmp/build/...` instructions resolve; a Dockerfile
/// that no longer matches `kiln.toml` is built anyway with a warning.
pub async fn build_from_dockerfile(
    config: &ProjectConfig,
    dir: &Path,
    dockerfile: String,
    options: &BuildOptions,
    backend: &dyn BuildBackend,
    on_output: &(dyn Fn(String) + Send + Sync),
) -> KilnResult<BuildOutcome> {
    let config = config.clone().validate_and_complete()?;

    let generator = Generator::new(&config, dir)
        .await
        .map_err(KilnError::during("create Dockerfile generator"))?;

    let result = match generator.generate().await {
        Ok(current) => {
            if current != dockerfile {
                warn!("Dockerfile differs from what kiln.toml generates; building it as given");
            }
            build_with(&generator, &config, dockerfile, options, backend, on_output).await
        }
        Err(e) => Err(KilnError::during("stage build files")(e)),
    };
    cleanup(&generator).await;
    result
}

async fn build_with(
    generator: &Generator<'_>,
    config: &ProjectConfig,
    dockerfile: String,
    options: &BuildOptions,
    backend: &dyn BuildBackend,
    on_output: &(dyn Fn(String) + Send + Sync),
) -> KilnResult<BuildOutcome> {
    let fingerprint = fingerprint(&dockerfile);
    debug!("Dockerfile fingerprint: {}", fingerprint);

    let image = resolve_image_name(options.image.as_deref(), config, generator.dir(), &fingerprint);
    let labels = image_labels(config, &fingerprint);

    let request = BuildRequest {
        context_dir: generator.dir().to_path_buf(),
        dockerfile,
        staging_dir: generator.staging_dir().to_path_buf(),
        image,
        extra_tags: options.extra_tags.clone(),
        platform: options.platform.clone(),
        cache_from: options.cache_from.clone(),
        cache_to: options.cache_to.clone(),
        progress: options.progress,
        push: options.push,
        labels,
    };

    if request.cache_to.is_some() && options.backend != BackendKind::Buildx {
        warn!("cache_to is only supported by the buildx backend; ignoring it");
    }
    if !request.push && backend.pushes_during_build(&request) {
        info!("{} pushes images as part of the build", backend.name());
    }

    backend
        .ensure_ready()
        .await
        .map_err(KilnError::during("prepare build backend"))?;

    info!("Building {} with {}", request.image, backend.name());
    backend
        .build(&request, on_output)
        .await
        .map_err(KilnError::during("build image"))?;

    backend
        .publish(&request, on_output)
        .await
        .map_err(KilnError::during("publish image"))?;

    let pushed = request.push || backend.pushes_during_build(&request);
    Ok(BuildOutcome {
        image: request.image,
        extra_tags: request.extra_tags,
        dockerfile: request.dockerfile,
        fingerprint,
        pushed,
    })
}

async fn cleanup(generator: &Generator<'_>) {
    if let Err(e) = generator.cleanup().await {
        warn!("Error cleaning up build staging directory: {}", e);
    }
}

/// Pick the image reference: explicit, then project default, then a
/// name derived from the directory and tagged with the fingerprint.
pub fn resolve_image_name(
    explicit: Option<&str>,
    config: &ProjectConfig,
    dir: &Path,
    fingerprint: &str,
) -> String {
    if let Some(image) = explicit.map(str::trim).filter(|s| !s.is_empty()) {
        return image.to_string();
    }
    if let Some(image) = config
        .image
        .name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return image.to_string();
    }

    let dir_name = dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    format!(
        "kiln-{}:{}",
        sanitize_repository(&dir_name),
        &fingerprint[..12.min(fingerprint.len())]
    )
}

/// Lowercase and replace characters not allowed in a repository name
fn sanitize_repository(name: &str) -> String {
    let mapped: String = name
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();

    let trimmed = mapped.trim_matches(|c: char| !c.is_ascii_alphanumeric());
    if trimmed.is_empty() {
        "model".to_string()
    } else {
        trimmed.to_string()
    }
}

/// User labels plus kiln metadata; kiln's keys win on conflict
pub fn image_labels(config: &ProjectConfig, fingerprint: &str) -> BTreeMap<String, String> {
    let mut labels = config.image.labels.clone();
    labels.insert(
        format!("{LABEL_PREFIX}.version"),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    labels.insert(
        format!("{LABEL_PREFIX}.dockerfile-sha256"),
        fingerprint.to_string(),
    );
    labels.insert(format!("{LABEL_PREFIX}.has_init"), "true".to_string());
    labels.insert(
        "org.opencontainers.image.created".to_string(),
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    );
    labels
}
