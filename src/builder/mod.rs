//! External image builders
//!
//! Each backend turns a [`BuildRequest`] into one invocation of an
//! external tool:
//! - buildx: local `docker buildx build`, then `docker tag`/`docker push`
//! - cloud-build: `gcloud builds submit` with a staged build config
//! - depot: `depot build` on a remote builder

mod backend;
mod buildx;
mod cloud_build;
mod depot;
mod process;

pub use backend::{BuildBackend, BuildRequest};
pub use buildx::BuildxBackend;
pub use cloud_build::CloudBuildBackend;
pub use depot::DepotBackend;
pub use process::{check_tool, run_streaming, Invocation};

use crate::config::{BackendKind, Settings};

/// Create the backend for `kind`, configured from global settings
pub fn create_backend(kind: BackendKind, settings: &Settings) -> Box<dyn BuildBackend> {
    match kind {
        BackendKind::Buildx => Box::new(BuildxBackend::new()),
        BackendKind::CloudBuild => Box::new(CloudBuildBackend::new(
            settings.cloud_build.region.clone(),
            non_empty(&settings.cloud_build.project),
        )),
        BackendKind::Depot => Box::new(DepotBackend::new(non_empty(&settings.depot.project))),
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_backend_by_kind() {
        let settings = Settings::default();
        assert_eq!(create_backend(BackendKind::Buildx, &settings).name(), "docker buildx");
        assert_eq!(create_backend(BackendKind::CloudBuild, &settings).name(), "Cloud Build");
        assert_eq!(create_backend(BackendKind::Depot, &settings).name(), "Depot");
    }
}
