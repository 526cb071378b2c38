//! Supported CUDA versions and their base images

use crate::error::{KilnError, KilnResult};

/// CUDA version used when `gpu = true` and none is given
pub const DEFAULT_CUDA: &str = "12.1";

/// A supported CUDA release and its `nvidia/cuda` image tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CudaRelease {
    pub version: &'static str,
    pub image_tag: &'static str,
}

/// Newest first.
pub const CUDA_RELEASES: &[CudaRelease] = &[
    CudaRelease {
        version: "12.4",
        image_tag: "12.4.1-cudnn-devel-ubuntu22.04",
    },
    CudaRelease {
        version: "12.1",
        image_tag: "12.1.1-cudnn8-devel-ubuntu22.04",
    },
    CudaRelease {
        version: "11.8",
        image_tag: "11.8.0-cudnn8-devel-ubuntu22.04",
    },
    CudaRelease {
        version: "11.7",
        image_tag: "11.7.1-cudnn8-devel-ubuntu22.04",
    },
];

impl CudaRelease {
    /// Full base image reference
    pub fn base_image(&self) -> String {
        format!("nvidia/cuda:{}", self.image_tag)
    }
}

/// Resolve a requested CUDA version against the supported table.
///
/// `None` gives the default. `"12"` gives the newest 12.x.
/// `"11.8.0"` matches on major.minor.
pub fn resolve(requested: Option<&str>) -> KilnResult<CudaRelease> {
    let requested = requested.map(str::trim).unwrap_or(DEFAULT_CUDA);
    let parts: Vec<&str> = requested.split('.').collect();

    let found = match parts.as_slice() {
        [major] => CUDA_RELEASES
            .iter()
            .find(|r| r.version.split('.').next() == Some(*major)),
        [major, minor] | [major, minor, _] => {
            let key = format!("{}.{}", major, minor);
            CUDA_RELEASES.iter().find(|r| r.version == key)
        }
        _ => None,
    };

    found.copied().ok_or_else(|| KilnError::UnsupportedCuda {
        version: requested.to_string(),
        supported: supported_versions(),
    })
}

fn supported_versions() -> String {
    CUDA_RELEASES
        .iter()
        .map(|r| r.version)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_resolves() {
        assert_eq!(resolve(None).unwrap().version, DEFAULT_CUDA);
    }

    #[test]
    fn exact_version() {
        let release = resolve(Some("11.8")).unwrap();
        assert_eq!(release.base_image(), "nvidia/cuda:11.8.0-cudnn8-devel-ubuntu22.04");
    }

    #[test]
    fn major_only_picks_newest() {
        assert_eq!(resolve(Some("12")).unwrap().version, "12.4");
        assert_eq!(resolve(Some("11")).unwrap().version, "11.8");
    }

    #[test]
    fn patch_version_matches_minor() {
        assert_eq!(resolve(Some("12.1.1")).unwrap().version, "12.1");
    }

    #[test]
    fn unknown_version_lists_supported() {
        let err = resolve(Some("10.2")).unwrap_err();
        match err {
            KilnError::UnsupportedCuda { version, supported } => {
                assert_eq!(version, "10.2");
                assert_eq!(supported, "12.4, 12.1, 11.8, 11.7");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
