//! Dockerfile templating
//!
//! Renders a project's build settings into a Dockerfile and stages the
//! helper files it refers to.

pub mod generator;

pub use generator::{stage_file, Generator, RUNTIME_REQUIREMENTS, STAGING_DIR};

use sha2::{Digest, Sha256};

/// SHA-256 of the Dockerfile text, lowercase hex
pub fn fingerprint(dockerfile: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(dockerfile.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_sha256_hex() {
        assert_eq!(
            fingerprint(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn fingerprint_changes_with_content() {
        assert_ne!(fingerprint("FROM python:3.10"), fingerprint("FROM python:3.11"));
    }
}
