//! Verification that the runtime image carries the exact binary the builder
//! stage produced

use super::container::read_file_from_image;
use super::dockerfile::{BUILDER_ARTIFACT_PATH, BUILDER_STAGE, RUNTIME_ARTIFACT_PATH};
use super::image::build_image;
use super::progress::ProgressReporter;
use super::{DockerClient, DockerError};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;

/// Digest comparison of the builder and runtime copies of the binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactReport {
    pub builder_image: String,
    pub runtime_image: String,
    pub builder_digest: String,
    pub runtime_digest: String,
    pub builder_size: u64,
    pub runtime_size: u64,
}

impl ArtifactReport {
    pub fn identical(&self) -> bool {
        self.builder_digest == self.runtime_digest && self.builder_size == self.runtime_size
    }
}

/// Hex encoded SHA-256 of `bytes`
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Compare two copies of the binary
pub fn compare_artifacts(
    builder_image: &str,
    runtime_image: &str,
    builder_bytes: &[u8],
    runtime_bytes: &[u8],
) -> ArtifactReport {
    ArtifactReport {
        builder_image: builder_image.to_string(),
        runtime_image: runtime_image.to_string(),
        builder_digest: sha256_hex(builder_bytes),
        runtime_digest: sha256_hex(runtime_bytes),
        builder_size: builder_bytes.len() as u64,
        runtime_size: runtime_bytes.len() as u64,
    }
}

/// Build both stages and compare the binary they carry
///
/// The runtime build reuses the builder stage from the layer cache, so
/// `no_cache` only applies to the first build.
pub async fn verify_artifact(
    client: &DockerClient,
    source_dir: &Path,
    tag: Option<&str>,
    progress: &mut ProgressReporter,
    no_cache: bool,
) -> Result<ArtifactReport, DockerError> {
    let builder_image = build_image(
        client,
        source_dir,
        tag,
        Some(BUILDER_STAGE),
        progress,
        no_cache,
    )
    .await?;
    let runtime_image = build_image(client, source_dir, tag, None, progress, false).await?;

    let builder_bytes = read_file_from_image(client, &builder_image, BUILDER_ARTIFACT_PATH).await?;
    let runtime_bytes = read_file_from_image(client, &runtime_image, RUNTIME_ARTIFACT_PATH).await?;

    let report = compare_artifacts(
        &builder_image,
        &runtime_image,
        &builder_bytes,
        &runtime_bytes,
    );
    info!(
        identical = report.identical(),
        size = report.runtime_size,
        "Compared {} with {}",
        BUILDER_ARTIFACT_PATH,
        RUNTIME_ARTIFACT_PATH
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn identical_copies_match() {
        let report = compare_artifacts("a:builder", "a:latest", b"\x7fELF", b"\x7fELF");
        assert!(report.identical());
        assert_eq!(report.builder_size, 4);
    }

    #[test]
    fn differing_copies_do_not_match() {
        let report = compare_artifacts("a:builder", "a:latest", b"\x7fELF", b"\x7fELG");
        assert!(!report.identical());
        assert_ne!(report.builder_digest, report.runtime_digest);
    }
}
