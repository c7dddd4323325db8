//! Runtime image contract
//!
//! The runtime image must start the bare supervisor as its entrypoint with
//! the tool's absolute path as the default command, and declare no volumes.

use super::dockerfile::{MAINTAINER_LABEL, RUNTIME_ARTIFACT_PATH, SUPERVISOR_PATH};
use super::{DockerClient, DockerError};
use tracing::debug;

/// Entrypoint, command and metadata read from an image
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuntimeContract {
    pub entrypoint: Vec<String>,
    pub cmd: Vec<String>,
    pub maintainer: Option<String>,
    pub volume_count: usize,
}

impl RuntimeContract {
    /// The contract as declared by the embedded Dockerfile
    pub fn expected_entrypoint() -> Vec<String> {
        vec![SUPERVISOR_PATH.to_string(), "--".to_string()]
    }

    pub fn expected_cmd() -> Vec<String> {
        vec![RUNTIME_ARTIFACT_PATH.to_string()]
    }

    /// Every deviation, as a readable sentence; empty when the image conforms
    pub fn violations(&self) -> Vec<String> {
        let mut violations = Vec::new();

        if self.entrypoint != Self::expected_entrypoint() {
            violations.push(format!(
                "entrypoint is {:?}, expected {:?}",
                self.entrypoint,
                Self::expected_entrypoint()
            ));
        }
        if self.cmd != Self::expected_cmd() {
            violations.push(format!(
                "default command is {:?}, expected {:?}",
                self.cmd,
                Self::expected_cmd()
            ));
        }
        if self
            .maintainer
            .as_deref()
            .is_none_or(|maintainer| maintainer.trim().is_empty())
        {
            violations.push(format!("missing '{MAINTAINER_LABEL}' label"));
        }
        if self.volume_count > 0 {
            violations.push(format!("declares {} volume(s)", self.volume_count));
        }

        violations
    }
}

/// Read the runtime contract from a local image
pub async fn inspect_runtime_contract(
    client: &DockerClient,
    image: &str,
) -> Result<RuntimeContract, DockerError> {
    debug!("Inspecting runtime contract of {}", image);

    let inspect = client
        .inner()
        .inspect_image(image)
        .await
        .map_err(|e| DockerError::Image(format!("Failed to inspect image {image}: {e}")))?;

    let Some(config) = inspect.config else {
        return Ok(RuntimeContract::default());
    };

    Ok(RuntimeContract {
        entrypoint: config.entrypoint.unwrap_or_default(),
        cmd: config.cmd.unwrap_or_default(),
        maintainer: config
            .labels
            .and_then(|labels| labels.get(MAINTAINER_LABEL).cloned()),
        volume_count: config.volumes.map(|volumes| volumes.len()).unwrap_or(0),
    })
}
