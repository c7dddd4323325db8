//! Short-lived containers used to exercise a built image
//!
//! Every helper here creates a uniquely named container, drives it, and
//! removes it again, including on failure.

use super::dockerfile::SERVICE_PORT;
use super::health::wait_for_health;
use super::{DockerClient, DockerError};
use crate::config::ENV_BIND;
use crate::server::HealthResponse;
use bollard::models::ContainerCreateBody;
use bollard::query_parameters::{
    CreateContainerOptions, DownloadFromContainerOptionsBuilder, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions, WaitContainerOptions,
};
use bollard::service::{HostConfig, PortBinding, PortMap};
use bytes::BytesMut;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::pin::pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Name prefix for containers created by this module
pub const CONTAINER_PREFIX: &str = "drone-riot-conv-check";

/// Seconds Docker waits after SIGTERM before SIGKILL
pub const DEFAULT_STOP_TIMEOUT_SECS: i64 = 10;

/// How long the default command gets to start answering health checks
const STARTUP_DEADLINE: Duration = Duration::from_secs(15);

static CONTAINER_SEQ: AtomicU64 = AtomicU64::new(0);

fn unique_container_name() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let seq = CONTAINER_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{CONTAINER_PREFIX}-{}-{nanos}-{seq}", std::process::id())
}

/// What to run
#[derive(Debug, Clone, Default)]
pub struct ContainerSpec {
    pub image: String,
    /// Replaces the image CMD; the ENTRYPOINT stays in place
    pub cmd: Option<Vec<String>>,
    pub env: Vec<String>,
    /// Publish the service port on an ephemeral loopback port
    pub publish_service_port: bool,
}

impl ContainerSpec {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Default::default()
        }
    }

    pub fn with_env(mut self, entry: impl Into<String>) -> Self {
        self.env.push(entry.into());
        self
    }

    pub fn publish_service_port(mut self) -> Self {
        self.publish_service_port = true;
        self
    }
}

fn service_port_key() -> String {
    format!("{SERVICE_PORT}/tcp")
}

/// Create (but do not start) a container; returns its name
pub async fn create_container(
    client: &DockerClient,
    spec: &ContainerSpec,
) -> Result<String, DockerError> {
    let name = unique_container_name();
    debug!("Creating container {} from {}", name, spec.image);

    let mut host_config = HostConfig {
        auto_remove: Some(false),
        ..Default::default()
    };
    let mut exposed_ports = None;
    if spec.publish_service_port {
        let mut port_bindings: PortMap = HashMap::new();
        // Empty host port lets Docker pick a free one
        port_bindings.insert(
            service_port_key(),
            Some(vec![PortBinding {
                host_ip: Some("127.0.0.1".to_string()),
                host_port: Some(String::new()),
            }]),
        );
        host_config.port_bindings = Some(port_bindings);
        exposed_ports = Some(vec![service_port_key()]);
    }

    let config = ContainerCreateBody {
        image: Some(spec.image.clone()),
        cmd: spec.cmd.clone(),
        env: if spec.env.is_empty() {
            None
        } else {
            Some(spec.env.clone())
        },
        exposed_ports,
        host_config: Some(host_config),
        ..Default::default()
    };

    let options = CreateContainerOptions {
        name: Some(name.clone()),
        platform: String::new(),
    };

    let response = client
        .inner()
        .create_container(Some(options), config)
        .await
        .map_err(|e| DockerError::Container(format!("Failed to create container: {e}")))?;

    debug!("Container {} created with ID: {}", name, response.id);
    Ok(name)
}

/// Start an existing container
pub async fn start_container(client: &DockerClient, name: &str) -> Result<(), DockerError> {
    debug!("Starting container: {}", name);

    client
        .inner()
        .start_container(name, None::<StartContainerOptions>)
        .await
        .map_err(|e| DockerError::Container(format!("Failed to start container {name}: {e}")))?;

    Ok(())
}

/// Stop a running container, escalating to SIGKILL after `timeout_secs`
pub async fn stop_container(
    client: &DockerClient,
    name: &str,
    timeout_secs: i64,
) -> Result<(), DockerError> {
    debug!("Stopping container {} with {}s timeout", name, timeout_secs);

    let options = StopContainerOptions {
        signal: None,
        t: Some(timeout_secs as i32),
    };

    match client.inner().stop_container(name, Some(options)).await {
        Ok(()) => Ok(()),
        // Already stopped
        Err(bollard::errors::Error::DockerResponseServerError {
            status_code: 304, ..
        }) => Ok(()),
        Err(e) => Err(DockerError::Container(format!(
            "Failed to stop container {name}: {e}"
        ))),
    }
}

/// Remove a container; a missing container is not an error
pub async fn remove_container(
    client: &DockerClient,
    name: &str,
    force: bool,
) -> Result<(), DockerError> {
    debug!("Removing container {} (force={})", name, force);

    let options = RemoveContainerOptions {
        force,
        v: true,
        link: false,
    };

    match client.inner().remove_container(name, Some(options)).await {
        Ok(()) => Ok(()),
        Err(bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        }) => Ok(()),
        Err(e) => Err(DockerError::Container(format!(
            "Failed to remove container {name}: {e}"
        ))),
    }
}

/// Remove a container, logging instead of failing
async fn cleanup(client: &DockerClient, name: &str) {
    if let Err(e) = remove_container(client, name, true).await {
        warn!("Leaving container {} behind: {}", name, e);
    }
}

/// Block until the container exits and return its exit code
pub async fn wait_for_exit(client: &DockerClient, name: &str) -> Result<i64, DockerError> {
    let mut stream = pin!(
        client
            .inner()
            .wait_container(name, None::<WaitContainerOptions>)
    );

    match stream.next().await {
        Some(Ok(response)) => Ok(response.status_code),
        // bollard reports non-zero exits as an error carrying the code
        Some(Err(bollard::errors::Error::DockerContainerWaitError {
            code, ..
        })) => Ok(code),
        Some(Err(e)) => Err(DockerError::Container(format!(
            "Failed waiting for container {name}: {e}"
        ))),
        None => Err(DockerError::Container(format!(
            "No exit status received for container {name}"
        ))),
    }
}

/// Host port Docker assigned to the published service port
pub async fn published_service_port(
    client: &DockerClient,
    name: &str,
) -> Result<Option<u16>, DockerError> {
    let info = client
        .inner()
        .inspect_container(name, None)
        .await
        .map_err(|e| DockerError::Container(format!("Failed to inspect container {name}: {e}")))?;

    let port = info
        .network_settings
        .and_then(|settings| settings.ports)
        .and_then(|ports| ports.get(&service_port_key()).cloned())
        .flatten()
        .and_then(|bindings| bindings.into_iter().next())
        .and_then(|binding| binding.host_port)
        .and_then(|port| port.parse::<u16>().ok());
    Ok(port)
}

/// Run `cmd` (or the image default) to completion and return the exit code
pub async fn run_to_exit(
    client: &DockerClient,
    image: &str,
    cmd: Option<Vec<String>>,
) -> Result<i64, DockerError> {
    let spec = ContainerSpec {
        cmd,
        ..ContainerSpec::new(image)
    };
    let name = create_container(client, &spec).await?;

    let result = async {
        start_container(client, &name).await?;
        wait_for_exit(client, &name).await
    }
    .await;

    cleanup(client, &name).await;
    if let Ok(code) = &result {
        debug!("Container {} exited with {}", name, code);
    }
    result
}

/// Outcome of running the default command and stopping it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopReport {
    /// Health response received before the stop, if the service came up
    pub health: Option<HealthResponse>,
    pub exit_code: i64,
    pub elapsed: Duration,
    pub timeout: Duration,
}

impl StopReport {
    /// The process exited on SIGTERM before Docker escalated to SIGKILL
    pub fn stopped_gracefully(&self) -> bool {
        self.elapsed < self.timeout && self.exit_code != 137
    }
}

/// Start the image's default command, wait for it to serve, then stop it
/// and measure how long the shutdown took
pub async fn stop_and_measure(
    client: &DockerClient,
    image: &str,
    timeout_secs: i64,
) -> Result<StopReport, DockerError> {
    let spec = ContainerSpec::new(image)
        .with_env(format!("{ENV_BIND}=0.0.0.0"))
        .publish_service_port();
    let name = create_container(client, &spec).await?;

    let result = async {
        start_container(client, &name).await?;

        let health = match published_service_port(client, &name).await? {
            Some(port) => match wait_for_health(port, STARTUP_DEADLINE).await {
                Ok(health) => Some(health),
                Err(e) => {
                    warn!("Service in {} never became healthy: {}", name, e);
                    None
                }
            },
            None => {
                warn!("No published port for {}", name);
                None
            }
        };

        let started = Instant::now();
        stop_container(client, &name, timeout_secs).await?;
        let elapsed = started.elapsed();

        let info = client
            .inner()
            .inspect_container(&name, None)
            .await
            .map_err(|e| {
                DockerError::Container(format!("Failed to inspect container {name}: {e}"))
            })?;
        let exit_code = info.state.and_then(|s| s.exit_code).unwrap_or(-1);

        Ok(StopReport {
            health,
            exit_code,
            elapsed,
            timeout: Duration::from_secs(timeout_secs.max(0) as u64),
        })
    }
    .await;

    cleanup(client, &name).await;
    result
}

/// Read one regular file out of an image without starting a container
pub async fn read_file_from_image(
    client: &DockerClient,
    image: &str,
    path: &str,
) -> Result<Vec<u8>, DockerError> {
    let name = create_container(client, &ContainerSpec::new(image)).await?;

    let result = async {
        let options = DownloadFromContainerOptionsBuilder::new()
            .path(path)
            .build();
        let docker = client.inner();
        let mut stream = pin!(docker.download_from_container(&name, Some(options)));
        let mut archive = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                DockerError::Artifact(format!("Failed to copy {path} from {image}: {e}"))
            })?;
            archive.extend_from_slice(&chunk);
        }
        extract_single_file(&archive, path)
    }
    .await;

    cleanup(client, &name).await;
    result
}

/// Pull the file named like `path` out of a tar archive
///
/// Docker wraps a copied file in a tar stream whose single entry carries the
/// file's base name.
pub fn extract_single_file(archive: &[u8], path: &str) -> Result<Vec<u8>, DockerError> {
    let wanted = Path::new(path)
        .file_name()
        .ok_or_else(|| DockerError::Artifact(format!("{path} does not name a file")))?;

    let mut archive = tar::Archive::new(archive);
    let entries = archive.entries().map_err(|e| invalid_archive(path, e))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| invalid_archive(path, e))?;
        let is_match = entry
            .path()
            .map(|entry_path| entry_path.file_name() == Some(wanted))
            .unwrap_or(false);
        if !is_match {
            continue;
        }
        if !entry.header().entry_type().is_file() {
            return Err(DockerError::Artifact(format!(
                "{path} is not a regular file"
            )));
        }
        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .map_err(|e| DockerError::Artifact(format!("Failed to read {path}: {e}")))?;
        return Ok(contents);
    }

    Err(DockerError::Artifact(format!(
        "{path} not found in archive"
    )))
}

fn invalid_archive(path: &str, e: std::io::Error) -> DockerError {
    DockerError::Artifact(format!("Invalid archive for {path}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_path(name).unwrap();
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append(&header, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn extract_single_file_by_base_name() {
        let archive = archive_with(&[("drone-riot-conv", b"\x7fELF binary")]);
        let contents = extract_single_file(&archive, "/usr/bin/drone-riot-conv").unwrap();
        assert_eq!(contents, b"\x7fELF binary");
    }

    #[test]
    fn extract_single_file_missing_entry() {
        let archive = archive_with(&[("tini", b"other")]);
        let err = extract_single_file(&archive, "/usr/bin/drone-riot-conv").unwrap_err();
        assert!(matches!(err, DockerError::Artifact(msg) if msg.contains("not found")));
    }

    #[test]
    fn extract_single_file_corrupt_archive() {
        let archive = vec![0xff_u8; 1024];
        let err = extract_single_file(&archive, "/usr/bin/drone-riot-conv").unwrap_err();
        assert!(matches!(err, DockerError::Artifact(msg) if msg.starts_with("Invalid archive")));
    }

    #[test]
    fn extract_single_file_rejects_directory_path() {
        let archive = archive_with(&[]);
        assert!(extract_single_file(&archive, "/").is_err());
    }

    #[test]
    fn container_names_are_unique() {
        let a = unique_container_name();
        let b = unique_container_name();
        assert_ne!(a, b);
        assert!(a.starts_with(CONTAINER_PREFIX));
    }

    #[test]
    fn container_spec_builder() {
        let spec = ContainerSpec::new("drone-riot-conv:latest")
            .with_env("DRONE_RIOT_CONV_BIND=0.0.0.0")
            .publish_service_port();
        assert!(spec.cmd.is_none());
        assert_eq!(spec.env, vec!["DRONE_RIOT_CONV_BIND=0.0.0.0"]);
        assert!(spec.publish_service_port);
    }

    #[test]
    fn stop_report_graceful_only_before_timeout() {
        let timeout = Duration::from_secs(10);
        let graceful = StopReport {
            health: None,
            exit_code: 0,
            elapsed: Duration::from_millis(300),
            timeout,
        };
        assert!(graceful.stopped_gracefully());

        let killed = StopReport {
            health: None,
            exit_code: 137,
            elapsed: Duration::from_secs(10),
            timeout,
        };
        assert!(!killed.stopped_gracefully());
    }
}
