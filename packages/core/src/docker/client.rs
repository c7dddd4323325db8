//! Docker client wrapper

use super::DockerError;
use bollard::Docker;
use tracing::debug;

/// Connection to the local Docker daemon
pub struct DockerClient {
    inner: Docker,
}

impl DockerClient {
    /// Create a client using the local defaults (`DOCKER_HOST` or the unix socket)
    ///
    /// Does not contact the daemon; see [`DockerClient::connect`].
    pub fn new() -> Result<Self, DockerError> {
        let inner = Docker::connect_with_local_defaults().map_err(DockerError::from)?;
        Ok(Self { inner })
    }

    /// Create a client and verify the daemon answers
    pub async fn connect() -> Result<Self, DockerError> {
        let client = Self::new()?;
        client.verify_connection().await?;
        Ok(client)
    }

    /// Ping the daemon
    pub async fn verify_connection(&self) -> Result<(), DockerError> {
        debug!("Pinging Docker daemon");
        self.inner.ping().await.map_err(DockerError::from)?;
        Ok(())
    }

    /// Underlying bollard client
    pub fn inner(&self) -> &Docker {
        &self.inner
    }
}
