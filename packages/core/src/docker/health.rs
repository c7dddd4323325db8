//! HTTP health check against a containerized service

use super::DockerError;
use crate::server::HealthResponse;
use std::time::{Duration, Instant};
use tracing::debug;

/// Delay between health requests
const PROBE_INTERVAL: Duration = Duration::from_millis(250);

/// Per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// URL of the health endpoint on a loopback port
pub fn health_url(port: u16) -> String {
    format!("http://127.0.0.1:{port}/healthz")
}

/// Fetch `/healthz` once
pub async fn check_health(
    client: &reqwest::Client,
    port: u16,
) -> Result<HealthResponse, DockerError> {
    let response = client
        .get(health_url(port))
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await
        .map_err(|e| DockerError::Connection(format!("Health request failed: {e}")))?;

    if !response.status().is_success() {
        return Err(DockerError::Connection(format!(
            "Health endpoint returned {}",
            response.status()
        )));
    }

    response
        .json()
        .await
        .map_err(|e| DockerError::Connection(format!("Failed to decode health response: {e}")))
}

/// Poll `/healthz` until it answers or `deadline` passes
///
/// Returns the last error when the service never came up.
pub async fn wait_for_health(port: u16, deadline: Duration) -> Result<HealthResponse, DockerError> {
    let client = reqwest::Client::new();
    let started = Instant::now();
    loop {
        match check_health(&client, port).await {
            Ok(health) => return Ok(health),
            Err(e) if started.elapsed() >= deadline => return Err(e),
            Err(e) => {
                debug!("Service not healthy yet: {}", e);
                tokio::time::sleep(PROBE_INTERVAL).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::server::bind;

    #[test]
    fn health_url_uses_loopback() {
        assert_eq!(health_url(49153), "http://127.0.0.1:49153/healthz");
    }

    #[tokio::test]
    async fn wait_for_health_reads_live_service() {
        let mut config = Config::new();
        config.port = 0;
        let (addr, server) = bind(&config, std::future::pending()).unwrap();
        tokio::spawn(server);

        let health = wait_for_health(addr.port(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.version, crate::get_version());
    }

    #[tokio::test]
    async fn wait_for_health_gives_up_after_deadline() {
        // Bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = wait_for_health(port, Duration::from_millis(300))
            .await
            .unwrap_err();
        assert!(matches!(err, DockerError::Connection(_)));
    }
}
