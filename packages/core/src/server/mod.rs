//! Drone conversion extension HTTP service
//!
//! Drone posts the repository configuration to `POST /convert` and expects
//! the (possibly rewritten) configuration back. `GET /healthz` exists for
//! checks. Every error is answered with a JSON `{"message": ...}` body.

mod error;

pub use error::{ErrorResponse, ServiceError, handle_rejection};

use crate::config::Config;
use crate::convert::{ConvertOptions, convert};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use thiserror::Error;
use tracing::{debug, info, warn};
use warp::{Filter, Rejection, Reply};

/// Configuration payload exchanged with Drone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroneConfig {
    pub data: String,
}

/// Conversion request sent by Drone
///
/// Drone also sends `build` and `repo` objects, which are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ConvertRequest {
    pub config: DroneConfig,
}

/// Health check response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Errors that prevent the service from running
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("invalid listen address: {0}")]
    Address(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: warp::Error,
    },
}

/// Shared handler state
#[derive(Debug, Clone, Copy)]
pub struct ServiceState {
    pub options: ConvertOptions,
}

impl ServiceState {
    pub fn new(options: ConvertOptions) -> Self {
        Self { options }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(ConvertOptions {
            parallelism_max: config.parallelism_max,
        })
    }
}

fn with_state(
    state: ServiceState,
) -> impl Filter<Extract = (ServiceState,), Error = Infallible> + Clone {
    warp::any().map(move || state)
}

/// The complete route tree, including rejection recovery
///
/// Paths are matched before methods so an unknown path is a 404 rather than
/// a 405.
pub fn routes(
    state: ServiceState,
    max_body_bytes: u64,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let convert = warp::path("convert")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(max_body_bytes))
        .and(warp::body::json())
        .and(with_state(state))
        .and_then(convert_handler);

    let health = warp::path("healthz")
        .and(warp::path::end())
        .and(warp::get())
        .map(health_handler);

    convert.or(health).recover(handle_rejection)
}

async fn convert_handler(
    request: ConvertRequest,
    state: ServiceState,
) -> Result<impl Reply, Rejection> {
    info!("handling conversion request");

    let conversion = convert(&request.config.data, &state.options)
        .map_err(|e| warp::reject::custom(ServiceError::Convert(e)))?;

    debug!(
        "converted {} documents ({} expanded, {} passed through)",
        conversion.documents, conversion.expanded, conversion.passed_through
    );

    Ok(warp::reply::json(&DroneConfig {
        data: conversion.data,
    }))
}

fn health_handler() -> impl Reply {
    warp::reply::json(&HealthResponse {
        status: "ok".to_string(),
        version: crate::get_version().to_string(),
    })
}

/// Bind the service without starting it
///
/// Returns the bound address (useful with port 0) and the server future,
/// which completes once `shutdown` resolves and in-flight requests finish.
pub fn bind<F>(
    config: &Config,
    shutdown: F,
) -> Result<(SocketAddr, impl Future<Output = ()> + 'static), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = config.socket_addr().map_err(ServerError::Address)?;
    let state = ServiceState::from_config(config);

    warp::serve(routes(state, config.max_body_bytes))
        .try_bind_with_graceful_shutdown(addr, shutdown)
        .map_err(|source| ServerError::Bind { addr, source })
}

/// Run the service until `shutdown` resolves
pub async fn serve<F>(config: &Config, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("drone-riot-conv {} starting", crate::get_version());
    let (addr, server) = bind(config, shutdown)?;
    info!(
        "listening on http://{} (parallelism limit {})",
        addr, config.parallelism_max
    );

    server.await;

    info!("server stopped");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM
///
/// Under a PID 1 supervisor the container stop signal arrives as SIGTERM;
/// handling it lets the service exit 0 instead of dying by signal.
pub async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PARALLEL: &str = "kind: pipeline\nname: tests\ntype: docker\nparallelism: 2\n";

    fn test_routes() -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
        routes(ServiceState::new(ConvertOptions::default()), 64 * 1024)
    }

    fn message(body: &[u8]) -> String {
        let response: ErrorResponse = serde_json::from_slice(body).unwrap();
        response.message
    }

    #[tokio::test]
    async fn convert_expands_parallel_pipeline() {
        let response = warp::test::request()
            .method("POST")
            .path("/convert")
            .json(&json!({
                "build": {"number": 42},
                "repo": {"slug": "RIOT-OS/RIOT"},
                "config": {"data": PARALLEL}
            }))
            .reply(&test_routes())
            .await;

        assert_eq!(response.status(), 200);
        let config: DroneConfig = serde_json::from_slice(response.body()).unwrap();
        assert!(config.data.contains("name: tests-1"));
        assert!(config.data.contains("name: tests-2"));
        assert!(!config.data.contains("parallelism"));
    }

    #[tokio::test]
    async fn convert_passes_through_plain_config() {
        let data = "kind: pipeline\nname: build\ntype: docker\n";
        let response = warp::test::request()
            .method("POST")
            .path("/convert")
            .json(&json!({"config": {"data": data}}))
            .reply(&test_routes())
            .await;

        assert_eq!(response.status(), 200);
        let config: DroneConfig = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(config.data, data);
    }

    #[tokio::test]
    async fn convert_rejects_invalid_body() {
        let response = warp::test::request()
            .method("POST")
            .path("/convert")
            .header("content-type", "application/json")
            .body(r#"{"config": 5}"#)
            .reply(&test_routes())
            .await;

        assert_eq!(response.status(), 400);
        assert_eq!(message(response.body()), "Invalid Body");
    }

    #[tokio::test]
    async fn convert_rejects_oversized_body() {
        let routes = routes(ServiceState::new(ConvertOptions::default()), 16);
        let response = warp::test::request()
            .method("POST")
            .path("/convert")
            .json(&json!({"config": {"data": PARALLEL}}))
            .reply(&routes)
            .await;

        assert_eq!(response.status(), 413);
        assert_eq!(message(response.body()), "Payload Too Large");
    }

    #[tokio::test]
    async fn convert_rejects_get() {
        let response = warp::test::request()
            .method("GET")
            .path("/convert")
            .reply(&test_routes())
            .await;

        assert_eq!(response.status(), 405);
        assert_eq!(message(response.body()), "Method Not Allowed");
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let response = warp::test::request()
            .method("GET")
            .path("/nope")
            .reply(&test_routes())
            .await;

        assert_eq!(response.status(), 404);
        assert_eq!(message(response.body()), "Not Found");
    }

    #[tokio::test]
    async fn health_reports_version() {
        let response = warp::test::request()
            .method("GET")
            .path("/healthz")
            .reply(&test_routes())
            .await;

        assert_eq!(response.status(), 200);
        let health: HealthResponse = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.version, crate::get_version());
    }

    #[tokio::test]
    async fn bind_rejects_invalid_address() {
        let config = Config {
            bind: "localhost".to_string(),
            ..Config::default()
        };
        let result = bind(&config, async {});
        assert!(matches!(result, Err(ServerError::Address(_))));
    }

    #[tokio::test]
    async fn serves_over_tcp_and_shuts_down_gracefully() {
        let config = Config {
            port: 0,
            ..Config::default()
        };
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let (addr, server) = bind(&config, async {
            let _ = rx.await;
        })
        .unwrap();
        let handle = tokio::spawn(server);

        let response = reqwest::Client::new()
            .post(format!("http://{addr}/convert"))
            .json(&json!({"config": {"data": PARALLEL}}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        let config: DroneConfig = response.json().await.unwrap();
        assert!(config.data.contains("tests-2"));

        tx.send(()).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("server should stop after shutdown signal")
            .unwrap();
    }
}
