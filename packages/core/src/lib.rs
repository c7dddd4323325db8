//! drone-riot-conv core library
//!
//! Shared functionality for the drone-riot-conv CLI:
//! - `convert`: Drone pipeline `parallelism` expansion
//! - `server`: the Drone conversion extension HTTP endpoint
//! - `config`: JSONC configuration with environment overrides
//! - `supervisor`: PID 1 signal forwarding and zombie reaping
//! - `docker`: image packaging and verification through the Docker API

pub mod config;
pub mod convert;
pub mod docker;
pub mod server;
pub mod supervisor;

pub use config::{Config, ConfigError, load_config};
pub use convert::{Conversion, ConvertError, ConvertOptions, convert};
pub use docker::{DockerClient, DockerError};
pub use server::{ServerError, serve, shutdown_signal};
pub use supervisor::{ChildExit, SupervisorError, SupervisorOptions};

/// Version of this crate, as reported by `/healthz` and `--version`
pub fn get_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
