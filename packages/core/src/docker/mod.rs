//! Container packaging for drone-riot-conv
//!
//! Builds the two-stage image through the Docker API and runs short-lived
//! containers against it to check the entrypoint contract.

mod artifact;
mod build_log;
mod check;
mod client;
pub mod container;
mod context;
mod contract;
mod dockerfile;
mod error;
mod health;
pub mod image;
pub mod progress;

// Core types
pub use client::DockerClient;
pub use error::DockerError;
pub use progress::ProgressReporter;

// Dockerfile constants
pub use dockerfile::{
    BUILDER_ARTIFACT_PATH, BUILDER_STAGE, DOCKERFILE, IMAGE_NAME, IMAGE_TAG_DEFAULT, MAINTAINER,
    MAINTAINER_LABEL, RUNTIME_ARTIFACT_PATH, SERVICE_PORT, SUPERVISOR_PATH, image_reference,
};

// Build
pub use build_log::{BuildLog, ENV_BUILD_ERROR_TAIL, ENV_BUILD_LOG_TAIL};
pub use context::create_build_context;
pub use image::{build_image, image_exists, remove_image};

// Verification
pub use artifact::{ArtifactReport, compare_artifacts, sha256_hex, verify_artifact};
pub use check::{CheckResult, PROPAGATED_EXIT_CODES, all_passed, run_image_checks};
pub use container::{
    DEFAULT_STOP_TIMEOUT_SECS, StopReport, read_file_from_image, run_to_exit, stop_and_measure,
};
pub use contract::{RuntimeContract, inspect_runtime_contract};
pub use health::{check_health, wait_for_health};
