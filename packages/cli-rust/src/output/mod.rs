//! Output utilities for CLI commands
//!
//! Actionable Docker error messages and table rendering for image checks.

pub mod errors;
pub mod tables;

pub use errors::format_docker_error_anyhow;
pub use tables::{artifact_table, check_table};
