//! Configuration validation with actionable error messages
//!
//! Validates the configuration and names the exact setting that fixes it.

use super::schema::{Config, validate_bind_address};
use console::{StyledObject, style};

/// Upper bound accepted for `parallelism_max`
pub const PARALLELISM_MAX_LIMIT: usize = 1024;

/// Smallest accepted `max_body_bytes`
pub const MIN_BODY_BYTES: u64 = 1024;

/// A setting that stops the service from starting
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    /// Env var or config entry that fixes it
    pub fix_hint: String,
}

/// A setting that works but is probably not what was meant
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub fix_hint: String,
}

fn invalid(field: &str, message: impl Into<String>, fix_hint: &str) -> ValidationError {
    ValidationError {
        field: field.to_string(),
        message: message.into(),
        fix_hint: fix_hint.to_string(),
    }
}

/// Check a loaded configuration
///
/// Stops at the first error. Warnings are collected and returned when the
/// configuration is otherwise usable.
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>, ValidationError> {
    validate_bind_address(&config.bind)
        .map_err(|msg| invalid("bind", msg, "DRONE_RIOT_CONV_BIND=127.0.0.1"))?;

    if config.port == 0 {
        return Err(invalid(
            "port",
            "port must be > 0",
            "DRONE_RIOT_CONV_PORT=3030",
        ));
    }

    if !(1..=PARALLELISM_MAX_LIMIT).contains(&config.parallelism_max) {
        return Err(invalid(
            "parallelism_max",
            format!("parallelism_max must be between 1 and {PARALLELISM_MAX_LIMIT}"),
            "DRONE_RIOT_CONV_PARALLELISM_MAX=64",
        ));
    }

    if config.max_body_bytes < MIN_BODY_BYTES {
        return Err(invalid(
            "max_body_bytes",
            format!("max_body_bytes must be >= {MIN_BODY_BYTES}"),
            "\"max_body_bytes\": 4194304",
        ));
    }

    let mut warnings = Vec::new();
    // Drone signs extension requests; signatures are not checked here
    if config.is_network_exposed() {
        warnings.push(ValidationWarning {
            field: "bind".to_string(),
            message: format!(
                "{} is reachable from the network and request signatures are not verified",
                config.bind
            ),
            fix_hint: "DRONE_RIOT_CONV_BIND=127.0.0.1".to_string(),
        });
    }

    Ok(warnings)
}

fn print_finding(heading: StyledObject<&str>, field: &str, message: &str, fix_hint: &str) {
    eprintln!();
    eprintln!("{heading}");
    eprintln!("  {} {field}: {message}", style("\u{2022}").dim());
    eprintln!("  {} {}", style("fix:").dim(), style(fix_hint).cyan());
    eprintln!();
}

/// Print an error to stderr
pub fn display_validation_error(error: &ValidationError) {
    print_finding(
        style("Invalid configuration").red().bold(),
        &error.field,
        &error.message,
        &error.fix_hint,
    );
}

/// Print a warning to stderr
pub fn display_validation_warning(warning: &ValidationWarning) {
    print_finding(
        style("Configuration warning").yellow().bold(),
        &warning.field,
        &warning.message,
        &warning.fix_hint,
    );
}
