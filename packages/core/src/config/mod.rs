//! Configuration loading
//!
//! The service is configured from (highest precedence first) command line
//! flags, `DRONE_RIOT_CONV_*` environment variables, a JSON (with comments)
//! config file and built-in defaults. Flags are applied by the CLI; this module
//! handles the rest.

pub mod paths;
pub mod schema;
pub mod validation;

pub use schema::Config;
pub use validation::{ValidationError, ValidationWarning, validate_config};

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Environment variable naming an explicit config file
pub const ENV_CONFIG: &str = "DRONE_RIOT_CONV_CONFIG";
/// Environment override for `bind`
pub const ENV_BIND: &str = "DRONE_RIOT_CONV_BIND";
/// Environment override for `port`
pub const ENV_PORT: &str = "DRONE_RIOT_CONV_PORT";
/// Environment override for `parallelism_max`
pub const ENV_PARALLELISM_MAX: &str = "DRONE_RIOT_CONV_PARALLELISM_MAX";

/// Errors raised while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid config in {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value '{value}' for {var}: {message}")]
    Env {
        var: String,
        value: String,
        message: String,
    },
}

/// Load the effective configuration
///
/// File resolution: `explicit` path, then `$DRONE_RIOT_CONV_CONFIG`, then the
/// default path if it exists. Environment overrides are applied afterwards.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    load_config_with(explicit, |var| std::env::var(var).ok())
}

/// [`load_config`] with an injectable environment lookup
pub fn load_config_with<F>(explicit: Option<&Path>, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let maybe_path = explicit
        .map(Path::to_path_buf)
        .or_else(|| lookup(ENV_CONFIG).map(PathBuf::from))
        .or_else(|| paths::get_config_path().filter(|path| path.exists()));

    let mut config = match maybe_path {
        Some(path) => load_config_from_file(&path)?,
        None => {
            debug!("No config file found, using defaults");
            Config::default()
        }
    };

    apply_env_overrides(&mut config, lookup)?;
    Ok(config)
}

/// Parse a config file (JSON with comments and trailing commas allowed)
pub fn load_config_from_file(path: &Path) -> Result<Config, ConfigError> {
    debug!("Loading config from {}", path.display());
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&text, path)
}

fn parse_config(text: &str, path: &Path) -> Result<Config, ConfigError> {
    let parse_options = jsonc_parser::ParseOptions::default();
    let value = jsonc_parser::parse_to_serde_value(text, &parse_options).map_err(|e| {
        ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    // An empty file is treated as an empty object
    let value = value.unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));
    serde_json::from_value(value).map_err(|source| ConfigError::Invalid {
        path: path.to_path_buf(),
        source,
    })
}

/// Apply `DRONE_RIOT_CONV_*` environment overrides
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(bind) = lookup(ENV_BIND) {
        config.bind = bind.trim().to_string();
    }
    if let Some(port) = lookup(ENV_PORT) {
        config.port = parse_env(ENV_PORT, &port)?;
    }
    if let Some(max) = lookup(ENV_PARALLELISM_MAX) {
        config.parallelism_max = parse_env(ENV_PARALLELISM_MAX, &max)?;
    }
    Ok(())
}

fn parse_env<T>(var: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        var: var.to_string(),
        value: value.to_string(),
        message: e.to_string(),
    })
}
