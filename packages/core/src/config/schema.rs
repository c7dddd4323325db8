//! Configuration schema for drone-riot-conv
//!
//! Every setting has a default, so the service starts without a config file.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

use crate::convert::DEFAULT_PARALLELISM_MAX;

/// Main configuration structure for the conversion service
///
/// Serialized to/from `~/.config/drone-riot-conv/config.json`. Every field
/// has a default so the service starts without any file present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Bumped when a setting changes meaning
    #[serde(default = "default_version")]
    pub version: u32,

    /// Address the HTTP service binds to (default: "127.0.0.1")
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port the HTTP service listens on (default: 3030)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum instances generated per pipeline (default: 64)
    #[serde(default = "default_parallelism_max")]
    pub parallelism_max: usize,

    /// Largest accepted request body in bytes (default: 4 MiB)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: u64,

    /// tracing filter directive, used when RUST_LOG is unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
}

fn default_version() -> u32 {
    1
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3030
}

fn default_parallelism_max() -> usize {
    DEFAULT_PARALLELISM_MAX
}

fn default_max_body_bytes() -> u64 {
    4 * 1024 * 1024
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            bind: default_bind(),
            port: default_port(),
            parallelism_max: default_parallelism_max(),
            max_body_bytes: default_max_body_bytes(),
            log_filter: None,
        }
    }
}

impl Config {
    /// Create a new Config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Socket address the service listens on
    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        let ip: IpAddr = self
            .bind
            .trim()
            .parse()
            .map_err(|_| format!("'{}' is not a valid IP address", self.bind))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Whether the service is reachable from other hosts
    pub fn is_network_exposed(&self) -> bool {
        self.bind
            .trim()
            .parse::<IpAddr>()
            .is_ok_and(|ip| !ip.is_loopback())
    }
}

/// Validate a bind address string
pub fn validate_bind_address(bind: &str) -> Result<(), String> {
    bind.trim()
        .parse::<IpAddr>()
        .map(|_| ())
        .map_err(|_| format!("'{bind}' is not a valid IPv4 or IPv6 address"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.version, 1);
        assert_eq!(config.bind, "127.0.0.1");
        assert_eq!(config.port, 3030);
        assert_eq!(config.parallelism_max, 64);
        assert_eq!(config.max_body_bytes, 4 * 1024 * 1024);
        assert!(config.log_filter.is_none());
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let config = Config {
            bind: "0.0.0.0".to_string(),
            port: 8080,
            log_filter: Some("debug".to_string()),
            ..Config::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_deserialize_empty_object_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_reject_unknown_fields() {
        let json = r#"{"version": 1, "unknown_field": "value"}"#;
        let result: Result<Config, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_socket_addr() {
        let config = Config::default();
        assert_eq!(
            config.socket_addr().unwrap(),
            "127.0.0.1:3030".parse::<SocketAddr>().unwrap()
        );

        let config = Config {
            bind: "::".to_string(),
            port: 9000,
            ..Config::default()
        };
        assert_eq!(config.socket_addr().unwrap().port(), 9000);

        let config = Config {
            bind: "localhost".to_string(),
            ..Config::default()
        };
        assert!(config.socket_addr().is_err());
    }

    #[test]
    fn test_is_network_exposed() {
        assert!(!Config::default().is_network_exposed());
        let config = Config {
            bind: "0.0.0.0".to_string(),
            ..Config::default()
        };
        assert!(config.is_network_exposed());
        let config = Config {
            bind: "::1".to_string(),
            ..Config::default()
        };
        assert!(!config.is_network_exposed());
    }

    #[test]
    fn test_validate_bind_address() {
        assert!(validate_bind_address("127.0.0.1").is_ok());
        assert!(validate_bind_address("::").is_ok());
        assert!(validate_bind_address("not-an-ip").is_err());
    }
}
