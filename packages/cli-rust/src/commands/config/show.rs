//! Config show subcommand
//!
//! Displays the effective configuration in table or JSON format.
//! Uses serde serialization to include every Config field.

use anyhow::Result;
use comfy_table::{Cell, Color, Table};
use drone_riot_conv_core::config::validation::display_validation_warning;
use drone_riot_conv_core::config::{ENV_CONFIG, paths, validate_config};
use drone_riot_conv_core::{Config, load_config};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Show the effective configuration
///
/// Validation warnings are printed to stderr unless `quiet`. An invalid
/// configuration is still shown so it can be inspected.
pub fn cmd_config_show(explicit: Option<&Path>, json: bool, quiet: bool) -> Result<()> {
    let config = load_config(explicit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        println!("{}", config_table(&config)?);
        println!();
        println!("Config file: {}", describe_source(explicit));
    }

    match validate_config(&config) {
        Ok(warnings) if !quiet => {
            for warning in &warnings {
                display_validation_warning(warning);
            }
        }
        Ok(_) => {}
        Err(error) => eprintln!("{}: {}", error.field, error.message),
    }
    Ok(())
}

fn config_table(config: &Config) -> Result<Table> {
    let value = serde_json::to_value(config)?;
    let mut table = Table::new();
    table.set_header(vec!["Key", "Value"]);

    if let Value::Object(obj) = value {
        for (key, val) in &obj {
            table.add_row(vec![Cell::new(key), styled_cell(key, val)]);
        }
    }
    if config.log_filter.is_none() {
        table.add_row(vec![Cell::new("log_filter"), Cell::new("(not set)")]);
    }
    Ok(table)
}

/// Format a JSON value for display
fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "(not set)".to_string(),
        Value::String(s) if s.is_empty() => "(not set)".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Highlight the bind address: green on loopback, yellow when exposed
fn styled_cell(key: &str, value: &Value) -> Cell {
    let cell = Cell::new(format_value(value));
    match (key, value) {
        ("bind", Value::String(addr)) if is_localhost(addr) => cell.fg(Color::Green),
        ("bind", Value::String(_)) => cell.fg(Color::Yellow),
        _ => cell,
    }
}

fn is_localhost(addr: &str) -> bool {
    addr.trim()
        .parse::<std::net::IpAddr>()
        .is_ok_and(|ip| ip.is_loopback())
}

/// Which file the configuration came from
fn describe_source(explicit: Option<&Path>) -> String {
    let env = std::env::var(ENV_CONFIG).ok().map(PathBuf::from);
    let path = explicit.map(Path::to_path_buf).or(env);
    match path {
        Some(path) => path.display().to_string(),
        None => match paths::get_config_path() {
            Some(path) if path.exists() => path.display().to_string(),
            Some(path) => format!("{} (not present, using defaults)", path.display()),
            None => "(none, using defaults)".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_value_strings_and_numbers() {
        assert_eq!(
            format_value(&Value::String("0.0.0.0".to_string())),
            "0.0.0.0"
        );
        assert_eq!(format_value(&Value::String(String::new())), "(not set)");
        assert_eq!(format_value(&serde_json::json!(64)), "64");
        assert_eq!(format_value(&Value::Null), "(not set)");
    }

    #[test]
    fn test_is_localhost() {
        assert!(is_localhost("127.0.0.1"));
        assert!(is_localhost("::1"));
        assert!(!is_localhost("0.0.0.0"));
        assert!(!is_localhost("not-an-ip"));
    }

    #[test]
    fn test_config_table_includes_every_field() {
        let rendered = config_table(&Config::default()).unwrap().to_string();
        for key in [
            "version",
            "bind",
            "port",
            "parallelism_max",
            "max_body_bytes",
            "log_filter",
        ] {
            assert!(rendered.contains(key), "missing {key}");
        }
        assert!(rendered.contains("3030"));
    }

    #[test]
    fn test_describe_source_prefers_explicit_path() {
        let source = describe_source(Some(Path::new("/etc/drone-riot-conv.json")));
        assert_eq!(source, "/etc/drone-riot-conv.json");
    }
}
