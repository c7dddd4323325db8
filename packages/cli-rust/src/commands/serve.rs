//! Serve command implementation
//!
//! Runs the conversion service until SIGINT or SIGTERM.

use anyhow::{Result, bail};
use clap::Args;
use drone_riot_conv_core::config::validate_config;
use drone_riot_conv_core::config::validation::{
    display_validation_error, display_validation_warning,
};
use drone_riot_conv_core::{Config, load_config, serve, shutdown_signal};
use std::path::PathBuf;

/// Arguments for the serve command
#[derive(Args, Default)]
pub struct ServeArgs {
    /// Config file (default: $DRONE_RIOT_CONV_CONFIG or the user config dir)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Address to bind (overrides config and environment)
    #[arg(long, value_name = "IP")]
    pub bind: Option<String>,

    /// Port to listen on (overrides config and environment)
    #[arg(long, short)]
    pub port: Option<u16>,
}

/// Apply command line overrides on top of a loaded config
fn apply_overrides(config: &mut Config, args: &ServeArgs) {
    if let Some(bind) = &args.bind {
        config.bind = bind.trim().to_string();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
}

/// Load, override and validate the configuration for the service
///
/// Validation warnings are printed unless `quiet`; a validation error is
/// printed and returned.
pub fn effective_config(args: &ServeArgs, quiet: bool) -> Result<Config> {
    let mut config = load_config(args.config.as_deref())?;
    apply_overrides(&mut config, args);

    match validate_config(&config) {
        Ok(warnings) => {
            if !quiet {
                for warning in &warnings {
                    display_validation_warning(warning);
                }
            }
            Ok(config)
        }
        Err(error) => {
            display_validation_error(&error);
            bail!("invalid configuration: {}", error.message)
        }
    }
}

/// Run the service until a shutdown signal arrives
pub async fn cmd_serve(config: &Config) -> Result<()> {
    serve(config, shutdown_signal()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn flags_override_config() {
        let mut config = Config::default();
        let args = ServeArgs {
            config: None,
            bind: Some(" 0.0.0.0 ".to_string()),
            port: Some(8080),
        };
        apply_overrides(&mut config, &args);
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn no_flags_keep_config() {
        let mut config = Config::default();
        apply_overrides(&mut config, &ServeArgs::default());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn effective_config_reads_explicit_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ // local dev\n \"port\": 4040 }").unwrap();

        let args = ServeArgs {
            config: Some(path),
            ..Default::default()
        };
        let config = effective_config(&args, true).unwrap();
        assert_eq!(config.port, 4040);
    }

    #[test]
    fn effective_config_rejects_invalid_bind() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{}").unwrap();

        let args = ServeArgs {
            config: Some(path),
            bind: Some("not-an-address".to_string()),
            port: None,
        };
        let err = effective_config(&args, true).unwrap_err();
        assert!(err.to_string().contains("invalid configuration"));
    }
}
