//! Config subcommand implementations
//!
//! `drone-riot-conv config` prints the configuration the service would run
//! with, after the config file and environment overrides are applied.

mod show;

use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::PathBuf;

pub use show::cmd_config_show;

/// Configuration command arguments
#[derive(Args)]
pub struct ConfigArgs {
    /// Config file (default: $DRONE_RIOT_CONV_CONFIG or the user config dir)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Output as JSON instead of table format
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<ConfigSubcommands>,
}

/// Configuration subcommands
#[derive(Subcommand)]
pub enum ConfigSubcommands {
    /// Show the effective configuration
    Show {
        /// Output as JSON instead of table format
        #[arg(long)]
        json: bool,
    },
}

/// Handle config command
///
/// Defaults to Show when no subcommand is given.
pub fn cmd_config(args: &ConfigArgs, quiet: bool) -> Result<()> {
    let json = match args.command {
        Some(ConfigSubcommands::Show { json }) => json || args.json,
        None => args.json,
    };
    cmd_config_show(args.config.as_deref(), json, quiet)
}
