//! drone-riot-conv CLI - Drone CI conversion extension
//!
//! This module contains the CLI implementation used by the binary.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Expand parallel Drone pipelines
#[derive(Parser)]
#[command(name = "drone-riot-conv")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Drone CI conversion extension that expands parallel pipelines",
    long_about = None
)]
#[command(after_help = "Runs the conversion service when no command is given.")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Increase verbosity level
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the conversion service (default)
    Serve(commands::ServeArgs),
    /// Convert a pipeline file and print the result
    Convert(commands::ConvertArgs),
    /// Run a command under the PID 1 supervisor
    Init(commands::InitArgs),
    /// Build and verify the container image
    Image(commands::ImageArgs),
    /// Inspect configuration
    Config(commands::ConfigArgs),
}

/// Filter directive from the verbosity flags
fn verbosity_directive(verbose: u8, quiet: bool, default_level: &str) -> &str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => default_level,
        1 => "debug",
        _ => "trace",
    }
}

/// Pick the first usable filter directive
///
/// `RUST_LOG` wins over the config file's `log_filter`, which wins over the
/// verbosity flags. Directives that fail to parse are skipped.
fn filter_directive(
    env: Option<&str>,
    config_filter: Option<&str>,
    verbose: u8,
    quiet: bool,
    default_level: &str,
) -> String {
    [env, config_filter]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|directive| !directive.is_empty() && EnvFilter::try_new(directive).is_ok())
        .unwrap_or_else(|| verbosity_directive(verbose, quiet, default_level))
        .to_string()
}

/// Install the stderr tracing subscriber
fn init_tracing(cli: &Cli, default_level: &str, config_filter: Option<&str>) {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directive = filter_directive(
        env.as_deref(),
        config_filter,
        cli.verbose,
        cli.quiet,
        default_level,
    );

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directive))
        .with_writer(std::io::stderr)
        .with_ansi(console::colors_enabled_stderr())
        .with_target(cli.verbose > 0)
        .try_init();
}

/// Parse arguments and run the selected command
///
/// Returns the process exit code.
pub fn run() -> Result<i32> {
    let cli = Cli::parse();

    if cli.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    match cli.command {
        None => run_serve(&cli, &commands::ServeArgs::default()),
        Some(Commands::Serve(ref args)) => run_serve(&cli, args),
        Some(Commands::Convert(ref args)) => {
            init_tracing(&cli, "warn", None);
            commands::cmd_convert(args, cli.quiet)?;
            Ok(0)
        }
        Some(Commands::Init(ref args)) => {
            // No async runtime: the supervisor must own signal delivery
            init_tracing(&cli, "warn", None);
            Ok(commands::cmd_init(args))
        }
        Some(Commands::Image(ref args)) => {
            init_tracing(&cli, "warn", None);
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(commands::cmd_image(args, cli.quiet))
        }
        Some(Commands::Config(ref args)) => {
            init_tracing(&cli, "warn", None);
            commands::cmd_config(args, cli.quiet)?;
            Ok(0)
        }
    }
}

fn run_serve(cli: &Cli, args: &commands::ServeArgs) -> Result<i32> {
    let config = commands::effective_config(args, cli.quiet)?;
    init_tracing(cli, "info", config.log_filter.as_deref());

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(commands::cmd_serve(&config))?;
    Ok(0)
}
