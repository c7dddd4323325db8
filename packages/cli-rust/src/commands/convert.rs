//! Convert command implementation
//!
//! Offline use of the conversion engine: reads a `.drone.yml`, expands its
//! parallel pipelines and prints the result.

use anyhow::{Context, Result, bail};
use clap::Args;
use console::style;
use drone_riot_conv_core::config::validate_config;
use drone_riot_conv_core::{ConvertOptions, convert, load_config};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Arguments for the convert command
#[derive(Args)]
pub struct ConvertArgs {
    /// Pipeline file to convert; reads stdin when omitted or `-`
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Maximum instances per pipeline (default: from config, 64)
    #[arg(long, value_name = "N")]
    pub parallelism_max: Option<usize>,
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        _ => {
            let mut data = String::new();
            io::stdin()
                .read_to_string(&mut data)
                .context("failed to read stdin")?;
            Ok(data)
        }
    }
}

/// Resolve the instance limit from the flag or the loaded config
fn resolve_options(flag: Option<usize>) -> Result<ConvertOptions> {
    let mut config = load_config(None)?;
    if let Some(max) = flag {
        config.parallelism_max = max;
    }
    if let Err(error) = validate_config(&config) {
        bail!("{}: {}", error.field, error.message);
    }
    Ok(ConvertOptions {
        parallelism_max: config.parallelism_max,
    })
}

/// Convert a pipeline file and write it to stdout
pub fn cmd_convert(args: &ConvertArgs, quiet: bool) -> Result<()> {
    let options = resolve_options(args.parallelism_max)?;
    let data = read_input(args.file.as_deref())?;

    let conversion = convert(&data, &options)?;

    let mut stdout = io::stdout().lock();
    stdout.write_all(conversion.data.as_bytes())?;
    if !conversion.data.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;

    if !quiet {
        eprintln!(
            "{} {} document(s), {} expanded, {} passed through",
            style("Converted").green().bold(),
            conversion.documents,
            conversion.expanded,
            conversion.passed_through
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn read_input_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".drone.yml");
        fs::write(&path, "kind: pipeline\nname: test\n").unwrap();

        let data = read_input(Some(&path)).unwrap();
        assert_eq!(data, "kind: pipeline\nname: test\n");
    }

    #[test]
    fn read_input_missing_file_names_path() {
        let err = read_input(Some(Path::new("/nonexistent/.drone.yml"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/.drone.yml"));
    }

    #[test]
    fn flag_sets_parallelism_limit() {
        let options = resolve_options(Some(8)).unwrap();
        assert_eq!(options.parallelism_max, 8);
    }

    #[test]
    fn zero_limit_is_rejected() {
        let err = resolve_options(Some(0)).unwrap_err();
        assert!(err.to_string().starts_with("parallelism_max"));
    }
}
