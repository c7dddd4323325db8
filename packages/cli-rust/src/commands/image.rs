//! Image subcommand implementations
//!
//! Builds the two-stage container image and checks the result against a
//! running Docker daemon.

use crate::output::{artifact_table, check_table, format_docker_error_anyhow};
use anyhow::Result;
use clap::{Args, Subcommand};
use console::style;
use drone_riot_conv_core::docker::{
    DockerClient, DockerError, IMAGE_TAG_DEFAULT, ProgressReporter, all_passed, build_image,
    image_exists, image_reference, remove_image, run_image_checks, verify_artifact,
};
use std::path::PathBuf;
use tracing::warn;

/// Image command arguments
#[derive(Args)]
pub struct ImageArgs {
    #[command(subcommand)]
    command: ImageSubcommands,
}

/// Image subcommands
#[derive(Subcommand)]
pub enum ImageSubcommands {
    /// Build the image from a source checkout
    Build {
        /// Workspace root to use as build context
        #[arg(long, value_name = "DIR", default_value = ".")]
        source: PathBuf,
        /// Image tag
        #[arg(long, default_value = IMAGE_TAG_DEFAULT)]
        tag: String,
        /// Stop at this Dockerfile stage (e.g. "builder")
        #[arg(long)]
        target: Option<String>,
        /// Build without using the layer cache
        #[arg(long)]
        no_cache: bool,
    },
    /// Check the runtime binary is byte-identical to the builder's
    Verify {
        /// Workspace root to use as build context
        #[arg(long, value_name = "DIR", default_value = ".")]
        source: PathBuf,
        /// Image tag
        #[arg(long, default_value = IMAGE_TAG_DEFAULT)]
        tag: String,
        /// Build without using the layer cache
        #[arg(long)]
        no_cache: bool,
        /// Keep the intermediate builder-stage image
        #[arg(long)]
        keep_builder: bool,
    },
    /// Run the entrypoint, signal and exit code checks against a built image
    Check {
        /// Image tag
        #[arg(long, default_value = IMAGE_TAG_DEFAULT)]
        tag: String,
    },
}

fn reporter(quiet: bool) -> ProgressReporter {
    if quiet {
        ProgressReporter::hidden()
    } else {
        ProgressReporter::new()
    }
}

async fn connect() -> Result<DockerClient> {
    DockerClient::connect()
        .await
        .map_err(|e| format_docker_error_anyhow(&e))
}

/// Handle image command
///
/// Returns 1 when a verification or check fails.
pub async fn cmd_image(args: &ImageArgs, quiet: bool) -> Result<i32> {
    let client = connect().await?;

    match &args.command {
        ImageSubcommands::Build {
            source,
            tag,
            target,
            no_cache,
        } => {
            let mut progress = reporter(quiet);
            let reference = build_image(
                &client,
                source,
                Some(tag.as_str()),
                target.as_deref(),
                &mut progress,
                *no_cache,
            )
            .await
            .map_err(|e| format_docker_error_anyhow(&e))?;
            if !quiet {
                println!("{} {}", style("Built").green().bold(), reference);
            }
            Ok(0)
        }
        ImageSubcommands::Verify {
            source,
            tag,
            no_cache,
            keep_builder,
        } => {
            let mut progress = reporter(quiet);
            let report = verify_artifact(
                &client,
                source,
                Some(tag.as_str()),
                &mut progress,
                *no_cache,
            )
            .await
            .map_err(|e| format_docker_error_anyhow(&e))?;
            println!("{}", artifact_table(&report));

            if !keep_builder
                && let Err(e) = remove_image(&client, &report.builder_image, false).await
            {
                warn!("{}", e);
            }

            if report.identical() {
                Ok(0)
            } else {
                eprintln!(
                    "{} runtime binary differs from the builder stage",
                    style("Mismatch:").red().bold()
                );
                Ok(1)
            }
        }
        ImageSubcommands::Check { tag } => {
            let reference = image_reference(Some(tag.as_str()), None);
            if !image_exists(&client, &reference)
                .await
                .map_err(|e| format_docker_error_anyhow(&e))?
            {
                let missing = DockerError::Image(format!("{reference} not found"));
                return Err(format_docker_error_anyhow(&missing));
            }

            let results = run_image_checks(&client, &reference)
                .await
                .map_err(|e| format_docker_error_anyhow(&e))?;
            println!("{}", check_table(&results));
            Ok(if all_passed(&results) { 0 } else { 1 })
        }
    }
}
