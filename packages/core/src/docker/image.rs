//! Docker image build operations
//!
//! Builds the drone-riot-conv image, or a single stage of it, from a source
//! checkout with streaming progress.

use super::build_log::BuildLog;
use super::context::create_build_context;
use super::dockerfile::image_reference;
use super::progress::ProgressReporter;
use super::{DockerClient, DockerError};
use bollard::models::{BuildInfo, BuildInfoAux};
use bollard::query_parameters::{BuildImageOptions, BuilderVersion, RemoveImageOptionsBuilder};
use bytes::Bytes;
use futures_util::StreamExt;
use http_body_util::{Either, Full};
use std::collections::HashMap;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

const SPINNER: &str = "build";

fn is_not_found(error: &bollard::errors::Error) -> bool {
    matches!(
        error,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

/// Whether `reference` exists in the local image store
pub async fn image_exists(client: &DockerClient, reference: &str) -> Result<bool, DockerError> {
    match client.inner().inspect_image(reference).await {
        Ok(_) => Ok(true),
        Err(e) if is_not_found(&e) => Ok(false),
        Err(e) => Err(DockerError::from(e)),
    }
}

/// Remove a local image
///
/// Returns `false` when there was nothing to remove.
pub async fn remove_image(
    client: &DockerClient,
    reference: &str,
    force: bool,
) -> Result<bool, DockerError> {
    let options = RemoveImageOptionsBuilder::new().force(force).build();
    match client
        .inner()
        .remove_image(reference, Some(options), None)
        .await
    {
        Ok(deleted) => {
            debug!("Removed {} ({} layers)", reference, deleted.len());
            Ok(true)
        }
        Err(e) if is_not_found(&e) => Ok(false),
        Err(e) => Err(DockerError::Image(format!(
            "Failed to remove {reference}: {e}"
        ))),
    }
}

fn build_options(reference: &str, target: Option<&str>, no_cache: bool) -> BuildImageOptions {
    // BuildKit sessions must be unique per build
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();

    BuildImageOptions {
        t: Some(reference.to_string()),
        dockerfile: "Dockerfile".to_string(),
        version: BuilderVersion::BuilderBuildKit,
        session: Some(format!("drone-riot-conv-{nanos}")),
        rm: true,
        nocache: no_cache,
        buildargs: Some(HashMap::new()),
        target: target.unwrap_or_default().to_string(),
        ..Default::default()
    }
}

/// Build the image from the workspace at `source_dir`
///
/// With `target` set only that stage is built, tagged with a `-<target>`
/// suffix. Returns the image reference.
pub async fn build_image(
    client: &DockerClient,
    source_dir: &Path,
    tag: Option<&str>,
    target: Option<&str>,
    progress: &mut ProgressReporter,
    no_cache: bool,
) -> Result<String, DockerError> {
    let reference = image_reference(tag, target);
    debug!("Building {} (no_cache={})", reference, no_cache);

    let context = create_build_context(source_dir)
        .map_err(|e| DockerError::Build(format!("Failed to create build context: {e}")))?;
    let body: Either<Full<Bytes>, _> = Either::Left(Full::new(Bytes::from(context)));
    let mut stream = client.inner().build_image(
        build_options(&reference, target, no_cache),
        None,
        Some(body),
    );

    progress.add_spinner(SPINNER, &format!("Building {reference}..."));
    let mut log = BuildLog::new();
    let mut image_id = None;

    while let Some(item) = stream.next().await {
        let info = match item {
            Ok(info) => info,
            Err(e) => {
                progress.abandon_all("Build failed");
                return Err(DockerError::Build(log.failure_report(&e.to_string())));
            }
        };

        show_stream_line(&info, progress, &mut log);

        if let Some(message) = info
            .error_detail
            .as_ref()
            .and_then(|d| d.message.as_deref())
        {
            progress.abandon_all(message);
            return Err(DockerError::Build(log.failure_report(message)));
        }

        match info.aux {
            Some(BuildInfoAux::Default(id)) => image_id = id.id.or(image_id),
            Some(BuildInfoAux::BuildKit(status)) => {
                let (lines, step) = log.record_buildkit(&status);
                if progress.is_plain_output() {
                    for line in &lines {
                        eprintln!("[{}] {}", line.step, line.text);
                    }
                }
                if let Some(step) = step {
                    show_step(progress, &step);
                }
            }
            None => {}
        }
    }

    progress.finish(
        SPINNER,
        &format!(
            "Built {reference} ({})",
            image_id.as_deref().unwrap_or("unknown id")
        ),
    );
    Ok(reference)
}

fn show_step(progress: &mut ProgressReporter, step: &str) {
    if progress.is_plain_output() {
        eprintln!("{step}");
    } else {
        progress.update_spinner(SPINNER, step);
    }
}

/// Classic builder output arrives as raw text in `stream`
fn show_stream_line(info: &BuildInfo, progress: &mut ProgressReporter, log: &mut BuildLog) {
    let Some(raw) = info.stream.as_deref() else {
        return;
    };
    let line = raw.trim();
    if line.is_empty() {
        return;
    }
    if progress.is_plain_output() {
        eprint!("{raw}");
    } else {
        progress.update_spinner(SPINNER, line);
    }
    log.record_line(line);
}
