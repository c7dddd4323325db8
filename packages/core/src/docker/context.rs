//! Build context creation
//!
//! The builder stage compiles from the full workspace, so the context is the
//! source tree itself (minus build output and VCS metadata) with the embedded
//! Dockerfile injected at the root.

use super::DOCKERFILE;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io;
use std::path::Path;
use tar::Builder as TarBuilder;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Directory names never sent to the daemon, at any depth
const EXCLUDED_DIRS: &[&str] = &[".git", "target"];

fn is_excluded(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| EXCLUDED_DIRS.contains(&name))
}

/// Create a gzipped tar archive of `source_dir` plus the embedded Dockerfile
///
/// `source_dir` must be a cargo workspace root. A `Dockerfile` already at
/// the root is replaced by the embedded one.
pub fn create_build_context(source_dir: &Path) -> Result<Vec<u8>, io::Error> {
    if !source_dir.join("Cargo.toml").is_file() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} has no Cargo.toml", source_dir.display()),
        ));
    }

    let mut archive_buffer = Vec::new();
    let mut file_count = 0usize;

    {
        let encoder = GzEncoder::new(&mut archive_buffer, Compression::default());
        let mut tar = TarBuilder::new(encoder);
        tar.follow_symlinks(false);

        let walker = WalkDir::new(source_dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_excluded(entry));

        for entry in walker {
            let entry = entry?;
            let relative = entry
                .path()
                .strip_prefix(source_dir)
                .map_err(io::Error::other)?;
            if relative.as_os_str().is_empty() || relative == Path::new("Dockerfile") {
                continue;
            }
            tar.append_path_with_name(entry.path(), relative)?;
            if entry.file_type().is_file() {
                file_count += 1;
            }
        }

        let dockerfile_bytes = DOCKERFILE.as_bytes();
        let mut header = tar::Header::new_gnu();
        header.set_path("Dockerfile")?;
        header.set_size(dockerfile_bytes.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        tar.append(&header, dockerfile_bytes)?;
        tar.finish()?;

        let encoder = tar.into_inner()?;
        encoder.finish()?;
    }

    debug!(
        "Build context: {} files, {} bytes compressed",
        file_count,
        archive_buffer.len()
    );
    Ok(archive_buffer)
}
