//! Embedded Dockerfile content
//!
//! The two-stage recipe that packages drone-riot-conv, embedded at compile
//! time so the CLI can build the image from any checkout. The same file
//! works with a plain `docker build -f packages/core/src/docker/Dockerfile .`
//! from the workspace root.

/// The Dockerfile for building the drone-riot-conv image
pub const DOCKERFILE: &str = include_str!("Dockerfile");

/// Local image repository name
pub const IMAGE_NAME: &str = "drone-riot-conv";

/// Default image tag
pub const IMAGE_TAG_DEFAULT: &str = "latest";

/// Name of the compile stage in the Dockerfile
pub const BUILDER_STAGE: &str = "builder";

/// Release binary inside the builder stage
pub const BUILDER_ARTIFACT_PATH: &str = "/usr/src/drone-riot-conv/target/release/drone-riot-conv";

/// The only file carried into the runtime image
pub const RUNTIME_ARTIFACT_PATH: &str = "/usr/bin/drone-riot-conv";

/// PID 1 supervisor installed in the runtime image
pub const SUPERVISOR_PATH: &str = "/usr/bin/tini";

/// Image label holding the maintainer identity
pub const MAINTAINER_LABEL: &str = "maintainer";

/// Value of [`MAINTAINER_LABEL`]
pub const MAINTAINER: &str = "drone-riot-conv maintainers";

/// Port the service listens on inside the container
pub const SERVICE_PORT: u16 = 3030;

/// Full image reference for a tag, optionally for a single build stage
///
/// Stage images get a `-<stage>` tag suffix so they never shadow the
/// runtime image.
pub fn image_reference(tag: Option<&str>, stage: Option<&str>) -> String {
    let tag = tag.unwrap_or(IMAGE_TAG_DEFAULT);
    match stage {
        Some(stage) => format!("{IMAGE_NAME}:{tag}-{stage}"),
        None => format!("{IMAGE_NAME}:{tag}"),
    }
}
