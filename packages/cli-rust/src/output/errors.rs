//! Docker error formatting
//!
//! Turns `DockerError` values into styled, actionable messages for the image
//! commands.

use anyhow::anyhow;
use console::style;
use drone_riot_conv_core::docker::DockerError;

/// Format Docker errors with troubleshooting steps
pub fn format_docker_error(e: &DockerError) -> String {
    let (title, lines): (&str, Vec<String>) = match e {
        DockerError::NotRunning => (
            "The Docker daemon did not answer",
            vec![
                "The image commands need a running daemon:".to_string(),
                command("sudo systemctl start docker"),
            ],
        ),
        DockerError::SocketNotFound => (
            "No Docker socket at /var/run/docker.sock",
            vec![
                "Install Docker and enable the service:".to_string(),
                command("sudo systemctl enable --now docker"),
                "or point DOCKER_HOST at a remote daemon.".to_string(),
            ],
        ),
        DockerError::PermissionDenied => (
            "Permission denied on the Docker socket",
            vec![
                "Join the docker group, then start a new login shell:".to_string(),
                command("sudo usermod -aG docker $USER"),
            ],
        ),
        DockerError::Connection(msg) => ("Docker connection failed", vec![msg.clone()]),
        DockerError::Build(msg) => {
            // Build reports are multi-line; keep their own indentation
            return format!(
                "{}\n\n{}\n\n{}",
                style("Image build failed").red().bold(),
                msg,
                command("drone-riot-conv image build --no-cache"),
            );
        }
        DockerError::Image(msg) if msg.contains("not found") => (
            "Image not found",
            vec![msg.clone(), command("drone-riot-conv image build")],
        ),
        DockerError::Artifact(msg) => (
            "Artifact verification failed",
            vec![
                msg.clone(),
                "The runtime stage must copy the builder's binary unchanged.".to_string(),
            ],
        ),
        _ => return e.to_string(),
    };

    let mut out = style(title).red().bold().to_string();
    out.push('\n');
    for line in lines {
        out.push_str("\n  ");
        out.push_str(&line);
    }
    out
}

fn command(cmd: &str) -> String {
    format!("  {}", style(cmd).cyan())
}

/// Format Docker errors as anyhow::Error
pub fn format_docker_error_anyhow(e: &DockerError) -> anyhow::Error {
    anyhow!("{}", format_docker_error(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_docker_error_not_running() {
        let msg = format_docker_error(&DockerError::NotRunning);
        assert!(msg.contains("did not answer"));
        assert!(msg.contains("systemctl start docker"));
    }

    #[test]
    fn format_docker_error_socket_not_found() {
        let msg = format_docker_error(&DockerError::SocketNotFound);
        assert!(msg.contains("No Docker socket"));
        assert!(msg.contains("/var/run/docker.sock"));
    }

    #[test]
    fn format_docker_error_permission_denied() {
        let msg = format_docker_error(&DockerError::PermissionDenied);
        assert!(msg.contains("Permission denied on the Docker socket"));
        assert!(msg.contains("usermod"));
    }

    #[test]
    fn format_docker_error_build_suggests_no_cache() {
        let msg = format_docker_error(&DockerError::Build("cargo build failed".to_string()));
        assert!(msg.contains("Image build failed"));
        assert!(msg.contains("cargo build failed"));
        assert!(msg.contains("--no-cache"));
    }

    #[test]
    fn format_docker_error_missing_image_suggests_build() {
        let msg = format_docker_error(&DockerError::Image(
            "drone-riot-conv:latest not found".to_string(),
        ));
        assert!(msg.contains("Image not found"));
        assert!(msg.contains("image build"));
    }

    #[test]
    fn format_docker_error_other_variants_use_display() {
        let error = DockerError::Container("exited early".to_string());
        assert_eq!(format_docker_error(&error), error.to_string());
    }

    #[test]
    fn format_docker_error_anyhow_wraps_correctly() {
        let err = format_docker_error_anyhow(&DockerError::NotRunning);
        assert!(err.to_string().contains("did not answer"));
    }
}
