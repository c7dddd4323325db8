//! Docker-specific error types

use thiserror::Error;

/// Errors from Docker operations
#[derive(Debug, Error)]
pub enum DockerError {
    /// Docker daemon is not running or not reachable
    #[error("Docker is not running")]
    NotRunning,

    /// Docker socket does not exist
    #[error("Docker socket not found")]
    SocketNotFound,

    /// Current user cannot access the Docker socket
    #[error("Permission denied accessing Docker socket")]
    PermissionDenied,

    /// Any other connection failure
    #[error("Docker connection error: {0}")]
    Connection(String),

    #[error("Image build failed: {0}")]
    Build(String),

    #[error("Image operation failed: {0}")]
    Image(String),

    #[error("Container operation failed: {0}")]
    Container(String),

    /// Reading or comparing the built binary failed
    #[error("Artifact check failed: {0}")]
    Artifact(String),
}

impl From<bollard::errors::Error> for DockerError {
    fn from(err: bollard::errors::Error) -> Self {
        classify_connection_error(&err.to_string())
    }
}

/// Map a raw connection error message onto the variant the CLI knows how
/// to explain
fn classify_connection_error(message: &str) -> DockerError {
    let lower = message.to_lowercase();
    if lower.contains("permission denied") {
        DockerError::PermissionDenied
    } else if lower.contains("no such file or directory") {
        DockerError::SocketNotFound
    } else if lower.contains("connection refused")
        || lower.contains("cannot connect")
        || lower.contains("is the docker daemon running")
    {
        DockerError::NotRunning
    } else {
        DockerError::Connection(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_permission_denied() {
        let err =
            classify_connection_error("client error (Connect): Permission denied (os error 13)");
        assert!(matches!(err, DockerError::PermissionDenied));
    }

    #[test]
    fn classifies_missing_socket() {
        let err = classify_connection_error("No such file or directory (os error 2)");
        assert!(matches!(err, DockerError::SocketNotFound));
    }

    #[test]
    fn classifies_refused_connection() {
        let err = classify_connection_error("Connection refused (os error 111)");
        assert!(matches!(err, DockerError::NotRunning));
    }

    #[test]
    fn keeps_unknown_message() {
        let err = classify_connection_error("tls handshake eof");
        match err {
            DockerError::Connection(msg) => assert_eq!(msg, "tls handshake eof"),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn display_messages() {
        assert_eq!(DockerError::NotRunning.to_string(), "Docker is not running");
        assert_eq!(
            DockerError::Artifact("digest mismatch".to_string()).to_string(),
            "Artifact check failed: digest mismatch"
        );
    }
}
