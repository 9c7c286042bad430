//! Structured error types for tracecap
//!
//! Opening files is the only fatal class of failure; per-write problems are
//! reported through boolean returns and logs instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Failed to open archive file {}: {source}", .path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to map archive file {}: {source}", .path.display())]
    MapFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read index {}: {source}", .path.display())]
    IndexReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to close archive file {}: {source}", .path.display())]
    CloseFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config value: {0}")]
    InvalidValue(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to create capture stream {}: {source}", .path.display())]
    StreamCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Capture stream {} is incomplete: the sink stopped accepting bytes", .path.display())]
    StreamIncomplete { path: PathBuf },

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_error_display() {
        let err = ArchiveError::OpenFailed {
            path: PathBuf::from("/tmp/res.data"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/res.data"));
        assert!(msg.starts_with("Failed to open archive file"));
    }

    #[test]
    fn test_session_error_wraps_archive_error() {
        let err: SessionError = ArchiveError::MapFailed {
            path: PathBuf::from("res.index"),
            source: std::io::Error::other("no space"),
        }
        .into();
        assert!(err.to_string().contains("res.index"));
    }
}
