//! Error and warning types for scanning and indexing.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that abort a scan as a whole.
///
/// Anything that goes wrong below the root is reported as a [`ScanWarning`]
/// instead and never stops the walk.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The root is missing, unreadable or not a directory.
    #[error("Root path is inaccessible: {path}: {source}")]
    RootInaccessible {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The scan task was cancelled or panicked before producing a result.
    #[error("Scan interrupted: {message}")]
    Interrupted { message: String },

    /// Invalid scanner configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl ScanError {
    /// Create a root error with path context.
    pub fn root(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::RootInaccessible {
            path: path.into(),
            source,
        }
    }

    /// Root error for a path that exists but is not a directory.
    pub fn not_a_directory(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let source = std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("not a directory: {}", path.display()),
        );
        Self::RootInaccessible { path, source }
    }

    /// Whether this error leaves the previously installed snapshot live.
    pub fn is_root_failure(&self) -> bool {
        matches!(self, Self::RootInaccessible { .. })
    }
}

/// Errors returned by index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The refresh scan failed; the previous snapshot is still installed.
    #[error("Refresh failed: {0}")]
    Scan(#[from] ScanError),
}

/// Kind of scan warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// Permission was denied.
    PermissionDenied,
    /// Symbolic link target does not exist.
    BrokenSymlink,
    /// Error reading a directory entry (including entries that vanished).
    ReadError,
    /// Error reading metadata.
    MetadataError,
}

/// Non-fatal warning encountered during a scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanWarning {
    /// Path where the warning occurred.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl ScanWarning {
    /// Create a new scan warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create a warning from an I/O error, classifying permission failures.
    pub fn from_io(path: impl Into<PathBuf>, error: &std::io::Error, kind: WarningKind) -> Self {
        let path = path.into();
        if error.kind() == std::io::ErrorKind::PermissionDenied {
            return Self::permission_denied(path);
        }
        Self {
            message: format!("{error}"),
            path,
            kind,
        }
    }

    /// Create a permission denied warning.
    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            message: format!("Permission denied: {}", path.display()),
            path,
            kind: WarningKind::PermissionDenied,
        }
    }

    /// Create a broken symlink warning.
    pub fn broken_symlink(path: impl Into<PathBuf>, target: &str) -> Self {
        let path = path.into();
        Self {
            message: format!("Broken symlink: {} -> {target}", path.display()),
            path,
            kind: WarningKind::BrokenSymlink,
        }
    }
}
