//! Cache storage and filesystem-related error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("disk full: {path}")]
    DiskFull { path: String },

    #[error("permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("path not found: {path}")]
    PathNotFound { path: String },

    #[error("already exists: {path}")]
    AlreadyExists { path: String },

    #[error("IO error: {message}")]
    IoError { message: String },

    #[error("corrupted data: {message}")]
    CorruptedData { message: String },

    #[error("integrity check failed for {package}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        package: String,
        expected: String,
        actual: String,
    },

    #[error("invalid path: {path}")]
    InvalidPath { path: String },

    #[error("cache entry not found: {name}@{version}")]
    EntryNotFound { name: String, version: String },
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        // Without a known path, avoid inventing placeholders; preserve message only
        Self::IoError {
            message: err.to_string(),
        }
    }
}

impl StorageError {
    /// Convert an `io::Error` into a `StorageError` with an associated path
    #[must_use]
    pub fn from_io_with_path(err: &std::io::Error, path: &std::path::Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: path.display().to_string(),
            },
            std::io::ErrorKind::NotFound => Self::PathNotFound {
                path: path.display().to_string(),
            },
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists {
                path: path.display().to_string(),
            },
            std::io::ErrorKind::StorageFull => Self::DiskFull {
                path: path.display().to_string(),
            },
            _ => Self::IoError {
                message: format!("{}: {}", path.display(), err),
            },
        }
    }
}

impl UserFacingError for StorageError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::DiskFull { .. } => Some("Free disk space or run `e14z cache clean` and retry."),
            Self::PermissionDenied { .. } => {
                Some("Check that the cache directory is writable by the current user.")
            }
            Self::IntegrityMismatch { .. } | Self::CorruptedData { .. } => {
                Some("The cached copy will be reinstalled on the next run.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DiskFull { .. } | Self::PermissionDenied { .. } | Self::IoError { .. }
        )
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::DiskFull { .. } => "storage.disk_full",
            Self::PermissionDenied { .. } => "storage.permission_denied",
            Self::PathNotFound { .. } => "storage.path_not_found",
            Self::AlreadyExists { .. } => "storage.already_exists",
            Self::IoError { .. } => "storage.io_error",
            Self::CorruptedData { .. } => "storage.corrupted_data",
            Self::IntegrityMismatch { .. } => "storage.integrity_mismatch",
            Self::InvalidPath { .. } => "storage.invalid_path",
            Self::EntryNotFound { .. } => "storage.entry_not_found",
        };
        Some(code)
    }
}
