#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Error types for the e14z auto-installer
//!
//! This crate provides fine-grained error types organized by domain, plus
//! the classifier that maps any failure onto the user-facing taxonomy
//! (`network`, `permission`, `security`, ...). All error types implement
//! Clone so they can be carried through retries and outcome reports.

use std::borrow::Cow;

use thiserror::Error;

pub mod classify;
pub mod config;
pub mod exec;
pub mod install;
pub mod parse;
pub mod registry;
pub mod security;
pub mod storage;

// Re-export all error types at the root
pub use classify::{categorize_error, categorize_message, ClassifiedError, ErrorCategory};
pub use config::ConfigError;
pub use exec::ExecError;
pub use install::InstallError;
pub use parse::ParseError;
pub use registry::RegistryError;
pub use security::SecurityError;
pub use storage::StorageError;

/// Generic error type for cross-crate boundaries
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("security error: {0}")]
    Security(#[from] SecurityError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("execution error: {0}")]
    Exec(#[from] ExecError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("install error: {0}")]
    Install(#[from] InstallError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {message}")]
    Io {
        kind: std::io::ErrorKind,
        message: String,
        path: Option<std::path::PathBuf>,
    },
}

impl Error {
    /// Create an internal error with a message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an Io error with an associated path
    pub fn io_with_path(err: &std::io::Error, path: impl Into<std::path::PathBuf>) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
            path: Some(path.into()),
        }
    }

    /// Classify this error into the user-facing taxonomy
    #[must_use]
    pub fn classify(&self) -> ClassifiedError {
        categorize_error(self)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
            path: None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {err}"))
    }
}

/// Result type alias for e14z operations
pub type Result<T> = std::result::Result<T, Error>;

/// Minimal interface for rendering user-facing error information without
/// requiring heavyweight envelopes.
pub trait UserFacingError {
    /// Short message suitable for CLI output.
    fn user_message(&self) -> Cow<'_, str>;

    /// Optional remediation hint.
    fn user_hint(&self) -> Option<&'static str> {
        None
    }

    /// Whether retrying the same operation is likely to succeed.
    fn is_retryable(&self) -> bool {
        false
    }

    /// Stable error code for analytics / structured reporting.
    fn user_code(&self) -> Option<&'static str> {
        None
    }
}

impl UserFacingError for Error {
    fn user_message(&self) -> Cow<'_, str> {
        match self {
            Error::Parse(err) => err.user_message(),
            Error::Security(err) => err.user_message(),
            Error::Storage(err) => err.user_message(),
            Error::Exec(err) => err.user_message(),
            Error::Registry(err) => err.user_message(),
            Error::Config(err) => err.user_message(),
            Error::Install(err) => err.user_message(),
            Error::Io { message, .. } => Cow::Owned(message.clone()),
            _ => Cow::Owned(self.to_string()),
        }
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Error::Parse(err) => err.user_hint(),
            Error::Security(err) => err.user_hint(),
            Error::Storage(err) => err.user_hint(),
            Error::Exec(err) => err.user_hint(),
            Error::Registry(err) => err.user_hint(),
            Error::Config(err) => err.user_hint(),
            Error::Install(err) => err.user_hint(),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        self.classify().recoverable()
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Error::Parse(err) => err.user_code(),
            Error::Security(err) => err.user_code(),
            Error::Storage(err) => err.user_code(),
            Error::Exec(err) => err.user_code(),
            Error::Registry(err) => err.user_code(),
            Error::Config(err) => err.user_code(),
            Error::Install(err) => err.user_code(),
            Error::Internal(_) => Some("error.internal"),
            Error::Cancelled => Some("error.cancelled"),
            Error::Io { .. } => Some("error.io"),
        }
    }
}
