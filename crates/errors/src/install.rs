//! Installation system error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum InstallError {
    #[error("installation of {package} failed: {message}")]
    Failed { package: String, message: String },

    #[error("rollback left {failed} artifact(s) behind for {package}")]
    RollbackIncomplete { package: String, failed: usize },

    #[error("package {package} requires authentication: {variables}")]
    AuthRequired { package: String, variables: String },

    #[error("installed package {package} has no entry point")]
    MissingEntryPoint { package: String },

    #[error("unsupported registry for {package}: {registry}")]
    UnsupportedRegistry { package: String, registry: String },

    #[error("concurrency error: {message}")]
    ConcurrencyError { message: String },

    #[error("operation timeout: {message}")]
    OperationTimeout { message: String },

    #[error("retries exhausted after {attempts} attempt(s): {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl UserFacingError for InstallError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::RollbackIncomplete { .. } => {
                Some("Remove the package's cache directory manually or run `e14z cache clean`.")
            }
            Self::AuthRequired { .. } => {
                Some("Set the listed environment variables (e.g. with --env KEY=VALUE) and retry.")
            }
            Self::OperationTimeout { .. } => Some("Increase the timeout and retry."),
            Self::UnsupportedRegistry { .. } => {
                Some("Only npm, PyPI, git and docker packages can be auto-installed.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::OperationTimeout { .. } | Self::ConcurrencyError { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::Failed { .. } => "install.failed",
            Self::RollbackIncomplete { .. } => "install.rollback_incomplete",
            Self::AuthRequired { .. } => "install.auth_required",
            Self::MissingEntryPoint { .. } => "install.missing_entry_point",
            Self::UnsupportedRegistry { .. } => "install.unsupported_registry",
            Self::ConcurrencyError { .. } => "install.concurrency",
            Self::OperationTimeout { .. } => "install.timeout",
            Self::RetriesExhausted { .. } => "install.retries_exhausted",
        };
        Some(code)
    }
}
