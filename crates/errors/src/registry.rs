//! Registry collaborator error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum RegistryError {
    #[error("package not found in registry: {slug}")]
    NotFound { slug: String },

    #[error("registry unavailable: {message}")]
    Unavailable { message: String },

    #[error("registry request for {slug} timed out after {timeout_ms}ms")]
    Timeout { slug: String, timeout_ms: u64 },

    #[error("invalid registry data for {slug}: {message}")]
    InvalidData { slug: String, message: String },

    #[error("no installation method {method} for {slug}")]
    MethodNotFound { slug: String, method: String },
}

impl UserFacingError for RegistryError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NotFound { .. } => Some("Check the package slug and try again."),
            Self::Unavailable { .. } | Self::Timeout { .. } => {
                Some("Check network connectivity and retry.")
            }
            Self::InvalidData { .. } => Some("Report the package slug to the directory maintainers."),
            Self::MethodNotFound { .. } => Some("Omit --method to use the default install command."),
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::NotFound { .. } => "registry.not_found",
            Self::Unavailable { .. } => "registry.unavailable",
            Self::Timeout { .. } => "registry.timeout",
            Self::InvalidData { .. } => "registry.invalid_data",
            Self::MethodNotFound { .. } => "registry.method_not_found",
        };
        Some(code)
    }
}
