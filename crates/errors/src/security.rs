//! Security and sanitization error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum SecurityError {
    #[error("command not allowed: {command}")]
    CommandNotAllowed { command: String },

    #[error("unsafe characters in command: {command}")]
    UnsafeCommand { command: String },

    #[error("unsafe argument at position {index}: {reason}")]
    UnsafeArgument { index: usize, reason: String },

    #[error("package {package} is quarantined: {reason}")]
    Quarantined { package: String, reason: String },

    #[error("package {package} blocked by security checks (score {score}): {reason}")]
    VerificationBlocked {
        package: String,
        score: u8,
        reason: String,
    },

    #[error("path escapes sandbox root: {path}")]
    PathEscape { path: String },

    #[error("environment variable not allowed: {name}")]
    EnvNotAllowed { name: String },
}

impl UserFacingError for SecurityError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::CommandNotAllowed { .. } | Self::UnsafeCommand { .. } => {
                Some("Only known launchers (npx, uvx, node, python, docker, git) may be executed.")
            }
            Self::UnsafeArgument { .. } | Self::EnvNotAllowed { .. } => {
                Some("Remove shell metacharacters from the install command.")
            }
            Self::Quarantined { .. } | Self::VerificationBlocked { .. } => {
                Some("Do not install this package; it was flagged by security checks.")
            }
            Self::PathEscape { .. } => Some("Package files must stay inside the cache directory."),
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::CommandNotAllowed { .. } => "security.command_not_allowed",
            Self::UnsafeCommand { .. } => "security.unsafe_command",
            Self::UnsafeArgument { .. } => "security.unsafe_argument",
            Self::Quarantined { .. } => "security.quarantined",
            Self::VerificationBlocked { .. } => "security.verification_blocked",
            Self::PathEscape { .. } => "security.path_escape",
            Self::EnvNotAllowed { .. } => "security.env_not_allowed",
        };
        Some(code)
    }
}
