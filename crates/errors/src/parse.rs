//! Install-command parsing error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ParseError {
    #[error("empty install command")]
    EmptyCommand,

    #[error("unrecognized install command: {command}")]
    UnknownGrammar { command: String },

    #[error("malformed scoped package name: {name}")]
    MalformedScope { name: String },

    #[error("invalid package name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("invalid version {version:?} for {name}")]
    InvalidVersion { name: String, version: String },

    #[error("invalid repository url: {url}")]
    InvalidUrl { url: String },

    #[error("missing argument: {what}")]
    MissingArgument { what: String },
}

impl UserFacingError for ParseError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::EmptyCommand | Self::UnknownGrammar { .. } | Self::MissingArgument { .. } => Some(
                "Use a supported install command: `npx <pkg>`, `pip install <pkg>`, `git clone <url>` or `docker run <image>`.",
            ),
            Self::MalformedScope { .. } => Some("Scoped npm packages must look like `@scope/name`."),
            Self::InvalidName { .. } | Self::InvalidVersion { .. } => {
                Some("Package names and versions may not contain shell metacharacters or whitespace.")
            }
            Self::InvalidUrl { .. } => Some("Use an https:// or git@ repository URL."),
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::EmptyCommand => "parse.empty_command",
            Self::UnknownGrammar { .. } => "parse.unknown_grammar",
            Self::MalformedScope { .. } => "parse.malformed_scope",
            Self::InvalidName { .. } => "parse.invalid_name",
            Self::InvalidVersion { .. } => "parse.invalid_version",
            Self::InvalidUrl { .. } => "parse.invalid_url",
            Self::MissingArgument { .. } => "parse.missing_argument",
        };
        Some(code)
    }
}
