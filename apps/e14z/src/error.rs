//! CLI error handling

use std::fmt;

use e14z_errors::UserFacingError;

/// CLI-specific error type
#[derive(Debug)]
pub enum CliError {
    /// Configuration error
    Config(e14z_errors::Error),
    /// Operations error
    Ops(e14z_errors::Error),
    /// The run finished but the package is not usable
    RunFailed(String),
    /// I/O error
    Io(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "Configuration error: {}", e.user_message()),
            CliError::Ops(e) => {
                let message = e.user_message();
                write!(f, "{message}")?;
                if let Some(code) = e.user_code() {
                    write!(f, "\n  Code: {code}")?;
                }
                if let Some(hint) = e.user_hint() {
                    write!(f, "\n  Hint: {hint}")?;
                }
                if e.is_retryable() {
                    write!(f, "\n  Retry: safe to retry this operation.")?;
                }
                Ok(())
            }
            CliError::RunFailed(msg) => write!(f, "{msg}"),
            CliError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) | CliError::Ops(e) => Some(e),
            CliError::Io(e) => Some(e),
            CliError::RunFailed(_) => None,
        }
    }
}

impl From<e14z_errors::Error> for CliError {
    fn from(e: e14z_errors::Error) -> Self {
        match e {
            e14z_errors::Error::Config(_) => CliError::Config(e),
            other => CliError::Ops(other),
        }
    }
}

impl From<e14z_errors::ParseError> for CliError {
    fn from(e: e14z_errors::ParseError) -> Self {
        CliError::Ops(e.into())
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}
