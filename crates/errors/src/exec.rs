//! Sandboxed process execution error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ExecError {
    #[error("failed to spawn {command}: {message}")]
    SpawnFailed { command: String, message: String },

    #[error("{command} timed out after {timeout_ms}ms")]
    Timeout { command: String, timeout_ms: u64 },

    #[error("{command} exited with code {code}: {stderr}")]
    NonZeroExit {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("{command} terminated by signal {signal}")]
    Signaled { command: String, signal: i32 },

    #[error("failed to apply resource limits: {message}")]
    LimitsFailed { message: String },

    #[error("I/O with child process failed: {message}")]
    PipeFailed { message: String },

    #[error("MCP handshake failed: {message}")]
    ProtocolFailed { message: String },
}

impl UserFacingError for ExecError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::SpawnFailed { .. } => {
                Some("Make sure the launcher (npx, python, docker, git) is installed and on PATH.")
            }
            Self::Timeout { .. } => Some("Increase the timeout and retry."),
            Self::NonZeroExit { .. } | Self::Signaled { .. } => {
                Some("Inspect the captured stderr for the package's own error message.")
            }
            Self::ProtocolFailed { .. } => {
                Some("The package did not answer the MCP handshake; it may not be an MCP server.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::SpawnFailed { .. } => "exec.spawn_failed",
            Self::Timeout { .. } => "exec.timeout",
            Self::NonZeroExit { .. } => "exec.non_zero_exit",
            Self::Signaled { .. } => "exec.signaled",
            Self::LimitsFailed { .. } => "exec.limits_failed",
            Self::PipeFailed { .. } => "exec.pipe_failed",
            Self::ProtocolFailed { .. } => "exec.protocol_failed",
        };
        Some(code)
    }
}
