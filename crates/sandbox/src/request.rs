//! Execution requests and their results

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use e14z_errors::{Error, ExecError};

use crate::ResourceLimits;

/// How many trailing bytes of stderr are kept for error reports
const STDERR_TAIL_BYTES: usize = 2048;

/// A single sandboxed invocation: program, argv, and its environment
///
/// The program is resolved through `PATH` and executed directly. No shell
/// is involved, so arguments are passed verbatim.
#[derive(Debug, Clone, Default)]
pub struct ExecRequest {
    pub command: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Variables added on top of the passthrough set
    pub env: BTreeMap<String, String>,
    /// Written to stdin, which is then closed; `None` attaches `/dev/null`
    pub stdin: Option<Vec<u8>>,
    /// Overrides the executor's default deadline
    pub timeout: Option<Duration>,
    /// Overrides the executor's default limits
    pub limits: Option<ResourceLimits>,
    /// The package's own binary, allowed for this request only
    pub package_bin: Option<String>,
}

impl ExecRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn envs(mut self, vars: &BTreeMap<String, String>) -> Self {
        self.env
            .extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    #[must_use]
    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    #[must_use]
    pub fn package_bin(mut self, bin: impl Into<String>) -> Self {
        self.package_bin = Some(bin.into());
        self
    }

    /// `command arg1 arg2 ...` for logs and reports
    #[must_use]
    pub fn display(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How a child process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitState {
    Exited(i32),
    Signaled(i32),
    /// Killed after the wall-clock deadline
    TimedOut { after_ms: u64 },
    /// Killed because the caller cancelled
    Cancelled,
}

/// Everything observed about a finished child
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub status: ExitState,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Set when either stream exceeded the capture limit
    pub truncated: bool,
    pub duration: Duration,
}

impl ExecOutput {
    #[must_use]
    pub fn code(&self) -> Option<i32> {
        match self.status {
            ExitState::Exited(code) => Some(code),
            _ => None,
        }
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.status == ExitState::Exited(0)
    }

    #[must_use]
    pub fn timed_out(&self) -> bool {
        matches!(self.status, ExitState::TimedOut { .. })
    }

    #[must_use]
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    #[must_use]
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Last couple of KiB of stderr, trimmed
    #[must_use]
    pub fn stderr_tail(&self) -> String {
        let start = self.stderr.len().saturating_sub(STDERR_TAIL_BYTES);
        String::from_utf8_lossy(&self.stderr[start..])
            .trim()
            .to_string()
    }

    /// Turn anything but a clean exit into an error
    ///
    /// # Errors
    ///
    /// Non-zero exits, signals and deadlines map to [`ExecError`];
    /// cancellation maps to [`Error::Cancelled`].
    pub fn check(self, command: &str) -> Result<Self, Error> {
        match self.status {
            ExitState::Exited(0) => Ok(self),
            ExitState::Exited(code) => Err(ExecError::NonZeroExit {
                command: command.to_string(),
                code,
                stderr: self.stderr_tail(),
            }
            .into()),
            ExitState::Signaled(signal) => Err(ExecError::Signaled {
                command: command.to_string(),
                signal,
            }
            .into()),
            ExitState::TimedOut { after_ms } => Err(ExecError::Timeout {
                command: command.to_string(),
                timeout_ms: after_ms,
            }
            .into()),
            ExitState::Cancelled => Err(Error::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(status: ExitState, stderr: &str) -> ExecOutput {
        ExecOutput {
            status,
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
            truncated: false,
            duration: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_builder() {
        let req = ExecRequest::new("npx")
            .args(["-y", "pkg"])
            .env("TOKEN", "x")
            .timeout(Duration::from_secs(1));
        assert_eq!(req.display(), "npx -y pkg");
        assert_eq!(req.env.get("TOKEN").map(String::as_str), Some("x"));
        assert!(req.stdin.is_none());
    }

    #[test]
    fn test_check_maps_status() {
        assert!(output(ExitState::Exited(0), "").check("x").is_ok());

        let err = output(ExitState::Exited(2), "boom\n").check("x").unwrap_err();
        assert!(matches!(
            err,
            Error::Exec(ExecError::NonZeroExit { code: 2, ref stderr, .. }) if stderr == "boom"
        ));

        let err = output(ExitState::TimedOut { after_ms: 100 }, "")
            .check("x")
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Exec(ExecError::Timeout { timeout_ms: 100, .. })
        ));

        assert!(matches!(
            output(ExitState::Cancelled, "").check("x"),
            Err(Error::Cancelled)
        ));
    }

    #[test]
    fn test_stderr_tail_is_bounded() {
        let long = "e".repeat(STDERR_TAIL_BYTES * 2);
        assert_eq!(output(ExitState::Exited(1), &long).stderr_tail().len(), STDERR_TAIL_BYTES);
    }
}
