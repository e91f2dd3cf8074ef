//! Spawning, supervising and terminating sandboxed children

use std::path::{Component, Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use e14z_config::Config;
use e14z_errors::{Error, ExecError, SecurityError};
use e14z_events::{AppEvent, EventEmitter, EventSender, OutputStream, ProcessEvent};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use crate::output::{self, OutputBuffer};
use crate::session::ProcessSession;
use crate::{
    ChildSession, CommandSanitizer, ExecOutput, ExecRequest, ExitState, ProcessRunner,
    ResourceLimits,
};

/// Used when neither the passthrough set nor the request provides `PATH`
const FALLBACK_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Runs allow-listed programs with a scrubbed environment and hard limits
#[derive(Debug, Clone)]
pub struct SandboxedExecutor {
    sanitizer: CommandSanitizer,
    env_passthrough: Vec<String>,
    default_timeout: Duration,
    kill_grace: Duration,
    max_output_bytes: usize,
    limits: ResourceLimits,
    root: Option<PathBuf>,
    tx: Option<EventSender>,
}

impl SandboxedExecutor {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            sanitizer: CommandSanitizer::from_config(&config.security),
            env_passthrough: config.sandbox.env_passthrough.clone(),
            default_timeout: config.sandbox.timeout(),
            kill_grace: config.sandbox.kill_grace(),
            max_output_bytes: config.sandbox.max_output_bytes,
            limits: ResourceLimits::from_config(&config.sandbox),
            root: None,
            tx: None,
        }
    }

    #[must_use]
    pub fn with_sanitizer(mut self, sanitizer: CommandSanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Require every working directory to live under `root`
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    #[must_use]
    pub fn sanitizer(&self) -> &CommandSanitizer {
        &self.sanitizer
    }

    /// Run `request` to completion with no external cancellation
    ///
    /// # Errors
    ///
    /// Returns an error if the request is rejected or the child cannot be spawned.
    pub async fn execute(&self, request: ExecRequest) -> Result<ExecOutput, Error> {
        self.run(request, CancellationToken::new()).await
    }

    fn check_cwd(&self, cwd: &Path) -> Result<(), SecurityError> {
        let Some(root) = &self.root else {
            return Ok(());
        };
        let escapes = cwd
            .components()
            .any(|c| matches!(c, Component::ParentDir))
            || !cwd.starts_with(root);
        if escapes {
            return Err(SecurityError::PathEscape {
                path: cwd.display().to_string(),
            });
        }
        Ok(())
    }

    /// Validate the request and build the command; nothing runs yet
    fn prepare(&self, request: &ExecRequest, interactive: bool) -> Result<Command, Error> {
        let program = self
            .sanitizer
            .sanitize_command_for(&request.command, request.package_bin.as_deref())?;
        let args = self.sanitizer.sanitize_args(&request.args)?;
        self.sanitizer.sanitize_env(&request.env)?;
        if let Some(cwd) = &request.cwd {
            self.check_cwd(cwd)?;
        }

        let mut cmd = Command::new(&program);
        cmd.args(&args).env_clear();
        let mut has_path = request.env.contains_key("PATH");
        for name in &self.env_passthrough {
            if let Ok(value) = std::env::var(name) {
                has_path |= name == "PATH";
                cmd.env(name, value);
            }
        }
        if !has_path {
            cmd.env("PATH", FALLBACK_PATH);
        }
        cmd.envs(&request.env);
        if let Some(cwd) = &request.cwd {
            cmd.current_dir(cwd);
        }

        let stdin = if interactive || request.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        };
        cmd.stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        {
            let limits = request.limits.unwrap_or(self.limits);
            // Own process group so termination reaches grandchildren too.
            cmd.process_group(0);
            #[allow(unsafe_code)]
            // SAFETY: the hook only issues getrlimit/setrlimit syscalls,
            // which are async-signal-safe and do not allocate.
            unsafe {
                cmd.pre_exec(move || limits.apply());
            }
        }

        Ok(cmd)
    }

    fn spawn_child(&self, mut cmd: Command, request: &ExecRequest) -> Result<Child, Error> {
        let child = cmd.spawn().map_err(|e| ExecError::SpawnFailed {
            command: request.command.clone(),
            message: e.to_string(),
        })?;
        tracing::debug!(command = %request.display(), pid = ?child.id(), "spawned sandboxed process");
        self.emit(AppEvent::Process(ProcessEvent::Spawned {
            command: request.command.clone(),
            args: request.args.clone(),
            pid: child.id(),
        }));
        Ok(child)
    }

    pub(crate) fn kill_grace(&self) -> Duration {
        self.kill_grace
    }

    pub(crate) fn max_output_bytes(&self) -> usize {
        self.max_output_bytes
    }

    pub(crate) fn report_truncated(&self, command: &str, stream: OutputStream) {
        tracing::warn!(command, ?stream, limit = self.max_output_bytes, "output truncated");
        self.emit(AppEvent::Process(ProcessEvent::OutputTruncated {
            command: command.to_string(),
            stream,
            limit: self.max_output_bytes,
        }));
    }

    pub(crate) fn report_exit(&self, command: &str, output: &ExecOutput) {
        self.emit(AppEvent::Process(ProcessEvent::Exited {
            command: command.to_string(),
            code: output.code(),
            duration: output.duration,
        }));
    }
}

impl EventEmitter for SandboxedExecutor {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

enum Waited {
    Exited(std::io::Result<ExitStatus>),
    Deadline,
    Cancelled,
}

#[async_trait]
impl ProcessRunner for SandboxedExecutor {
    async fn run(
        &self,
        request: ExecRequest,
        cancel: CancellationToken,
    ) -> Result<ExecOutput, Error> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let cmd = self.prepare(&request, false)?;
        let started = Instant::now();
        let mut child = self.spawn_child(cmd, &request)?;

        if let (Some(input), Some(mut stdin)) = (request.stdin.clone(), child.stdin.take()) {
            tokio::spawn(async move {
                // a child that exits without reading stdin is not an error
                let _ = stdin.write_all(&input).await;
            });
        }
        let stdout = OutputBuffer::new(self.max_output_bytes);
        let stderr = OutputBuffer::new(self.max_output_bytes);
        let stdout_task = output::drain(child.stdout.take(), stdout.clone());
        let stderr_task = output::drain(child.stderr.take(), stderr.clone());

        let timeout = request.timeout.unwrap_or(self.default_timeout);
        let waited = tokio::select! {
            status = child.wait() => Waited::Exited(status),
            () = tokio::time::sleep(timeout) => Waited::Deadline,
            () = cancel.cancelled() => Waited::Cancelled,
        };

        let status = match waited {
            Waited::Exited(status) => exit_state(status.map_err(|e| ExecError::PipeFailed {
                message: e.to_string(),
            })?),
            Waited::Deadline => {
                terminate(&mut child, self.kill_grace, &request.command, self).await;
                ExitState::TimedOut {
                    after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                }
            }
            Waited::Cancelled => {
                terminate(&mut child, self.kill_grace, &request.command, self).await;
                ExitState::Cancelled
            }
        };

        // Grandchildren may hold the pipes open; do not wait on them forever.
        let _ = tokio::time::timeout(self.kill_grace, stdout_task).await;
        let _ = tokio::time::timeout(self.kill_grace, stderr_task).await;
        let out = stdout.take();
        let err = stderr.take();
        if out.truncated {
            self.report_truncated(&request.command, OutputStream::Stdout);
        }
        if err.truncated {
            self.report_truncated(&request.command, OutputStream::Stderr);
        }
        let output = ExecOutput {
            status,
            stdout: out.data,
            stderr: err.data,
            truncated: out.truncated || err.truncated,
            duration: started.elapsed(),
        };
        self.report_exit(&request.command, &output);
        Ok(output)
    }

    async fn spawn(
        &self,
        request: ExecRequest,
        cancel: CancellationToken,
    ) -> Result<Box<dyn ChildSession>, Error> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let cmd = self.prepare(&request, true)?;
        let child = self.spawn_child(cmd, &request)?;
        Ok(Box::new(ProcessSession::new(
            child,
            request.command,
            cancel,
            self.clone(),
        )?))
    }
}

pub(crate) fn exit_state(status: ExitStatus) -> ExitState {
    if let Some(code) = status.code() {
        return ExitState::Exited(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return ExitState::Signaled(signal);
        }
    }
    ExitState::Exited(-1)
}

/// SIGTERM the child's process group, then SIGKILL after `grace`
///
/// Returns the reaped status when one could be collected.
pub(crate) async fn terminate(
    child: &mut Child,
    grace: Duration,
    command: &str,
    emitter: &impl EventEmitter,
) -> Option<ExitStatus> {
    if let Ok(Some(status)) = child.try_wait() {
        return Some(status);
    }
    emitter.emit(AppEvent::Process(ProcessEvent::Terminating {
        command: command.to_string(),
        signal: "SIGTERM".to_string(),
    }));
    signal_group(child, false);
    if let Ok(Ok(status)) = tokio::time::timeout(grace, child.wait()).await {
        return Some(status);
    }

    tracing::warn!(command, "process ignored SIGTERM, sending SIGKILL");
    emitter.emit(AppEvent::Process(ProcessEvent::Terminating {
        command: command.to_string(),
        signal: "SIGKILL".to_string(),
    }));
    signal_group(child, true);
    let _ = child.start_kill();
    child.wait().await.ok()
}

#[cfg(unix)]
fn signal_group(child: &Child, force: bool) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    let signal = if force { Signal::SIGKILL } else { Signal::SIGTERM };
    // ESRCH just means the group is already gone
    let _ = killpg(Pid::from_raw(pid), signal);
}

#[cfg(not(unix))]
fn signal_group(child: &mut Child, _force: bool) {
    let _ = child.start_kill();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cwd_confined_to_root() {
        let executor = SandboxedExecutor::new(&Config::default()).with_root("/tmp/e14z");
        assert!(executor.check_cwd(Path::new("/tmp/e14z/pkg")).is_ok());
        assert!(executor.check_cwd(Path::new("/etc")).is_err());
        assert!(executor
            .check_cwd(Path::new("/tmp/e14z/pkg/../../../etc"))
            .is_err());
    }

    #[test]
    fn test_prepare_rejects_before_spawn() {
        let executor = SandboxedExecutor::new(&Config::default());
        let err = executor
            .prepare(&ExecRequest::new("node").arg("x; rm -rf /"), false)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Security(SecurityError::UnsafeArgument { index: 0, .. })
        ));
        let err = executor.prepare(&ExecRequest::new("bash"), false).unwrap_err();
        assert!(matches!(
            err,
            Error::Security(SecurityError::CommandNotAllowed { .. })
        ));
    }
}
