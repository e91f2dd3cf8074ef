//! Line-oriented session with a running child

use std::time::{Duration, Instant};

use async_trait::async_trait;
use e14z_errors::{Error, ExecError};
use e14z_events::OutputStream;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::executor::{exit_state, terminate};
use crate::output::{self, OutputBuffer};
use crate::{ChildSession, ExecOutput, ExitState, SandboxedExecutor};

pub(crate) struct ProcessSession {
    child: Child,
    command: String,
    stdin: Option<ChildStdin>,
    reader: BufReader<ChildStdout>,
    /// Bytes of a line not yet terminated by `\n`
    pending: Vec<u8>,
    stdout: OutputBuffer,
    stderr: OutputBuffer,
    stderr_task: JoinHandle<()>,
    cancel: CancellationToken,
    started: Instant,
    executor: SandboxedExecutor,
}

impl ProcessSession {
    pub fn new(
        mut child: Child,
        command: String,
        cancel: CancellationToken,
        executor: SandboxedExecutor,
    ) -> Result<Self, Error> {
        let stdout = child.stdout.take().ok_or_else(|| ExecError::PipeFailed {
            message: format!("{command}: stdout not captured"),
        })?;
        let stderr = OutputBuffer::new(executor.max_output_bytes());
        let stderr_task = output::drain(child.stderr.take(), stderr.clone());
        Ok(Self {
            stdin: child.stdin.take(),
            reader: BufReader::new(stdout),
            pending: Vec::new(),
            stdout: OutputBuffer::new(executor.max_output_bytes()),
            stderr,
            stderr_task,
            child,
            command,
            cancel,
            started: Instant::now(),
            executor,
        })
    }

    fn pipe_error(&self, err: &std::io::Error) -> Error {
        ExecError::PipeFailed {
            message: format!("{}: {err}", self.command),
        }
        .into()
    }
}

#[async_trait]
impl ChildSession for ProcessSession {
    async fn send_line(&mut self, line: &str) -> Result<(), Error> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(ExecError::PipeFailed {
                message: format!("{}: stdin already closed", self.command),
            }
            .into());
        };
        let written = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        }
        .await;
        written.map_err(|e| self.pipe_error(&e))
    }

    /// Reads at most `max_output_bytes + 1` bytes per line, so a child that
    /// never sends a newline cannot grow the buffer past the output limit.
    async fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, Error> {
        let limit = self.stdout.limit();
        let room = limit.saturating_add(1).saturating_sub(self.pending.len());
        let mut bounded = (&mut self.reader).take(u64::try_from(room).unwrap_or(u64::MAX));
        let read = tokio::select! {
            read = bounded.read_until(b'\n', &mut self.pending) => read,
            () = tokio::time::sleep(timeout) => {
                return Err(ExecError::Timeout {
                    command: self.command.clone(),
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                }
                .into());
            }
            () = self.cancel.cancelled() => return Err(Error::Cancelled),
        };
        read.map_err(|e| self.pipe_error(&e))?;

        let terminated = self.pending.last() == Some(&b'\n');
        if !terminated && self.pending.len() > limit {
            self.pending.clear();
            return Err(ExecError::ProtocolFailed {
                message: format!("{}: stdout line exceeds {limit} bytes", self.command),
            }
            .into());
        }
        // Anything short of the limit without a newline is the tail before EOF
        if self.pending.is_empty() {
            return Ok(None);
        }

        let mut bytes = std::mem::take(&mut self.pending);
        if terminated {
            bytes.pop();
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
        }
        self.stdout.push(&bytes);
        self.stdout.push(b"\n");
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    async fn finish(self: Box<Self>) -> Result<ExecOutput, Error> {
        let mut this = *self;
        // EOF on stdin is the polite way to ask a stdio server to exit
        drop(this.stdin.take());
        let grace = this.executor.kill_grace();
        let status = match tokio::time::timeout(grace, this.child.wait()).await {
            Ok(Ok(status)) => Some(status),
            _ => terminate(&mut this.child, grace, &this.command, &this.executor).await,
        };
        let _ = tokio::time::timeout(grace, this.stderr_task).await;

        let out = this.stdout.take();
        let err = this.stderr.take();
        if err.truncated {
            this.executor
                .report_truncated(&this.command, OutputStream::Stderr);
        }
        let output = ExecOutput {
            status: status.map_or(ExitState::Signaled(9), exit_state),
            stdout: out.data,
            stderr: err.data,
            truncated: out.truncated || err.truncated,
            duration: this.started.elapsed(),
        };
        this.executor.report_exit(&this.command, &output);
        Ok(output)
    }
}
