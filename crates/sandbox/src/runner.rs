//! The process-launching seam

use std::time::Duration;

use async_trait::async_trait;
use e14z_errors::Error;
use tokio_util::sync::CancellationToken;

use crate::{ExecOutput, ExecRequest};

/// Launches sandboxed processes
///
/// The installer only talks to this trait, which keeps install logic
/// testable without spawning anything.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run to completion, feeding `request.stdin` if any
    async fn run(&self, request: ExecRequest, cancel: CancellationToken)
        -> Result<ExecOutput, Error>;

    /// Start a long-lived child with piped stdio for line-based exchange
    async fn spawn(
        &self,
        request: ExecRequest,
        cancel: CancellationToken,
    ) -> Result<Box<dyn ChildSession>, Error>;
}

/// A running child spoken to one line at a time
#[async_trait]
pub trait ChildSession: Send {
    /// Write `line` plus a newline to stdin
    async fn send_line(&mut self, line: &str) -> Result<(), Error>;

    /// Next stdout line, `None` on EOF
    ///
    /// Fails with a timeout error if nothing arrives within `timeout`, and
    /// with [`Error::Cancelled`] if the session's token fires.
    async fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, Error>;

    /// Close stdin and reap the child, escalating to signals if it lingers
    async fn finish(self: Box<Self>) -> Result<ExecOutput, Error>;
}
