use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which output stream a process event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Sandboxed child process events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProcessEvent {
    Spawned {
        command: String,
        args: Vec<String>,
        pid: Option<u32>,
    },

    Exited {
        command: String,
        code: Option<i32>,
        duration: Duration,
    },

    /// Deadline or cancellation hit; termination is escalating
    Terminating {
        command: String,
        signal: String,
    },

    OutputTruncated {
        command: String,
        stream: OutputStream,
        limit: usize,
    },
}
