#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Sandboxed execution of untrusted package commands
//!
//! Everything that launches a child process goes through here:
//! - [`CommandSanitizer`] allow-lists the program and rejects shell
//!   metacharacters in every argument. No shell is ever involved.
//! - [`SandboxedExecutor`] spawns with a cleared environment, rlimits,
//!   a wall-clock deadline, bounded output capture and SIGTERM/SIGKILL
//!   escalation on timeout or cancellation.
//! - [`McpProbe`] speaks JSON-RPC over a [`ChildSession`] to list the
//!   tools an MCP server exposes.
//!
//! [`ProcessRunner`] is the seam the installer is written against, so it
//! can be exercised without spawning anything.

mod auth;
mod executor;
mod limits;
mod output;
mod probe;
mod request;
mod runner;
mod sanitizer;
mod session;

pub use auth::detect_auth_env_vars;
pub use executor::SandboxedExecutor;
pub use limits::ResourceLimits;
pub use probe::{McpProbe, ProbeReport, PROTOCOL_VERSION};
pub use request::{ExecOutput, ExecRequest, ExitState};
pub use runner::{ChildSession, ProcessRunner};
pub use sanitizer::{sanitize_args, CommandSanitizer};
