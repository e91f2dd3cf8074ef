#![warn(clippy::pedantic)]
#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

//! Package installation and launch for e14z
//!
//! This crate drives one install-and-run request end to end: fetch the
//! install spec, verify it, install into the content-addressed cache under
//! a rollback-capable transaction, then start the server and probe it over
//! MCP. Failures are retried according to their classification.

mod installer;
mod plan;
mod registry;
mod resources;
mod retry;
mod transaction;

pub use installer::AutoInstaller;
pub use plan::InstallPlan;
pub use registry::{Registry, StaticRegistry};
pub use resources::{acquire_semaphore_permit, create_semaphore};
pub use retry::{execute_with_retry, execute_with_retry_notify, RetryNotice, RetryPolicy};
pub use transaction::{
    recover_journals, InstallationTransaction, Operation, OperationKind, RollbackReport,
};

// Re-export EventSender for callers wiring up the event channel
pub use e14z_events::EventSender;
