use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use e14z_errors::ErrorCategory;
use e14z_types::InstallPhase;

use super::FailureContext;

/// Install-and-run lifecycle events, one stream per request slug
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InstallEvent {
    /// The state machine entered a new phase
    PhaseChanged { slug: String, phase: InstallPhase },

    /// A recoverable failure will be retried after `delay`
    RetryScheduled {
        slug: String,
        attempt: u32,
        category: ErrorCategory,
        delay: Duration,
        error: String,
    },

    /// Recorded operations were undone
    RolledBack {
        slug: String,
        removed: usize,
        failed: usize,
    },

    /// Stale journals from a previous run were cleaned up
    JournalRecovered { transaction_id: String, removed: usize },

    Completed {
        slug: String,
        tools: usize,
        cache_dir: PathBuf,
        duration: Duration,
    },

    Failed {
        slug: String,
        category: ErrorCategory,
        failure: FailureContext,
    },
}
