use serde::{Deserialize, Serialize};

use crate::EventSource;
use e14z_errors::UserFacingError;

/// Structured failure information shared across domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short user-facing message.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether retrying the operation might succeed.
    pub retryable: bool,
}

impl FailureContext {
    /// Construct a new failure context.
    #[must_use]
    pub fn new(
        code: Option<impl Into<String>>,
        message: impl Into<String>,
        hint: Option<impl Into<String>>,
        retryable: bool,
    ) -> Self {
        Self {
            code: code.map(Into::into),
            message: message.into(),
            hint: hint.map(Into::into),
            retryable,
        }
    }

    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self::new(
            error.user_code(),
            error.user_message().into_owned(),
            error.user_hint(),
            error.is_retryable(),
        )
    }
}

pub mod cache;
pub mod general;
pub mod install;
pub mod process;
pub mod security;

pub use cache::*;
pub use general::*;
pub use install::*;
pub use process::*;
pub use security::*;

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// General utility events (warnings, errors, operations)
    General(GeneralEvent),

    /// Install-and-run state machine
    Install(InstallEvent),

    Cache(CacheEvent),

    /// Verification verdicts and rejected commands
    Security(SecurityEvent),

    Process(ProcessEvent),
}

impl AppEvent {
    /// Identify the source domain for this event (used for metadata/logging).
    #[must_use]
    pub fn event_source(&self) -> EventSource {
        match self {
            Self::General(_) => EventSource::GENERAL,
            Self::Install(_) => EventSource::INSTALL,
            Self::Cache(_) => EventSource::CACHE,
            Self::Security(_) => EventSource::SECURITY,
            Self::Process(_) => EventSource::PROCESS,
        }
    }

    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            Self::General(GeneralEvent::Error { .. })
            | Self::Install(InstallEvent::Failed { .. })
            | Self::Security(SecurityEvent::Blocked { .. }) => Level::ERROR,

            Self::General(GeneralEvent::Warning { .. })
            | Self::Install(InstallEvent::RetryScheduled { .. } | InstallEvent::RolledBack { .. })
            | Self::Cache(CacheEvent::IntegrityFailed { .. })
            | Self::Security(SecurityEvent::CommandRejected { .. })
            | Self::Process(
                ProcessEvent::Terminating { .. } | ProcessEvent::OutputTruncated { .. },
            ) => Level::WARN,

            Self::General(GeneralEvent::DebugLog { .. })
            | Self::Cache(CacheEvent::Hit { .. } | CacheEvent::Miss { .. })
            | Self::Process(ProcessEvent::Spawned { .. } | ProcessEvent::Exited { .. }) => {
                Level::DEBUG
            }

            _ => Level::INFO,
        }
    }

    /// Get the log target for this event (for structured logging)
    #[must_use]
    pub fn log_target(&self) -> &'static str {
        match self {
            Self::General(_) => "e14z::events::general",
            Self::Install(_) => "e14z::events::install",
            Self::Cache(_) => "e14z::events::cache",
            Self::Security(_) => "e14z::events::security",
            Self::Process(_) => "e14z::events::process",
        }
    }

    /// Metadata for this event, stamped now
    #[must_use]
    pub fn meta(&self) -> crate::EventMeta {
        let meta = crate::EventMeta::new(self.log_level().into(), self.event_source());
        match self.correlation_id() {
            Some(id) => meta.with_correlation_id(id),
            None => meta,
        }
    }

    /// What related events share: the request slug, `name@version` for
    /// cache events, the package for verdicts, the command for processes
    #[must_use]
    pub fn correlation_id(&self) -> Option<String> {
        match self {
            Self::Install(
                InstallEvent::PhaseChanged { slug, .. }
                | InstallEvent::RetryScheduled { slug, .. }
                | InstallEvent::RolledBack { slug, .. }
                | InstallEvent::Completed { slug, .. }
                | InstallEvent::Failed { slug, .. },
            ) => Some(slug.clone()),
            Self::Install(InstallEvent::JournalRecovered { transaction_id, .. }) => {
                Some(transaction_id.clone())
            }
            Self::Cache(
                CacheEvent::Hit { name, version }
                | CacheEvent::Miss { name, version }
                | CacheEvent::Added { name, version, .. }
                | CacheEvent::IntegrityFailed { name, version, .. }
                | CacheEvent::Evicted { name, version, .. },
            ) => Some(format!("{name}@{version}")),
            Self::Security(
                SecurityEvent::VerificationCompleted { package, .. }
                | SecurityEvent::Blocked { package, .. },
            ) => Some(package.clone()),
            Self::Security(SecurityEvent::CommandRejected { command, .. })
            | Self::Process(
                ProcessEvent::Spawned { command, .. }
                | ProcessEvent::Exited { command, .. }
                | ProcessEvent::Terminating { command, .. }
                | ProcessEvent::OutputTruncated { command, .. },
            ) => Some(command.clone()),
            Self::General(_) | Self::Cache(CacheEvent::CleanupCompleted { .. }) => None,
        }
    }

    /// Event payload as a JSON string, for structured log fields
    #[must_use]
    pub fn log_fields(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}
