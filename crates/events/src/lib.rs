#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Event system for async communication in e14z
//!
//! Library crates never print. They report progress through an unbounded
//! channel of [`AppEvent`]s; the CLI drains the channel and forwards each
//! event to `tracing` at the level the event carries.

pub mod meta;
pub use meta::{EventLevel, EventMeta, EventSource};

pub mod events;
pub use events::{
    AppEvent, CacheEvent, EvictionReason, FailureContext, GeneralEvent, InstallEvent,
    OutputStream, ProcessEvent, SecurityEvent,
};

use std::time::Duration;

use e14z_errors::{ClassifiedError, ErrorCategory};
use e14z_types::InstallPhase;
use tokio::sync::mpsc::UnboundedSender;

/// Type alias for event sender using the `AppEvent` system
pub type EventSender = UnboundedSender<AppEvent>;

/// Type alias for event receiver using the `AppEvent` system
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<AppEvent>;

/// Create a new event channel with the `AppEvent` system
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// The unified trait for emitting events throughout e14z
///
/// Implemented by the raw `EventSender` and by any component that holds an
/// optional sender.
pub trait EventEmitter {
    /// Get the event sender for this emitter
    fn event_sender(&self) -> Option<&EventSender>;

    /// Emit an event through this emitter
    fn emit(&self, event: AppEvent) {
        if let Some(sender) = self.event_sender() {
            // Ignore send errors - if receiver is dropped, we just continue
            let _ = sender.send(event);
        }
    }

    fn emit_debug(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::debug(message)));
    }

    fn emit_warning(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::warning(message)));
    }

    /// Emit a warning event with context
    fn emit_warning_with_context(&self, message: impl Into<String>, context: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::warning_with_context(
            message, context,
        )));
    }

    fn emit_error(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::error(message)));
    }

    /// Emit a state machine transition
    fn emit_phase(&self, slug: impl Into<String>, phase: InstallPhase) {
        self.emit(AppEvent::Install(InstallEvent::PhaseChanged {
            slug: slug.into(),
            phase,
        }));
    }

    /// Emit a scheduled retry
    fn emit_retry(
        &self,
        slug: impl Into<String>,
        attempt: u32,
        category: ErrorCategory,
        delay: Duration,
        error: impl Into<String>,
    ) {
        self.emit(AppEvent::Install(InstallEvent::RetryScheduled {
            slug: slug.into(),
            attempt,
            category,
            delay,
            error: error.into(),
        }));
    }

    /// Emit a terminal failure for a request
    fn emit_install_failed(&self, slug: impl Into<String>, classified: &ClassifiedError) {
        self.emit(AppEvent::Install(InstallEvent::Failed {
            slug: slug.into(),
            category: classified.category(),
            failure: FailureContext::new(
                Some(classified.category().as_str()),
                classified.message(),
                classified.suggestions().first().cloned(),
                classified.recoverable(),
            ),
        }));
    }
}

/// Implementation of `EventEmitter` for the raw `EventSender`
/// This allows `EventSender` to be used directly where `EventEmitter` is expected
impl EventEmitter for EventSender {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(self)
    }
}

/// Forward an event to `tracing` at its own level
pub fn log_event(event: &AppEvent) {
    let meta = event.meta();
    let target = event.log_target();
    let fields = event.log_fields();
    let correlation_id = meta.correlation_id.as_deref().unwrap_or("-");
    macro_rules! log_at {
        ($mac:ident) => {
            tracing::$mac!(
                event_target = target,
                event_id = %meta.event_id,
                correlation_id = %correlation_id,
                source = meta.source.as_str(),
                "{fields}"
            )
        };
    }
    match meta.tracing_level() {
        tracing::Level::ERROR => log_at!(error),
        tracing::Level::WARN => log_at!(warn),
        tracing::Level::INFO => log_at!(info),
        tracing::Level::DEBUG => log_at!(debug),
        tracing::Level::TRACE => log_at!(trace),
    }
}
