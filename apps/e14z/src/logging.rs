//! Tracing setup and the event drain
//!
//! Library crates report through the event channel; this module turns
//! those events into `tracing` records and owns the only subscriber.

use e14z_events::{log_event, AppEvent, EventReceiver};
use std::future::Future;
use tokio::select;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber
///
/// `RUST_LOG` wins over the configured filter; `--debug` wins over both.
/// Logs always go to stderr so `--json` output on stdout stays clean.
pub fn init_tracing(filter: &str, json_logs: bool, debug: bool) {
    let env_filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter))
    };

    if json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_env_filter(env_filter)
            .init();
    }
}

/// Drive `command` while forwarding every event it emits to `tracing`
pub async fn with_events<T>(
    command: impl Future<Output = T>,
    mut events: EventReceiver,
) -> T {
    let mut command = Box::pin(command);
    loop {
        select! {
            result = &mut command => {
                while let Ok(event) = events.try_recv() {
                    handle_event(&event);
                }
                return result;
            }
            event = events.recv() => {
                match event {
                    Some(event) => handle_event(&event),
                    None => {
                        // every sender is gone; just wait for the command
                        return command.await;
                    }
                }
            }
        }
    }
}

fn handle_event(event: &AppEvent) {
    log_event(event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use e14z_events::EventEmitter;

    #[tokio::test]
    async fn test_events_drained_after_completion() {
        let (tx, rx) = e14z_events::channel();
        let value = with_events(
            async move {
                tx.emit_debug("one");
                tx.emit_warning("two");
                7
            },
            rx,
        )
        .await;
        assert_eq!(value, 7);
    }
}
