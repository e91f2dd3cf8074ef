//! Integration tests for events

#[cfg(test)]
mod tests {
    use e14z_errors::categorize_message;
    use e14z_events::*;
    use e14z_types::InstallPhase;

    #[tokio::test]
    async fn test_event_sender_emits_in_order() {
        let (tx, mut rx) = channel();

        tx.emit_error("test error");
        tx.emit_phase("weather", InstallPhase::Verifying);

        let first = rx.recv().await.unwrap();
        assert!(matches!(
            first,
            AppEvent::General(GeneralEvent::Error { .. })
        ));

        let second = rx.recv().await.unwrap();
        match second {
            AppEvent::Install(InstallEvent::PhaseChanged { slug, phase }) => {
                assert_eq!(slug, "weather");
                assert_eq!(phase, InstallPhase::Verifying);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dropped_receiver() {
        let (tx, rx) = channel();
        drop(rx);

        // Should not panic when receiver is dropped
        tx.emit_warning("ignored");
    }

    #[tokio::test]
    async fn test_failure_event_carries_classification() {
        let (tx, mut rx) = channel();
        let classified = categorize_message("EACCES: permission denied, mkdir");
        tx.emit_install_failed("fs-server", &classified);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.log_level(), tracing::Level::ERROR);
        assert_eq!(event.event_source().as_str(), "install");
        match event {
            AppEvent::Install(InstallEvent::Failed {
                category, failure, ..
            }) => {
                assert_eq!(category.as_str(), "permission");
                assert!(failure.retryable);
                assert!(failure.hint.is_some());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = AppEvent::Cache(CacheEvent::Evicted {
            name: "left-pad".into(),
            version: "1.3.0".into(),
            reason: EvictionReason::Expired,
            size: 10,
        });
        let json: serde_json::Value = serde_json::from_str(&event.log_fields()).unwrap();
        assert_eq!(json["domain"], "cache");
        assert_eq!(json["event"]["type"], "Evicted");
        assert_eq!(json["event"]["reason"], "expired");
    }

    #[test]
    fn test_meta_level_mapping() {
        let event = AppEvent::Process(ProcessEvent::Terminating {
            command: "node".into(),
            signal: "SIGTERM".into(),
        });
        let meta = event.meta();
        assert_eq!(meta.level, EventLevel::Warn);
        assert_eq!(meta.tracing_level(), tracing::Level::WARN);
        assert_eq!(meta.source, EventSource::PROCESS);
        assert_eq!(meta.correlation_id.as_deref(), Some("node"));
    }

    #[test]
    fn test_related_events_share_correlation_id() {
        let phase = AppEvent::Install(InstallEvent::PhaseChanged {
            slug: "weather".into(),
            phase: InstallPhase::Installing,
        });
        let failed = AppEvent::Install(InstallEvent::Failed {
            slug: "weather".into(),
            category: categorize_message("ENOTFOUND").category(),
            failure: FailureContext::new(None::<String>, "offline", None::<String>, true),
        });
        let hit = AppEvent::Cache(CacheEvent::Hit {
            name: "@scope/pkg".into(),
            version: "1.0.0".into(),
        });

        let (a, b) = (phase.meta(), failed.meta());
        assert_eq!(a.correlation_id.as_deref(), Some("weather"));
        assert_eq!(a.correlation_id, b.correlation_id);
        assert_ne!(a.event_id, b.event_id);
        assert_eq!(hit.meta().correlation_id.as_deref(), Some("@scope/pkg@1.0.0"));
        assert_eq!(AppEvent::General(GeneralEvent::debug("x")).meta().correlation_id, None);
    }
}
