//! Integration tests for error types

#[cfg(test)]
mod tests {
    use e14z_errors::*;
    use proptest::prelude::*;

    #[test]
    fn test_error_conversion() {
        let exec_err = ExecError::Timeout {
            command: "npx".into(),
            timeout_ms: 1000,
        };
        let err: Error = exec_err.into();
        assert!(matches!(err, Error::Exec(_)));
        assert_eq!(err.classify().category(), ErrorCategory::Timeout);
    }

    #[test]
    fn test_error_display() {
        let err = StorageError::DiskFull {
            path: "/var/cache/e14z".into(),
        };
        assert_eq!(err.to_string(), "disk full: /var/cache/e14z");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "test");
        let storage_err: StorageError = io_err.into();
        assert!(matches!(storage_err, StorageError::IoError { .. }));

        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "test");
        let with_path = StorageError::from_io_with_path(&io_err, std::path::Path::new("/tmp/x"));
        assert!(matches!(with_path, StorageError::PermissionDenied { .. }));
    }

    #[test]
    fn test_user_facing_hints() {
        let err: Error = SecurityError::Quarantined {
            package: "evil".into(),
            reason: "denylisted".into(),
        }
        .into();
        assert!(err.user_hint().is_some());
        assert_eq!(err.user_code(), Some("security.quarantined"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_registry_unavailable_is_network() {
        let err: Error = RegistryError::Unavailable {
            message: "connection reset".into(),
        }
        .into();
        let classified = err.classify();
        assert_eq!(classified.category(), ErrorCategory::Network);
        assert!(classified.recoverable());
    }

    #[test]
    fn test_category_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorCategory::DiskSpace).unwrap();
        assert_eq!(json, "\"disk_space\"");
    }

    proptest! {
        #[test]
        fn classification_is_deterministic(message in ".{0,80}") {
            let first = categorize_message(&message);
            let second = categorize_message(&message);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn every_failure_has_a_suggestion(message in ".{0,80}") {
            prop_assert!(!categorize_message(&message).suggestions().is_empty());
        }
    }
}
