//! Failure classification
//!
//! Maps any [`Error`] (or raw failure text such as captured stderr) onto the
//! fixed taxonomy surfaced to callers. Typed variants are classified first;
//! everything else falls through an ordered list of message patterns, so the
//! result is deterministic for a given input. [`ClassifiedError`] has no
//! public constructor: classification is the only way to obtain one.

use std::fmt;
use std::io::ErrorKind;

use serde::{Deserialize, Serialize};

use crate::{Error, ExecError, InstallError, RegistryError, StorageError};

/// Failure categories reported to callers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Network,
    Permission,
    Security,
    Timeout,
    DiskSpace,
    Validation,
    Parsing,
    Database,
}

impl ErrorCategory {
    /// Stable identifier used in outcome reports
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Permission => "permission",
            Self::Security => "security",
            Self::Timeout => "timeout",
            Self::DiskSpace => "disk_space",
            Self::Validation => "validation",
            Self::Parsing => "parsing",
            Self::Database => "database",
        }
    }

    /// Whether failures in this category are worth retrying
    #[must_use]
    pub fn is_recoverable(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Permission | Self::Timeout | Self::DiskSpace
        )
    }

    fn suggestions(self) -> &'static [&'static str] {
        match self {
            Self::Network => &[
                "Check network connectivity",
                "Verify the package registry is reachable and retry",
            ],
            Self::Permission => &[
                "Check that the cache directory is writable by the current user",
                "Do not run the installer from a read-only location",
            ],
            Self::Security => &[
                "Do not install this package; it was flagged by security checks",
                "Report the package to the registry maintainers if this is a false positive",
            ],
            Self::Timeout => &[
                "Increase the timeout and retry",
                "Check whether the package waits for interactive input",
            ],
            Self::DiskSpace => &[
                "Free disk space",
                "Run `e14z cache clean` to evict old packages",
            ],
            Self::Validation => &["Check the install command and package metadata"],
            Self::Parsing => &[
                "Use a supported install command (npx, pip install, git clone, docker run)",
            ],
            Self::Database => &[
                "Retry later; if the problem persists, report the package slug",
            ],
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure mapped onto the taxonomy, with remediation hints
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClassifiedError {
    category: ErrorCategory,
    recoverable: bool,
    suggestions: Vec<String>,
    message: String,
}

impl ClassifiedError {
    fn new(category: ErrorCategory, message: String) -> Self {
        Self {
            category,
            recoverable: category.is_recoverable(),
            suggestions: category
                .suggestions()
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            message,
        }
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    #[must_use]
    pub fn recoverable(&self) -> bool {
        self.recoverable
    }

    #[must_use]
    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)
    }
}

/// Classify a typed error
#[must_use]
pub fn categorize_error(err: &Error) -> ClassifiedError {
    let message = err.to_string();
    if matches!(err, Error::Cancelled) {
        let mut classified = ClassifiedError::new(ErrorCategory::Timeout, message);
        classified.recoverable = false;
        classified.suggestions = vec!["The operation was cancelled by the caller".to_string()];
        return classified;
    }
    match typed_category(err) {
        Some(category) => ClassifiedError::new(category, message),
        None => categorize_message(&message),
    }
}

/// Classify raw failure text (error messages, captured stderr)
#[must_use]
pub fn categorize_message(message: &str) -> ClassifiedError {
    ClassifiedError::new(category_from_message(message), message.to_string())
}

fn typed_category(err: &Error) -> Option<ErrorCategory> {
    match err {
        Error::Parse(_) => Some(ErrorCategory::Parsing),
        Error::Security(_) => Some(ErrorCategory::Security),
        Error::Config(_) => Some(ErrorCategory::Validation),
        Error::Storage(storage) => match storage {
            StorageError::DiskFull { .. } => Some(ErrorCategory::DiskSpace),
            StorageError::PermissionDenied { .. } => Some(ErrorCategory::Permission),
            StorageError::IntegrityMismatch { .. } | StorageError::CorruptedData { .. } => {
                Some(ErrorCategory::Validation)
            }
            _ => None,
        },
        Error::Exec(exec) => match exec {
            ExecError::Timeout { .. } => Some(ErrorCategory::Timeout),
            ExecError::ProtocolFailed { .. } => Some(ErrorCategory::Validation),
            _ => None,
        },
        Error::Registry(registry) => match registry {
            RegistryError::NotFound { .. } => Some(ErrorCategory::Database),
            RegistryError::Unavailable { .. } => Some(ErrorCategory::Network),
            RegistryError::Timeout { .. } => Some(ErrorCategory::Timeout),
            RegistryError::InvalidData { .. } | RegistryError::MethodNotFound { .. } => {
                Some(ErrorCategory::Validation)
            }
        },
        Error::Install(install) => match install {
            InstallError::AuthRequired { .. }
            | InstallError::MissingEntryPoint { .. }
            | InstallError::UnsupportedRegistry { .. } => Some(ErrorCategory::Validation),
            InstallError::OperationTimeout { .. } => Some(ErrorCategory::Timeout),
            _ => None,
        },
        Error::Io { kind, .. } => io_category(*kind),
        Error::Internal(_) | Error::Cancelled => None,
    }
}

fn io_category(kind: ErrorKind) -> Option<ErrorCategory> {
    match kind {
        ErrorKind::PermissionDenied => Some(ErrorCategory::Permission),
        ErrorKind::TimedOut => Some(ErrorCategory::Timeout),
        ErrorKind::StorageFull => Some(ErrorCategory::DiskSpace),
        ErrorKind::ConnectionRefused
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::NotConnected
        | ErrorKind::HostUnreachable
        | ErrorKind::NetworkUnreachable => Some(ErrorCategory::Network),
        _ => None,
    }
}

// Order matters: the first matching rule wins.
const MESSAGE_RULES: &[(ErrorCategory, &[&str])] = &[
    (
        ErrorCategory::Network,
        &["enotfound", "econnrefused", "econnreset", "eai_again", "getaddrinfo"],
    ),
    (ErrorCategory::Permission, &["eacces", "eperm", "permission denied"]),
    (ErrorCategory::DiskSpace, &["enospc", "no space left"]),
    (ErrorCategory::Timeout, &["timeout", "timed out", "etimedout"]),
    (
        ErrorCategory::Security,
        &["quarantine", "malicious", "security", "typosquat", "blocked"],
    ),
    (ErrorCategory::Validation, &["validation", "invalid"]),
    (ErrorCategory::Parsing, &["parse error", "failed to parse", "syntax error"]),
];

fn category_from_message(message: &str) -> ErrorCategory {
    let lowered = message.to_ascii_lowercase();
    MESSAGE_RULES
        .iter()
        .find(|(_, needles)| needles.iter().any(|needle| lowered.contains(needle)))
        .map_or(ErrorCategory::Database, |(category, _)| *category)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ParseError, SecurityError};

    #[test]
    fn test_network_codes_are_recoverable() {
        let classified = categorize_error(&Error::internal("ENOTFOUND registry.npmjs.org"));
        assert_eq!(classified.category(), ErrorCategory::Network);
        assert!(classified.recoverable());
        assert!(!classified.suggestions().is_empty());
    }

    #[test]
    fn test_quarantine_is_security_and_fatal() {
        let classified = categorize_error(&Error::internal("package quarantined"));
        assert_eq!(classified.category(), ErrorCategory::Security);
        assert!(!classified.recoverable());
    }

    #[test]
    fn test_rule_order_prefers_network_over_timeout() {
        let classified = categorize_message("ECONNRESET while waiting: timed out");
        assert_eq!(classified.category(), ErrorCategory::Network);
    }

    #[test]
    fn test_disk_space_suggestion() {
        let classified = categorize_message("ENOSPC: no space left on device");
        assert_eq!(classified.category(), ErrorCategory::DiskSpace);
        assert!(classified
            .suggestions()
            .iter()
            .any(|s| s.contains("Free disk space")));
    }

    #[test]
    fn test_unknown_defaults_to_database() {
        let classified = categorize_message("something odd happened");
        assert_eq!(classified.category(), ErrorCategory::Database);
        assert!(!classified.recoverable());
    }

    #[test]
    fn test_typed_variants_win_over_message() {
        // message mentions a network code but the variant is authoritative
        let err: Error = ParseError::UnknownGrammar {
            command: "curl ENOTFOUND".into(),
        }
        .into();
        assert_eq!(categorize_error(&err).category(), ErrorCategory::Parsing);

        let err: Error = SecurityError::CommandNotAllowed {
            command: "bash".into(),
        }
        .into();
        let classified = categorize_error(&err);
        assert_eq!(classified.category(), ErrorCategory::Security);
        assert!(!classified.recoverable());
    }

    #[test]
    fn test_io_kinds() {
        let err: Error =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope").into();
        assert_eq!(categorize_error(&err).category(), ErrorCategory::Permission);
    }

    #[test]
    fn test_cancelled_is_not_retried() {
        let classified = categorize_error(&Error::Cancelled);
        assert!(!classified.recoverable());
    }
}
