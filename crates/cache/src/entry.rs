//! Persisted cache records and reports

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use e14z_types::PackageMetadata;
use serde::{Deserialize, Serialize};

/// Where a `(name, version)` lives on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLocation {
    pub package_dir: PathBuf,
    pub metadata_file: PathBuf,
}

/// Metadata stored beside each cached package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub name: String,
    pub version: String,
    pub installed_at: DateTime<Utc>,
    /// BLAKE3 tree digest of the package directory, hex encoded
    pub content_hash: String,
    pub last_accessed: DateTime<Utc>,
    /// Bytes of regular files covered by `content_hash`
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_meta: Option<PackageMetadata>,
}

/// Extra facts recorded when a package is added
#[derive(Debug, Clone, Default)]
pub struct InstallRecord {
    pub install_command: Option<String>,
    pub package_meta: Option<PackageMetadata>,
}

impl InstallRecord {
    #[must_use]
    pub fn new(install_command: impl Into<String>) -> Self {
        Self {
            install_command: Some(install_command.into()),
            package_meta: None,
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, meta: Option<PackageMetadata>) -> Self {
        self.package_meta = meta;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub package_count: usize,
    pub total_size: u64,
}

/// Limits applied by a cleanup pass; `None` disables that rule
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupOptions {
    pub max_age: Option<chrono::Duration>,
    pub max_size: Option<u64>,
    /// Also evict entries whose content no longer matches their hash
    pub remove_corrupted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    /// `name@version` of every evicted entry
    pub cleaned: Vec<String>,
    pub freed_bytes: u64,
    /// Entries left alone because they were leased or locked
    pub skipped: Vec<String>,
}
