#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Integrity-checked package cache
//!
//! Each `(name, version)` owns one directory under the cache root holding
//! the installed files plus a `.e14z-entry.json` record with the BLAKE3
//! digest of the tree. A lookup only counts as a hit when the digest still
//! matches, so tampered or half-written packages are reinstalled.

mod entry;
mod key;
mod lease;

pub use entry::{
    CacheEntry, CacheLocation, CacheStats, CleanupOptions, CleanupReport, InstallRecord,
};
pub use lease::{KeyGuard, Lease};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use e14z_config::constants::ENTRY_FILE;
use e14z_config::{CacheConfig, Config};
use e14z_errors::{Error, StorageError};
use e14z_events::{AppEvent, CacheEvent, EventEmitter, EventSender, EvictionReason};
use e14z_hash::hash_tree;
use lease::{is_leased, key_mutex, LockTable};
use tokio::fs;

/// Manages the on-disk package cache
///
/// Cheap to clone; clones share locks and leases.
#[derive(Debug, Clone)]
pub struct CacheManager {
    root: PathBuf,
    max_age: chrono::Duration,
    max_size: u64,
    locks: Arc<LockTable>,
    leases: Arc<DashMap<String, usize>>,
    tx: Option<EventSender>,
}

impl CacheManager {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, config: &CacheConfig) -> Self {
        Self {
            root: root.into(),
            max_age: chrono::Duration::from_std(config.max_age())
                .unwrap_or(chrono::Duration::MAX),
            max_size: config.max_size_bytes,
            locks: Arc::new(DashMap::new()),
            leases: Arc::new(DashMap::new()),
            tx: None,
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.cache.root_dir(), &config.cache)
    }

    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the cache root if needed
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn init(&self) -> Result<(), Error> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| storage(&e, &self.root))
    }

    /// Deterministic location for a key; nothing is created
    #[must_use]
    pub fn location(&self, name: &str, version: &str) -> CacheLocation {
        let package_dir = self.root.join(key::dir_name(name, version));
        CacheLocation {
            metadata_file: package_dir.join(ENTRY_FILE),
            package_dir,
        }
    }

    /// Wait for exclusive access to a key
    pub async fn lock(&self, name: &str, version: &str) -> KeyGuard {
        let mutex = key_mutex(&self.locks, &key::lock_key(name, version));
        KeyGuard::new(name, version, mutex.lock_owned().await)
    }

    /// Exclusive access to a key if nobody else holds it
    #[must_use]
    pub fn try_lock(&self, name: &str, version: &str) -> Option<KeyGuard> {
        let mutex = key_mutex(&self.locks, &key::lock_key(name, version));
        mutex
            .try_lock_owned()
            .ok()
            .map(|guard| KeyGuard::new(name, version, guard))
    }

    /// Protect an entry from cleanup while it is in use
    #[must_use]
    pub fn lease(&self, name: &str, version: &str) -> Lease {
        Lease::acquire(&self.leases, key::lock_key(name, version))
    }

    /// Whether a verified copy of the package is present
    ///
    /// # Errors
    ///
    /// Returns an error only for I/O failures other than missing files.
    pub async fn is_cached(&self, name: &str, version: &str) -> Result<bool, Error> {
        let guard = self.lock(name, version).await;
        self.is_cached_locked(&guard).await
    }

    /// [`is_cached`](Self::is_cached) for a caller already holding the key
    ///
    /// # Errors
    ///
    /// See [`is_cached`](Self::is_cached).
    pub async fn is_cached_locked(&self, guard: &KeyGuard) -> Result<bool, Error> {
        let (name, version) = (guard.name(), guard.version());
        let location = self.location(name, version);
        if !self.verify_integrity(&location).await? {
            tracing::debug!(name, version, "cache miss");
            self.emit(AppEvent::Cache(CacheEvent::Miss {
                name: name.to_string(),
                version: version.to_string(),
            }));
            return Ok(false);
        }

        if let Some(mut entry) = read_entry(&location).await? {
            entry.last_accessed = Utc::now();
            self.write_entry(&location, &entry).await?;
        }
        tracing::debug!(name, version, "cache hit");
        self.emit(AppEvent::Cache(CacheEvent::Hit {
            name: name.to_string(),
            version: version.to_string(),
        }));
        Ok(true)
    }

    /// Recompute the tree digest and compare it with the stored one
    ///
    /// A missing directory or record is reported as `false`, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read.
    pub async fn verify_integrity(&self, location: &CacheLocation) -> Result<bool, Error> {
        let Some(entry) = read_entry(location).await? else {
            return Ok(false);
        };
        let digest = match hash_tree(&location.package_dir, &[ENTRY_FILE]).await {
            Ok(digest) => digest,
            Err(
                Error::Storage(StorageError::PathNotFound { .. })
                | Error::Io {
                    kind: std::io::ErrorKind::NotFound,
                    ..
                },
            ) => return Ok(false),
            Err(e) => return Err(e),
        };
        let actual = digest.hash.to_hex();
        if actual == entry.content_hash {
            return Ok(true);
        }
        tracing::warn!(
            name = %entry.name,
            version = %entry.version,
            expected = %entry.content_hash,
            %actual,
            "cache integrity check failed"
        );
        self.emit(AppEvent::Cache(CacheEvent::IntegrityFailed {
            name: entry.name,
            version: entry.version,
            expected: entry.content_hash,
            actual,
        }));
        Ok(false)
    }

    /// Record an installed package directory as a cache entry
    ///
    /// The package files must already be in
    /// [`location`](Self::location)`.package_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is missing or cannot be hashed,
    /// or the record cannot be written.
    pub async fn add_to_cache(
        &self,
        name: &str,
        version: &str,
        record: InstallRecord,
    ) -> Result<CacheEntry, Error> {
        let guard = self.lock(name, version).await;
        self.add_locked(&guard, record).await
    }

    /// [`add_to_cache`](Self::add_to_cache) for a caller already holding the key
    ///
    /// # Errors
    ///
    /// See [`add_to_cache`](Self::add_to_cache).
    pub async fn add_locked(
        &self,
        guard: &KeyGuard,
        record: InstallRecord,
    ) -> Result<CacheEntry, Error> {
        let (name, version) = (guard.name(), guard.version());
        let location = self.location(name, version);
        if !fs::try_exists(&location.package_dir).await.unwrap_or(false) {
            return Err(StorageError::PathNotFound {
                path: location.package_dir.display().to_string(),
            }
            .into());
        }

        let digest = hash_tree(&location.package_dir, &[ENTRY_FILE]).await?;
        let now = Utc::now();
        let entry = CacheEntry {
            name: name.to_string(),
            version: version.to_string(),
            installed_at: now,
            content_hash: digest.hash.to_hex(),
            last_accessed: now,
            size: digest.size,
            install_command: record.install_command,
            package_meta: record.package_meta,
        };
        self.write_entry(&location, &entry).await?;

        tracing::info!(name, version, size = entry.size, files = digest.files, "package cached");
        self.emit(AppEvent::Cache(CacheEvent::Added {
            name: name.to_string(),
            version: version.to_string(),
            size: entry.size,
            content_hash: entry.content_hash.clone(),
        }));
        Ok(entry)
    }

    /// Stored record for a key, without verifying content
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::CorruptedData`] if the record is unreadable.
    pub async fn entry(&self, name: &str, version: &str) -> Result<Option<CacheEntry>, Error> {
        read_entry(&self.location(name, version)).await
    }

    /// Delete an entry; `false` if it was not present
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be removed.
    pub async fn remove(&self, name: &str, version: &str) -> Result<bool, Error> {
        let guard = self.lock(name, version).await;
        self.remove_locked(&guard).await
    }

    /// [`remove`](Self::remove) for a caller already holding the key
    ///
    /// # Errors
    ///
    /// See [`remove`](Self::remove).
    pub async fn remove_locked(&self, guard: &KeyGuard) -> Result<bool, Error> {
        let location = self.location(guard.name(), guard.version());
        remove_dir(&location.package_dir).await
    }

    /// Every entry with a readable record, oldest install first
    ///
    /// # Errors
    ///
    /// Returns an error if the cache root cannot be listed.
    pub async fn list_entries(&self) -> Result<Vec<(CacheLocation, CacheEntry)>, Error> {
        let mut found = Vec::new();
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(found),
            Err(e) => return Err(storage(&e, &self.root)),
        };
        while let Some(item) = dir.next_entry().await.map_err(|e| storage(&e, &self.root))? {
            let file_name = item.file_name();
            if file_name.to_string_lossy().starts_with('.') {
                continue;
            }
            let package_dir = item.path();
            let location = CacheLocation {
                metadata_file: package_dir.join(ENTRY_FILE),
                package_dir,
            };
            match read_entry(&location).await {
                Ok(Some(entry)) => found.push((location, entry)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %location.package_dir.display(), error = %e, "unreadable cache record");
                }
            }
        }
        found.sort_by_key(|(_, entry)| entry.installed_at);
        Ok(found)
    }

    /// Number of entries and bytes they cover
    ///
    /// # Errors
    ///
    /// Returns an error if the cache root cannot be listed.
    pub async fn cache_stats(&self) -> Result<CacheStats, Error> {
        let entries = self.list_entries().await?;
        Ok(CacheStats {
            package_count: entries.len(),
            total_size: entries.iter().map(|(_, entry)| entry.size).sum(),
        })
    }

    /// Options built from the configured age and size limits
    #[must_use]
    pub fn default_cleanup(&self) -> CleanupOptions {
        CleanupOptions {
            max_age: Some(self.max_age),
            max_size: Some(self.max_size),
            remove_corrupted: false,
        }
    }

    /// Evict expired entries, then the oldest until under the size limit
    ///
    /// Leased or currently locked entries are skipped and reported.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache root cannot be listed.
    pub async fn cleanup(&self, options: CleanupOptions) -> Result<CleanupReport, Error> {
        let now = Utc::now();
        let mut report = CleanupReport::default();
        let mut remaining = Vec::new();

        for (location, entry) in self.list_entries().await? {
            let reason = if options.max_age.is_some_and(|age| now - entry.installed_at > age) {
                Some(EvictionReason::Expired)
            } else if options.remove_corrupted && !self.verify_integrity(&location).await? {
                Some(EvictionReason::Corrupted)
            } else {
                None
            };
            match reason {
                Some(reason) => {
                    if !self.evict(&location, &entry, reason, &mut report).await? {
                        remaining.push((location, entry));
                    }
                }
                None => remaining.push((location, entry)),
            }
        }

        if let Some(max_size) = options.max_size {
            let mut total: u64 = remaining.iter().map(|(_, entry)| entry.size).sum();
            for (location, entry) in &remaining {
                if total <= max_size {
                    break;
                }
                if self
                    .evict(location, entry, EvictionReason::SizeLimit, &mut report)
                    .await?
                {
                    total = total.saturating_sub(entry.size);
                }
            }
        }

        tracing::info!(
            cleaned = report.cleaned.len(),
            freed_bytes = report.freed_bytes,
            skipped = report.skipped.len(),
            "cache cleanup finished"
        );
        self.emit(AppEvent::Cache(CacheEvent::CleanupCompleted {
            cleaned: report.cleaned.len(),
            freed_bytes: report.freed_bytes,
        }));
        Ok(report)
    }

    /// Returns whether the entry was removed
    async fn evict(
        &self,
        location: &CacheLocation,
        entry: &CacheEntry,
        reason: EvictionReason,
        report: &mut CleanupReport,
    ) -> Result<bool, Error> {
        let key = key::lock_key(&entry.name, &entry.version);
        if is_leased(&self.leases, &key) {
            report.skipped.push(key);
            return Ok(false);
        }
        let Some(_guard) = self.try_lock(&entry.name, &entry.version) else {
            report.skipped.push(key);
            return Ok(false);
        };
        remove_dir(&location.package_dir).await?;

        tracing::debug!(%key, ?reason, "evicted cache entry");
        self.emit(AppEvent::Cache(CacheEvent::Evicted {
            name: entry.name.clone(),
            version: entry.version.clone(),
            reason,
            size: entry.size,
        }));
        report.freed_bytes += entry.size;
        report.cleaned.push(key);
        Ok(true)
    }

    /// Write the record via a temp file in the cache root and rename
    async fn write_entry(&self, location: &CacheLocation, entry: &CacheEntry) -> Result<(), Error> {
        let json = serde_json::to_vec_pretty(entry)?;
        let tmp = self
            .root
            .join(format!(".entry-{}.tmp", uuid::Uuid::new_v4()));
        fs::write(&tmp, json).await.map_err(|e| storage(&e, &tmp))?;
        if let Err(e) = fs::rename(&tmp, &location.metadata_file).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(storage(&e, &location.metadata_file));
        }
        Ok(())
    }
}

impl EventEmitter for CacheManager {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

async fn read_entry(location: &CacheLocation) -> Result<Option<CacheEntry>, Error> {
    let bytes = match fs::read(&location.metadata_file).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(storage(&e, &location.metadata_file)),
    };
    serde_json::from_slice(&bytes).map(Some).map_err(|e| {
        StorageError::CorruptedData {
            message: format!("{}: {e}", location.metadata_file.display()),
        }
        .into()
    })
}

async fn remove_dir(path: &Path) -> Result<bool, Error> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(storage(&e, path)),
    }
}

fn storage(err: &std::io::Error, path: &Path) -> Error {
    StorageError::from_io_with_path(err, path).into()
}
