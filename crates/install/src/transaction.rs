//! Recording and undoing filesystem changes made by an install attempt
//!
//! Every recorded operation is also appended to a JSON journal under the
//! cache's journal directory before the change is made, so an attempt
//! interrupted by a crash can be undone by [`recover_journals`] on the
//! next start. Each journal names the process that owns it; journals of
//! other processes that are still running are left alone.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use e14z_errors::{Error, StorageError};
use serde::{Deserialize, Serialize};
use tokio::fs;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    FileCreated,
    DirectoryCreated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OperationKind,
    pub path: PathBuf,
}

/// What a rollback managed to undo
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackReport {
    /// Paths deleted, or already gone
    pub removed: Vec<PathBuf>,
    /// Paths that could not be deleted, with the reason
    pub failed: Vec<(PathBuf, String)>,
}

impl RollbackReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Journal {
    id: Uuid,
    package_name: String,
    version: String,
    started_at: DateTime<Utc>,
    /// Process that wrote the journal; 0 when unknown
    #[serde(default)]
    owner_pid: u32,
    operations: Vec<Operation>,
}

impl Journal {
    /// Another process that is still running owns this journal
    fn is_live_elsewhere(&self) -> bool {
        self.owner_pid != 0 && self.owner_pid != std::process::id() && process_alive(self.owner_pid)
    }
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    // signal 0 only checks existence; EPERM still means the process exists
    !matches!(kill(Pid::from_raw(raw), None), Err(Errno::ESRCH))
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    false
}

/// One install attempt's record of created paths
///
/// Dropping an uncommitted transaction deletes nothing; call
/// [`rollback`](Self::rollback) explicitly.
#[derive(Debug)]
pub struct InstallationTransaction {
    journal: Journal,
    journal_path: Option<PathBuf>,
}

impl InstallationTransaction {
    /// In-memory transaction without a journal
    #[must_use]
    pub fn new(package_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            journal: Journal {
                id: Uuid::new_v4(),
                package_name: package_name.into(),
                version: version.into(),
                started_at: Utc::now(),
                owner_pid: std::process::id(),
                operations: Vec::new(),
            },
            journal_path: None,
        }
    }

    /// Transaction journaled to `<journal_dir>/<id>.json`
    ///
    /// # Errors
    ///
    /// Returns an error if the journal cannot be written.
    pub async fn begin(
        journal_dir: &Path,
        package_name: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<Self, Error> {
        let mut tx = Self::new(package_name, version);
        fs::create_dir_all(journal_dir)
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, journal_dir))?;
        tx.journal_path = Some(journal_dir.join(format!("{}.json", tx.journal.id)));
        tx.persist().await?;
        Ok(tx)
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.journal.id
    }

    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.journal.operations
    }

    /// Record a path about to be created
    ///
    /// Call before creating it, so a crash in between still leaves a
    /// journal entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal cannot be updated.
    pub async fn record(&mut self, kind: OperationKind, path: impl Into<PathBuf>) -> Result<(), Error> {
        self.journal.operations.push(Operation {
            kind,
            path: path.into(),
        });
        self.persist().await
    }

    /// Undo recorded operations, newest first, files before directories
    ///
    /// Never stops early; each failure is recorded in the report. The
    /// journal is removed only when everything was undone.
    pub async fn rollback(self) -> RollbackReport {
        let report = undo(&self.journal.operations).await;
        tracing::info!(
            package = %self.journal.package_name,
            version = %self.journal.version,
            removed = report.removed.len(),
            failed = report.failed.len(),
            "rolled back install attempt"
        );
        if report.is_clean() {
            self.discard_journal().await;
        }
        report
    }

    /// Keep everything and drop the journal
    ///
    /// # Errors
    ///
    /// Returns an error if the journal exists but cannot be deleted.
    pub async fn commit(self) -> Result<(), Error> {
        if let Some(path) = &self.journal_path {
            match fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StorageError::from_io_with_path(&e, path).into()),
            }
        }
        tracing::debug!(transaction = %self.journal.id, "transaction committed");
        Ok(())
    }

    async fn persist(&self) -> Result<(), Error> {
        let Some(path) = &self.journal_path else {
            return Ok(());
        };
        let json = serde_json::to_vec(&self.journal)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, &tmp))?;
        fs::rename(&tmp, path)
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, path))?;
        Ok(())
    }

    async fn discard_journal(&self) {
        if let Some(path) = &self.journal_path {
            let _ = fs::remove_file(path).await;
        }
    }
}

async fn undo(operations: &[Operation]) -> RollbackReport {
    let mut report = RollbackReport::default();
    let files = operations
        .iter()
        .rev()
        .filter(|op| op.kind == OperationKind::FileCreated);
    let dirs = operations
        .iter()
        .rev()
        .filter(|op| op.kind == OperationKind::DirectoryCreated);

    for op in files.chain(dirs) {
        let result = match op.kind {
            OperationKind::FileCreated => fs::remove_file(&op.path).await,
            OperationKind::DirectoryCreated => fs::remove_dir_all(&op.path).await,
        };
        match result {
            Ok(()) => report.removed.push(op.path.clone()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                report.removed.push(op.path.clone());
            }
            Err(e) => {
                tracing::warn!(path = %op.path.display(), error = %e, "rollback step failed");
                report.failed.push((op.path.clone(), e.to_string()));
            }
        }
    }
    report
}

/// Roll back every journal left behind in `journal_dir`
///
/// Journals owned by another running process are skipped, along with their
/// temp files. Journals that cannot be parsed are removed. Returns one
/// report per recovered transaction.
///
/// # Errors
///
/// Returns an error if the directory exists but cannot be listed.
pub async fn recover_journals(journal_dir: &Path) -> Result<Vec<(Uuid, RollbackReport)>, Error> {
    let mut recovered = Vec::new();
    let mut dir = match fs::read_dir(journal_dir).await {
        Ok(dir) => dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(recovered),
        Err(e) => return Err(StorageError::from_io_with_path(&e, journal_dir).into()),
    };

    while let Some(item) = dir
        .next_entry()
        .await
        .map_err(|e| StorageError::from_io_with_path(&e, journal_dir))?
    {
        let path = item.path();
        let is_journal = path.extension().is_some_and(|ext| ext == "json");
        let parsed = fs::read(&path)
            .await
            .ok()
            .and_then(|bytes| serde_json::from_slice::<Journal>(&bytes).ok());
        if parsed.as_ref().is_some_and(Journal::is_live_elsewhere) {
            tracing::debug!(path = %path.display(), "journal owned by a running process");
            continue;
        }
        if !is_journal {
            // leftover temp file from an interrupted journal write
            let _ = fs::remove_file(&path).await;
            continue;
        }
        let Some(journal) = parsed else {
            tracing::warn!(path = %path.display(), "discarding unreadable journal");
            let _ = fs::remove_file(&path).await;
            continue;
        };

        let tx = InstallationTransaction {
            journal,
            journal_path: Some(path),
        };
        let id = tx.id();
        tracing::info!(transaction = %id, package = %tx.journal.package_name, "recovering interrupted install");
        recovered.push((id, tx.rollback().await));
    }
    Ok(recovered)
}
