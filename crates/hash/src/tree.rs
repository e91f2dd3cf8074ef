//! Directory tree hashing
//!
//! The digest covers every entry's relative path, kind and contents, in
//! sorted path order, so it is independent of filesystem iteration order.
//! Symlinks are hashed by target and never followed.

use crate::{update_from_reader, Hash};
use blake3::Hasher;
use e14z_errors::{Error, StorageError};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};

/// Result of hashing a directory tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeDigest {
    pub hash: Hash,
    /// Sum of regular file sizes
    pub size: u64,
    pub files: usize,
}

/// Hash every entry under `root`, skipping top-level names in `exclude`
///
/// # Errors
///
/// Returns an error if `root` is missing or any entry cannot be read.
pub async fn hash_tree(root: &Path, exclude: &[&str]) -> Result<TreeDigest, Error> {
    let entries = collect_entries(root, exclude).await?;

    let mut hasher = Hasher::new();
    let mut size = 0u64;
    let mut files = 0usize;

    for (relative, path) in &entries {
        let metadata = fs::symlink_metadata(path)
            .await
            .map_err(|e| Error::io_with_path(&e, path))?;
        let name = relative.as_bytes();
        hasher.update(&(name.len() as u64).to_le_bytes());
        hasher.update(name);

        if metadata.is_symlink() {
            let target = fs::read_link(path)
                .await
                .map_err(|e| Error::io_with_path(&e, path))?;
            hasher.update(b"L");
            hasher.update(target.to_string_lossy().as_bytes());
        } else if metadata.is_dir() {
            hasher.update(b"D");
        } else {
            hasher.update(b"F");
            hasher.update(&metadata.len().to_le_bytes());
            let mut file = File::open(path)
                .await
                .map_err(|e| Error::io_with_path(&e, path))?;
            size += update_from_reader(&mut hasher, &mut file).await?;
            files += 1;
        }
    }

    Ok(TreeDigest {
        hash: Hash::from_bytes(*hasher.finalize().as_bytes()),
        size,
        files,
    })
}

/// Walk `root` without following symlinks; returns sorted `(relative, absolute)` pairs
async fn collect_entries(root: &Path, exclude: &[&str]) -> Result<Vec<(String, PathBuf)>, Error> {
    let metadata = fs::symlink_metadata(root)
        .await
        .map_err(|_| StorageError::PathNotFound {
            path: root.display().to_string(),
        })?;
    if !metadata.is_dir() {
        return Err(StorageError::InvalidPath {
            path: root.display().to_string(),
        }
        .into());
    }

    let mut entries = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut reader = fs::read_dir(&dir)
            .await
            .map_err(|e| Error::io_with_path(&e, &dir))?;
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| Error::io_with_path(&e, &dir))?
        {
            let path = entry.path();
            if dir == root {
                let name = entry.file_name();
                if exclude.iter().any(|skip| name.to_str() == Some(*skip)) {
                    continue;
                }
            }
            let relative = path
                .strip_prefix(root)
                .map_err(|_| StorageError::InvalidPath {
                    path: path.display().to_string(),
                })?
                .to_string_lossy()
                .replace('\\', "/");

            if entry.file_type().await?.is_dir() {
                pending.push(path.clone());
            }
            entries.push((relative, path));
        }
    }

    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_tree_hash_is_stable_and_sensitive() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("lib")).await.unwrap();
        fs::write(dir.path().join("index.js"), b"console.log(1)").await.unwrap();
        fs::write(dir.path().join("lib/util.js"), b"module.exports = {}").await.unwrap();

        let first = hash_tree(dir.path(), &[]).await.unwrap();
        let second = hash_tree(dir.path(), &[]).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.files, 2);
        assert_eq!(first.size, 14 + 19);

        fs::write(dir.path().join("lib/util.js"), b"module.exports = {x}").await.unwrap();
        let changed = hash_tree(dir.path(), &[]).await.unwrap();
        assert_ne!(first.hash, changed.hash);
    }

    #[tokio::test]
    async fn test_excluded_names_do_not_affect_digest() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("main.py"), b"print('hi')").await.unwrap();
        let before = hash_tree(dir.path(), &[".meta.json"]).await.unwrap();

        fs::write(dir.path().join(".meta.json"), b"{}").await.unwrap();
        let after = hash_tree(dir.path(), &[".meta.json"]).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_renames_change_digest() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"same").await.unwrap();
        let before = hash_tree(dir.path(), &[]).await.unwrap();

        fs::rename(dir.path().join("a.txt"), dir.path().join("b.txt"))
            .await
            .unwrap();
        let after = hash_tree(dir.path(), &[]).await.unwrap();
        assert_ne!(before.hash, after.hash);
    }

    #[tokio::test]
    async fn test_missing_root() {
        let dir = tempdir().unwrap();
        assert!(hash_tree(&dir.path().join("nope"), &[]).await.is_err());
    }
}
