#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! BLAKE3 content hashing for e14z
//!
//! Hashes single files, arbitrary byte strings and whole package trees for
//! cache integrity verification.

mod tree;

pub use tree::{hash_tree, TreeDigest};

use blake3::Hasher;
use e14z_errors::{Error, StorageError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Size of chunks for streaming hash computation
const CHUNK_SIZE: usize = 64 * 1024; // 64KB

/// A BLAKE3 hash value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hash {
    bytes: [u8; 32],
}

impl Hash {
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// First `len` hex characters, for directory names and log lines
    #[must_use]
    pub fn short_hex(&self, len: usize) -> String {
        let mut hex = self.to_hex();
        hex.truncate(len);
        hex
    }

    /// Parse from hex string
    ///
    /// # Errors
    /// Returns an error if the input string is not valid hexadecimal or is not exactly 64 characters (32 bytes).
    pub fn from_hex(s: &str) -> Result<Self, Error> {
        let bytes = hex::decode(s).map_err(|e| StorageError::CorruptedData {
            message: format!("invalid hex: {e}"),
        })?;

        let array: [u8; 32] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            StorageError::CorruptedData {
                message: format!("hash must be 32 bytes, got {}", bytes.len()),
            }
        })?;
        Ok(Self::from_bytes(array))
    }

    /// Compute hash of a byte slice
    #[must_use]
    pub fn from_data(data: &[u8]) -> Self {
        Self::from_bytes(*blake3::hash(data).as_bytes())
    }

    /// Hash a sequence of fields with length prefixes so that
    /// `("ab", "c")` and `("a", "bc")` differ
    #[must_use]
    pub fn from_parts(parts: &[&[u8]]) -> Self {
        let mut hasher = Hasher::new();
        for part in parts {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        Self::from_bytes(*hasher.finalize().as_bytes())
    }

    /// Compute hash of a file
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, read, or if any I/O operation fails.
    pub async fn hash_file(path: &Path) -> Result<Self, Error> {
        let mut file = File::open(path)
            .await
            .map_err(|_| StorageError::PathNotFound {
                path: path.display().to_string(),
            })?;

        let mut hasher = Hasher::new();
        update_from_reader(&mut hasher, &mut file).await?;
        Ok(Self::from_bytes(*hasher.finalize().as_bytes()))
    }
}

async fn update_from_reader(hasher: &mut Hasher, file: &mut File) -> Result<u64, Error> {
    let mut buffer = vec![0; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        total += n as u64;
    }
    Ok(total)
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Verify a file matches an expected hash
///
/// # Errors
/// Returns an error if the file cannot be read or hashed.
pub async fn verify_file(path: &Path, expected: &Hash) -> Result<bool, Error> {
    let actual = Hash::hash_file(path).await?;
    Ok(actual == *expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_hash_basics() {
        let hash = Hash::from_data(b"hello world");

        // Known BLAKE3 hash of "hello world"
        let expected = "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24";
        assert_eq!(hash.to_hex(), expected);
        assert_eq!(hash.short_hex(8), "d74981ef");
    }

    #[test]
    fn test_hash_serialization() {
        let hash = Hash::from_data(b"test");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash.to_hex()));
        let deserialized: Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(hash, deserialized);
    }

    #[test]
    fn test_parts_are_length_prefixed() {
        let a = Hash::from_parts(&[b"ab", b"c"]);
        let b = Hash::from_parts(&[b"a", b"bc"]);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_hash_file() {
        use std::io::Write;
        let mut temp = NamedTempFile::new().unwrap();
        let data = b"test file content";
        temp.write_all(data).unwrap();

        let hash = Hash::hash_file(temp.path()).await.unwrap();
        assert_eq!(hash, Hash::from_data(data));
    }
}
