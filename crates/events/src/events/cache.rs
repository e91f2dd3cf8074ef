use serde::{Deserialize, Serialize};

/// Why an entry was removed from the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionReason {
    Expired,
    SizeLimit,
    Corrupted,
    Manual,
}

/// Package cache events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CacheEvent {
    Hit { name: String, version: String },

    Miss { name: String, version: String },

    Added {
        name: String,
        version: String,
        size: u64,
        content_hash: String,
    },

    /// Recomputed content hash did not match the stored one
    IntegrityFailed {
        name: String,
        version: String,
        expected: String,
        actual: String,
    },

    Evicted {
        name: String,
        version: String,
        reason: EvictionReason,
        size: u64,
    },

    CleanupCompleted { cleaned: usize, freed_bytes: u64 },
}
