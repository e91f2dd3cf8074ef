//! Per-key locks and in-use leases

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Exclusive access to one cache key
///
/// Obtained from [`CacheManager::lock`](crate::CacheManager::lock); the
/// `*_locked` operations take it as proof the caller already holds the key.
#[derive(Debug)]
pub struct KeyGuard {
    pub(crate) name: String,
    pub(crate) version: String,
    _guard: OwnedMutexGuard<()>,
}

impl KeyGuard {
    pub(crate) fn new(name: &str, version: &str, guard: OwnedMutexGuard<()>) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            _guard: guard,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }
}

pub(crate) type LockTable = DashMap<String, Arc<Mutex<()>>>;

pub(crate) fn key_mutex(table: &LockTable, key: &str) -> Arc<Mutex<()>> {
    table
        .entry(key.to_string())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

/// Marks an entry as in use; cleanup skips leased entries
///
/// Released on drop.
#[derive(Debug)]
pub struct Lease {
    key: String,
    table: Arc<DashMap<String, usize>>,
}

impl Lease {
    pub(crate) fn acquire(table: &Arc<DashMap<String, usize>>, key: String) -> Self {
        *table.entry(key.clone()).or_insert(0) += 1;
        Self {
            key,
            table: Arc::clone(table),
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        let released = self.table.get_mut(&self.key).is_some_and(|mut count| {
            *count = count.saturating_sub(1);
            *count == 0
        });
        if released {
            self.table.remove_if(&self.key, |_, count| *count == 0);
        }
    }
}

pub(crate) fn is_leased(table: &DashMap<String, usize>, key: &str) -> bool {
    table.get(key).is_some_and(|count| *count > 0)
}
