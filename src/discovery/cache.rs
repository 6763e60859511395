//! discovery::cache
//!
//! Memoized scanning.
//!
//! The cache key is the sorted, de-duplicated directory set, so
//! `[b, a, a]` and `[a, b]` share one entry; the first scan of a key decides
//! its order. Errors are not cached.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use super::{Discovery, DiscoveryError};
use crate::core::descriptor::Descriptor;

type Scanned = Vec<Arc<dyn Descriptor>>;

/// Wraps a source so each directory set is scanned at most once.
pub struct CachedDiscovery<D> {
    inner: D,
    entries: Mutex<HashMap<Vec<PathBuf>, Scanned>>,
}

impl<D: Discovery> CachedDiscovery<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cache key for `directories`.
    pub fn key(directories: &[PathBuf]) -> Vec<PathBuf> {
        let mut key = directories.to_vec();
        key.sort();
        key.dedup();
        key
    }

    /// Drop every cached scan.
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }
}

impl<D: Discovery> Discovery for CachedDiscovery<D> {
    fn scan(&self, directories: &[PathBuf]) -> Result<Scanned, DiscoveryError> {
        let key = Self::key(directories);
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(hit) = entries.get(&key) {
            tracing::debug!(directories = key.len(), "discovery cache hit");
            return Ok(hit.clone());
        }

        let scanned = self.inner.scan(directories)?;
        entries.insert(key, scanned.clone());
        Ok(scanned)
    }
}
