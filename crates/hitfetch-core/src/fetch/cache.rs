//! Per-request cache of compiled row store lookups.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Error;
use crate::rowstore::PreparedLookup;

/// Lookup cache statistics.
#[derive(Debug, Default)]
pub struct LookupStats {
    compilations: AtomicU64,
    hits: AtomicU64,
    recompilations: AtomicU64,
    rows_found: AtomicU64,
    rows_missing: AtomicU64,
}

impl LookupStats {
    /// Lookups compiled, including recompilations.
    pub fn compilations(&self) -> u64 {
        self.compilations.load(Ordering::Relaxed)
    }

    /// Lookups served from the cache.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Compilations caused by a changed column set.
    pub fn recompilations(&self) -> u64 {
        self.recompilations.load(Ordering::Relaxed)
    }

    pub fn rows_found(&self) -> u64 {
        self.rows_found.load(Ordering::Relaxed)
    }

    pub fn rows_missing(&self) -> u64 {
        self.rows_missing.load(Ordering::Relaxed)
    }

    pub(crate) fn record_row(&self, found: bool) {
        let counter = if found {
            &self.rows_found
        } else {
            &self.rows_missing
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Calculate hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.compilations() as f64;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }
}

/// Compiled lookups keyed by type key (`type` or `type_static`).
///
/// Scoped to one request. Compilation happens under the lock, so concurrent
/// first use of a type compiles once.
#[derive(Debug, Default)]
pub struct LookupCache {
    lookups: Mutex<HashMap<String, Arc<PreparedLookup>>>,
    include_node: AtomicBool,
    stats: LookupStats,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lookup for `type_key`, compiled by `prepare` on first use or when
    /// the required column set differs from the cached one.
    pub fn get_or_prepare<F>(
        &self,
        type_key: &str,
        columns: &BTreeSet<String>,
        prepare: F,
    ) -> Result<Arc<PreparedLookup>, Error>
    where
        F: FnOnce() -> Result<PreparedLookup, Error>,
    {
        let mut lookups = self.lookups.lock();
        if let Some(cached) = lookups.get(type_key) {
            if &cached.columns == columns {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Arc::clone(cached));
            }
            self.stats.recompilations.fetch_add(1, Ordering::Relaxed);
        }

        let lookup = Arc::new(prepare()?);
        self.stats.compilations.fetch_add(1, Ordering::Relaxed);
        lookups.insert(type_key.to_string(), Arc::clone(&lookup));
        Ok(lookup)
    }

    /// Number of cached lookups.
    pub fn len(&self) -> usize {
        self.lookups.lock().len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.lookups.lock().is_empty()
    }

    /// Mark the request as returning the origin node.
    pub fn set_include_node(&self, include: bool) {
        self.include_node.store(include, Ordering::Relaxed);
    }

    pub fn include_node(&self) -> bool {
        self.include_node.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> &LookupStats {
        &self.stats
    }
}
