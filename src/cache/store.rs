//! MRU-ordered row store
//!
//! Thin statistics-keeping wrappers over an LRU map from row index to a
//! shared float row. A lookup promotes the row to most-recently-used; an
//! insert at capacity evicts the least-recently-used row.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Row store statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStatistics {
    /// Lookups that found the row resident
    pub hits: u64,
    /// Total lookups
    pub total: u64,
    /// Rows currently resident
    pub items: usize,
}

impl CacheStatistics {
    /// Hit rate in [0, 1]; 0 when no lookups have happened
    pub fn hit_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.hits as f64 / self.total as f64
        }
    }
}

/// Single-threaded row store
pub struct RowStore {
    rows: LruCache<usize, Arc<[f32]>>,
    hits: u64,
    total: u64,
}

impl RowStore {
    /// Create a store holding at most `capacity` rows (clamped to ≥ 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            rows: LruCache::new(capacity),
            hits: 0,
            total: 0,
        }
    }

    /// Look up a row, promoting it to most-recently-used
    pub fn get(&mut self, index: usize) -> Option<Arc<[f32]>> {
        self.total += 1;
        let row = self.rows.get(&index).cloned();
        if row.is_some() {
            self.hits += 1;
        }
        row
    }

    /// Insert a row, evicting the least-recently-used row when at capacity
    pub fn insert(&mut self, index: usize, row: Arc<[f32]>) {
        self.rows.put(index, row);
    }

    /// Number of resident rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Maximum number of resident rows
    pub fn capacity(&self) -> usize {
        self.rows.cap().get()
    }

    /// Drop all rows and reset statistics
    pub fn clear(&mut self) {
        self.rows.clear();
        self.hits = 0;
        self.total = 0;
    }

    /// Current statistics
    pub fn statistics(&self) -> CacheStatistics {
        CacheStatistics {
            hits: self.hits,
            total: self.total,
            items: self.rows.len(),
        }
    }

    /// Zero the hit counters, keeping resident rows
    pub fn reset_statistics(&mut self) {
        self.hits = 0;
        self.total = 0;
    }
}

/// Mutex-guarded row store for concurrent access
///
/// Mutation of the recency order and the map is serialised; the returned
/// rows are shared, so readers never hold the lock while using a row.
pub struct SharedRowStore {
    inner: Mutex<RowStore>,
}

impl SharedRowStore {
    /// Create a store holding at most `capacity` rows (clamped to ≥ 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(RowStore::new(capacity)),
        }
    }

    /// Look up a row, promoting it to most-recently-used
    pub fn get(&self, index: usize) -> Option<Arc<[f32]>> {
        self.inner.lock().unwrap().get(index)
    }

    /// Insert a row, evicting the least-recently-used row when at capacity
    pub fn insert(&self, index: usize, row: Arc<[f32]>) {
        self.inner.lock().unwrap().insert(index, row);
    }

    /// Maximum number of resident rows
    pub fn capacity(&self) -> usize {
        self.inner.lock().unwrap().capacity()
    }

    /// Drop all rows and reset statistics
    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }

    /// Current statistics
    pub fn statistics(&self) -> CacheStatistics {
        self.inner.lock().unwrap().statistics()
    }

    /// Zero the hit counters, keeping resident rows
    pub fn reset_statistics(&self) {
        self.inner.lock().unwrap().reset_statistics();
    }
}
