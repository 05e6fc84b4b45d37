//! Cached access to the dual Hessian
//!
//! `HessianCache` is the single-threaded variant used by the
//! coordinate-descent trainers, which orchestrate parallelism externally
//! (the row creator may still parallelise inside one row computation).
//! `SharedHessianCache` serialises map access behind a mutex and serves the
//! chunking trainer, including the parallel prefetch of working-set rows.

use crate::cache::store::{CacheStatistics, RowStore, SharedRowStore};
use crate::cache::RowCreator;
use rayon::prelude::*;
use std::sync::{Arc, OnceLock};

/// Single-threaded Hessian row cache
pub struct HessianCache<C: RowCreator> {
    creator: C,
    store: RowStore,
    diagonal: Option<Arc<[f32]>>,
}

impl<C: RowCreator> HessianCache<C> {
    /// Create a cache over the row creator holding at most `capacity` rows
    pub fn new(creator: C, capacity: usize) -> Self {
        Self {
            creator,
            store: RowStore::new(capacity),
            diagonal: None,
        }
    }

    /// Number of training pairs (row length)
    pub fn len(&self) -> usize {
        self.creator.len()
    }

    /// Whether the training set is empty
    pub fn is_empty(&self) -> bool {
        self.creator.is_empty()
    }

    /// The Hessian diagonal, computed once and memoised
    pub fn diagonal(&mut self) -> Arc<[f32]> {
        let creator = &self.creator;
        Arc::clone(
            self.diagonal
                .get_or_insert_with(|| creator.compute_diagonal().into()),
        )
    }

    /// Row i of the Hessian, from cache or freshly computed
    pub fn row(&mut self, i: usize) -> Arc<[f32]> {
        if let Some(row) = self.store.get(i) {
            return row;
        }
        let row: Arc<[f32]> = self.creator.compute_row(i).into();
        self.store.insert(i, Arc::clone(&row));
        row
    }

    /// Cache statistics
    pub fn statistics(&self) -> CacheStatistics {
        self.store.statistics()
    }

    /// Zero the hit counters
    pub fn reset_statistics(&mut self) {
        self.store.reset_statistics();
    }
}

/// Thread-safe Hessian row cache
pub struct SharedHessianCache<C: RowCreator> {
    creator: C,
    store: SharedRowStore,
    diagonal: OnceLock<Arc<[f32]>>,
}

impl<C: RowCreator> SharedHessianCache<C> {
    /// Create a cache over the row creator holding at most `capacity` rows
    pub fn new(creator: C, capacity: usize) -> Self {
        Self {
            creator,
            store: SharedRowStore::new(capacity),
            diagonal: OnceLock::new(),
        }
    }

    /// Number of training pairs (row length)
    pub fn len(&self) -> usize {
        self.creator.len()
    }

    /// Whether the training set is empty
    pub fn is_empty(&self) -> bool {
        self.creator.is_empty()
    }

    /// The Hessian diagonal, computed once under an exclusive guard
    pub fn diagonal(&self) -> Arc<[f32]> {
        Arc::clone(
            self.diagonal
                .get_or_init(|| self.creator.compute_diagonal().into()),
        )
    }

    /// Row i of the Hessian, from cache or freshly computed
    ///
    /// The row is computed outside the lock; two callers racing on the same
    /// missing row may both compute it, and either result is inserted last.
    /// Both equal the mathematical definition, so the race is benign.
    pub fn row(&self, i: usize) -> Arc<[f32]> {
        if let Some(row) = self.store.get(i) {
            return row;
        }
        let row: Arc<[f32]> = self.creator.compute_row(i).into();
        self.store.insert(i, Arc::clone(&row));
        row
    }

    /// Prefetch the working-set rows in parallel and bundle them as the
    /// subproblem operators
    ///
    /// The returned [`ActiveSet`] holds strong references to the fetched
    /// rows; they stay valid for the subproblem's lifetime even if evicted
    /// from the cache in the meantime.
    pub fn active_subtensors(&self, working: &[usize], inactive: &[usize]) -> ActiveSet {
        let rows: Vec<Arc<[f32]>> = working.par_iter().map(|&i| self.row(i)).collect();
        ActiveSet::new(working.to_vec(), inactive.to_vec(), rows)
    }

    /// Cache statistics
    pub fn statistics(&self) -> CacheStatistics {
        self.store.statistics()
    }

    /// Zero the hit counters
    pub fn reset_statistics(&self) {
        self.store.reset_statistics();
    }
}

/// Working-set view of the Hessian
///
/// Bundles the |B| full-length rows of the current working set B and
/// exposes the restricted tensors as lazily-applied linear operators:
/// Q_BB (B×B block), Q_BN (B×N block against the inactive multipliers) and
/// Q_a (full rows indexed by B, producing a length-P vector).
pub struct ActiveSet {
    working: Vec<usize>,
    inactive: Vec<usize>,
    rows: Vec<Arc<[f32]>>,
    diagonal: Vec<f64>,
}

impl ActiveSet {
    fn new(working: Vec<usize>, inactive: Vec<usize>, rows: Vec<Arc<[f32]>>) -> Self {
        debug_assert_eq!(working.len(), rows.len());
        let diagonal = working
            .iter()
            .zip(&rows)
            .map(|(&i, row)| row[i] as f64)
            .collect();
        Self {
            working,
            inactive,
            rows,
            diagonal,
        }
    }

    /// Working-set size |B|
    pub fn size(&self) -> usize {
        self.working.len()
    }

    /// Full problem size P
    pub fn problem_size(&self) -> usize {
        self.rows.first().map_or(0, |row| row.len())
    }

    /// The working-set indices
    pub fn working(&self) -> &[usize] {
        &self.working
    }

    /// Materialised diagonal of Q_BB
    pub fn diagonal(&self) -> &[f64] {
        &self.diagonal
    }

    /// Q_BB · v for a vector over B; `out` has length |B|
    pub fn apply_bb(&self, v: &[f64], out: &mut [f64]) {
        debug_assert_eq!(v.len(), self.working.len());
        debug_assert_eq!(out.len(), self.working.len());
        for (out_k, row) in out.iter_mut().zip(&self.rows) {
            let mut acc = 0.0;
            for (&j, &v_l) in self.working.iter().zip(v) {
                acc += row[j] as f64 * v_l;
            }
            *out_k = acc;
        }
    }

    /// Q_BN · α_N; `alpha` is the full-length multiplier vector, read at the
    /// inactive positions; `out` has length |B|
    pub fn apply_bn(&self, alpha: &[f64], out: &mut [f64]) {
        debug_assert_eq!(out.len(), self.working.len());
        for (out_k, row) in out.iter_mut().zip(&self.rows) {
            let mut acc = 0.0;
            for &j in &self.inactive {
                if alpha[j] != 0.0 {
                    acc += row[j] as f64 * alpha[j];
                }
            }
            *out_k = acc;
        }
    }

    /// Q_aᵀ · v: combine the full rows with weights `v` over B; `out` has
    /// length P
    pub fn apply_rows(&self, v: &[f64], out: &mut [f64]) {
        debug_assert_eq!(v.len(), self.working.len());
        debug_assert_eq!(out.len(), self.problem_size());
        out.par_iter_mut().enumerate().for_each(|(j, out_j)| {
            let mut acc = 0.0;
            for (row, &v_k) in self.rows.iter().zip(v) {
                acc += row[j] as f64 * v_k;
            }
            *out_j = acc;
        });
    }
}
