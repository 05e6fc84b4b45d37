//! Signed-Gram row creators
//!
//! A row creator produces row i of the dual Hessian on demand:
//! row[j] = yᵢ·yⱼ·K(xᵢ, xⱼ), cast to f32. Every creator evaluates the
//! kernel through a forked evaluator carrying xᵢ as a single unit-weight
//! component, so `fork.compute_sum(xⱼ)` yields K(xᵢ, xⱼ) and parallel
//! workers never share mutable kernel state.

use crate::core::TrainingPair;
use crate::kernel::{ComponentKernel, KernelFunction};
use crate::utils::partition_ranges;
use rayon::prelude::*;
use std::sync::Arc;
use std::thread;

/// On-demand producer of signed-Gram rows
pub trait RowCreator: Send + Sync {
    /// Number of training pairs (row length)
    fn len(&self) -> usize;

    /// Whether the training set is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Compute row i: `row[j] = yᵢ·yⱼ·K(xᵢ, xⱼ)` as f32
    fn compute_row(&self, i: usize) -> Vec<f32>;

    /// Compute the Hessian diagonal `Qᵢᵢ = K(xᵢ, xᵢ)` as f32
    fn compute_diagonal(&self) -> Vec<f32>;
}

/// Kernel diagonal; yᵢ² = 1 so labels drop out
fn signed_diagonal<K: KernelFunction>(
    pairs: &[TrainingPair<K::Item>],
    kernel: &ComponentKernel<K>,
) -> Vec<f32> {
    pairs
        .iter()
        .map(|p| kernel.compute(&p.item, &p.item) as f32)
        .collect()
}

/// A fork carrying item i as its only component, for pairwise evaluation
fn probe<K: KernelFunction>(
    pairs: &[TrainingPair<K::Item>],
    kernel: &ComponentKernel<K>,
    i: usize,
) -> ComponentKernel<K> {
    let mut fork = kernel.fork_new();
    fork.add_component(1.0, pairs[i].item.clone());
    fork
}

/// Single-threaded row creator
pub struct SerialRowCreator<K: KernelFunction> {
    pairs: Arc<[TrainingPair<K::Item>]>,
    kernel: ComponentKernel<K>,
}

impl<K: KernelFunction> SerialRowCreator<K> {
    /// Create a serial row creator over the training pairs
    pub fn new(pairs: Arc<[TrainingPair<K::Item>]>, kernel: &ComponentKernel<K>) -> Self {
        Self {
            pairs,
            kernel: kernel.fork_new(),
        }
    }
}

impl<K: KernelFunction> RowCreator for SerialRowCreator<K> {
    fn len(&self) -> usize {
        self.pairs.len()
    }

    fn compute_row(&self, i: usize) -> Vec<f32> {
        let fork = probe(&self.pairs, &self.kernel, i);
        let yi = self.pairs[i].label;
        self.pairs
            .iter()
            .map(|p| (yi * p.label * fork.compute_sum(&p.item)) as f32)
            .collect()
    }

    fn compute_diagonal(&self) -> Vec<f32> {
        signed_diagonal(&self.pairs, &self.kernel)
    }
}

/// Statically partitioned parallel row creator
///
/// The column range is split into contiguous equal-length slices, one slice
/// per worker, each with its own forked evaluator. Suits kernels whose
/// per-pair cost is uniform.
pub struct PartitionedRowCreator<K: KernelFunction> {
    pairs: Arc<[TrainingPair<K::Item>]>,
    kernel: ComponentKernel<K>,
    workers: usize,
}

impl<K: KernelFunction> PartitionedRowCreator<K> {
    /// Create a partitioned row creator with the given worker count
    pub fn new(
        pairs: Arc<[TrainingPair<K::Item>]>,
        kernel: &ComponentKernel<K>,
        workers: usize,
    ) -> Self {
        Self {
            pairs,
            kernel: kernel.fork_new(),
            workers: workers.max(1),
        }
    }
}

impl<K: KernelFunction> RowCreator for PartitionedRowCreator<K> {
    fn len(&self) -> usize {
        self.pairs.len()
    }

    fn compute_row(&self, i: usize) -> Vec<f32> {
        let n = self.pairs.len();
        let yi = self.pairs[i].label;
        let mut row = vec![0.0f32; n];

        thread::scope(|scope| {
            let mut rest = row.as_mut_slice();
            let mut consumed = 0usize;
            for range in partition_ranges(0, n, self.workers) {
                if range.is_empty() {
                    continue;
                }
                let (slice, tail) = std::mem::take(&mut rest).split_at_mut(range.end - consumed);
                consumed = range.end;
                rest = tail;

                let fork = probe(&self.pairs, &self.kernel, i);
                let pairs = &self.pairs;
                scope.spawn(move || {
                    for (out, j) in slice.iter_mut().zip(range) {
                        let p = &pairs[j];
                        *out = (yi * p.label * fork.compute_sum(&p.item)) as f32;
                    }
                });
            }
        });

        row
    }

    fn compute_diagonal(&self) -> Vec<f32> {
        signed_diagonal(&self.pairs, &self.kernel)
    }
}

/// Load-balancing parallel row creator
///
/// Columns are distributed by work-stealing, with one forked evaluator per
/// stolen sub-range. The right choice when per-pair kernel cost varies, e.g.
/// variable-length sequence kernels.
pub struct StealingRowCreator<K: KernelFunction> {
    pairs: Arc<[TrainingPair<K::Item>]>,
    kernel: ComponentKernel<K>,
}

impl<K: KernelFunction> StealingRowCreator<K> {
    /// Create a work-stealing row creator over the training pairs
    pub fn new(pairs: Arc<[TrainingPair<K::Item>]>, kernel: &ComponentKernel<K>) -> Self {
        Self {
            pairs,
            kernel: kernel.fork_new(),
        }
    }
}

impl<K: KernelFunction> RowCreator for StealingRowCreator<K> {
    fn len(&self) -> usize {
        self.pairs.len()
    }

    fn compute_row(&self, i: usize) -> Vec<f32> {
        let yi = self.pairs[i].label;
        let pairs = &self.pairs;
        (0..pairs.len())
            .into_par_iter()
            .map_init(
                || probe(pairs, &self.kernel, i),
                |fork, j| {
                    let p = &pairs[j];
                    (yi * p.label * fork.compute_sum(&p.item)) as f32
                },
            )
            .collect()
    }

    fn compute_diagonal(&self) -> Vec<f32> {
        signed_diagonal(&self.pairs, &self.kernel)
    }
}
