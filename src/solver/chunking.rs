//! Chunking trainer
//!
//! Selects a working set of KKT-violating variables, restricts the dual to
//! that set and hands the restricted quadratic to a log-barrier inner
//! solver, then propagates the solution through the full gradient via the
//! active-set tensors. The inner solver is a strategy chosen at
//! construction: conjugate-gradient descent with line search, or truncated
//! Newton.

use crate::cache::{ActiveSet, SharedHessianCache, StealingRowCreator};
use crate::core::error::{Result, SvmError};
use crate::core::{TrainOutcome, TrainingPair};
use crate::kernel::{ComponentKernel, KernelFunction};
use crate::optim::cg::dot;
use crate::optim::{line_search, truncated_newton, BarrierOptions, LogBarrier, Objective};
use crate::solver::{
    append_support_vectors, check_training_inputs, ChunkingOptions, SvmTrainer,
};
use log::debug;
use std::sync::Arc;

/// Restricted dual over the working set: ½·λᵀ·Q_BB·λ + g_c·λ
struct WorkingSetObjective<'a> {
    tensors: &'a ActiveSet,
    linear: Vec<f64>,
}

impl Objective for WorkingSetObjective<'_> {
    fn dim(&self) -> usize {
        self.tensors.size()
    }

    fn value(&self, x: &[f64]) -> f64 {
        let mut product = vec![0.0; x.len()];
        self.tensors.apply_bb(x, &mut product);
        0.5 * dot(x, &product) + dot(&self.linear, x)
    }

    fn gradient(&self, x: &[f64], out: &mut [f64]) {
        self.tensors.apply_bb(x, out);
        for (o, &l) in out.iter_mut().zip(&self.linear) {
            *o += l;
        }
    }

    fn hessian_apply(&self, _x: &[f64], v: &[f64], out: &mut [f64]) {
        self.tensors.apply_bb(v, out);
    }

    fn hessian_diagonal(&self, _x: &[f64], out: &mut [f64]) {
        out.copy_from_slice(self.tensors.diagonal());
    }
}

/// Inner-solver strategy for the restricted subproblem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InnerSolver {
    /// Conjugate-gradient descent with backtracking line search
    LineSearch,
    /// Truncated Newton with Jacobi-preconditioned CG
    TruncatedNewton,
}

/// Chunking trainer with an interior-point inner solver
pub struct ChunkingTrainer {
    options: ChunkingOptions,
    barrier_options: BarrierOptions,
    inner: InnerSolver,
}

impl ChunkingTrainer {
    /// Create a trainer using the line-search inner solver
    pub fn line_search(options: ChunkingOptions) -> Self {
        Self::new(options, InnerSolver::LineSearch)
    }

    /// Create a trainer using the truncated-Newton inner solver
    pub fn truncated_newton(options: ChunkingOptions) -> Self {
        Self::new(options, InnerSolver::TruncatedNewton)
    }

    /// Create a trainer with an explicit inner-solver strategy
    pub fn new(options: ChunkingOptions, inner: InnerSolver) -> Self {
        Self {
            options,
            barrier_options: BarrierOptions::default(),
            inner,
        }
    }

    /// Replace the inner solver's tunables
    pub fn with_barrier_options(mut self, barrier_options: BarrierOptions) -> Self {
        self.barrier_options = barrier_options;
        self
    }

    /// The trainer's options
    pub fn options(&self) -> &ChunkingOptions {
        &self.options
    }

    /// Collect KKT-violating candidates as (|ĝᵢ|, i), by the tolerance
    /// policy: interior points violate on |ĝᵢ|, bounded points on the sign
    /// that would move them off their bound
    fn candidates(
        &self,
        alpha: &[f64],
        gradient: &[f64],
        diagonal: &[f32],
        c: f64,
    ) -> Vec<(f64, usize)> {
        let near = self.options.constraint_threshold;
        let threshold = self.options.gradient_threshold;
        let mut found = Vec::new();
        for i in 0..alpha.len() {
            let normalised = gradient[i] / diagonal[i] as f64;
            let violating = if alpha[i] < near {
                normalised < -threshold
            } else if alpha[i] > c - near {
                normalised > threshold
            } else {
                normalised.abs() > threshold
            };
            if violating {
                found.push((normalised.abs(), i));
            }
        }
        found
    }
}

/// Both slices sorted ascending
fn is_sorted_subset(sub: &[usize], sup: &[usize]) -> bool {
    let mut cursor = sup.iter();
    sub.iter().all(|needle| cursor.any(|hay| hay == needle))
}

impl<K: KernelFunction> SvmTrainer<K> for ChunkingTrainer {
    fn train(
        &self,
        pairs: &[TrainingPair<K::Item>],
        c: f64,
        kernel: &mut ComponentKernel<K>,
    ) -> Result<TrainOutcome> {
        self.options.validate()?;
        self.barrier_options.validate()?;
        check_training_inputs(pairs, c)?;
        let problem_size = pairs.len();
        debug!(
            "chunking ({:?}): {} pairs, C = {}, chunk limit {}",
            self.inner, problem_size, c, self.options.max_chunk_size
        );

        let data: Arc<[TrainingPair<K::Item>]> = pairs.to_vec().into();
        let creator = StealingRowCreator::new(data, kernel);
        let cache = SharedHessianCache::new(creator, self.options.cache_size);

        let diagonal = cache.diagonal();
        if let Some((index, &value)) = diagonal.iter().enumerate().find(|&(_, &v)| v <= 0.0) {
            return Err(SvmError::DegenerateDiagonal {
                index,
                value: value as f64,
            });
        }

        let mut alpha = vec![0.0; problem_size];
        let mut gradient = vec![-1.0; problem_size];
        let mut previous: Vec<usize> = Vec::new();
        let mut iterations = 0;
        let mut converged = false;

        for round in 0..self.options.max_outer_iterations {
            let mut candidates = self.candidates(&alpha, &gradient, &diagonal, c);
            candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut working: Vec<usize> = candidates
                .iter()
                .take(self.options.max_chunk_size)
                .map(|&(_, i)| i)
                .collect();
            working.sort_unstable();

            if working.is_empty() || is_sorted_subset(&working, &previous) {
                converged = true;
                break;
            }
            iterations = round + 1;

            let mut in_working = vec![false; problem_size];
            for &i in &working {
                in_working[i] = true;
            }
            let inactive: Vec<usize> = (0..problem_size).filter(|&i| !in_working[i]).collect();

            let tensors = cache.active_subtensors(&working, &inactive);
            let mut linear = vec![0.0; working.len()];
            tensors.apply_bn(&alpha, &mut linear);
            for l in linear.iter_mut() {
                *l -= 1.0;
            }
            let objective = WorkingSetObjective {
                tensors: &tensors,
                linear,
            };
            let barrier = LogBarrier::new(c);
            let seed = vec![c / 2.0; working.len()];

            let certificate = match self.inner {
                InnerSolver::LineSearch => {
                    line_search(&objective, &barrier, &seed, &self.barrier_options)?
                }
                InnerSolver::TruncatedNewton => {
                    truncated_newton(&objective, &barrier, &seed, &self.barrier_options)?
                }
            };
            debug!(
                "chunking round {}: |B| = {}, inner iterations = {}",
                round,
                working.len(),
                certificate.iterations
            );

            // Propagate the working-set change through all P gradients
            let solution: Vec<f64> = certificate
                .optimum
                .iter()
                .map(|&v| v.clamp(0.0, c))
                .collect();
            let delta: Vec<f64> = working
                .iter()
                .zip(&solution)
                .map(|(&i, &solved)| solved - alpha[i])
                .collect();
            let mut update = vec![0.0; problem_size];
            tensors.apply_rows(&delta, &mut update);
            for (g, &u) in gradient.iter_mut().zip(&update) {
                *g += u;
            }
            for (&i, &solved) in working.iter().zip(&solution) {
                alpha[i] = solved;
            }

            previous = working;
        }

        debug!(
            "chunking finished: {} rounds, converged = {}, cache hit rate = {:.3}",
            iterations,
            converged,
            cache.statistics().hit_rate()
        );

        let support_count =
            append_support_vectors(kernel, pairs, &alpha, self.options.constraint_threshold);
        Ok(TrainOutcome {
            alpha,
            iterations,
            support_count,
            converged,
        })
    }
}
