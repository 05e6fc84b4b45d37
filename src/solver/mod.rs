//! Dual solvers for the soft-margin SVM
//!
//! Two trainer families solve the L1 soft-margin dual without the bias
//! equality constraint: one-coordinate descent (serial and parallel) and
//! chunking with an interior-point inner solver. Both append the resulting
//! support vectors to the kernel they were handed.

pub mod chunking;
pub mod coordinate;
pub mod options;

pub use self::chunking::*;
pub use self::coordinate::*;
pub use self::options::*;

use crate::core::error::{Result, SvmError};
use crate::core::{TrainOutcome, TrainingPair};
use crate::kernel::{ComponentKernel, KernelFunction};

/// A dual solver that trains a kernel machine in place
pub trait SvmTrainer<K: KernelFunction> {
    /// Solve the dual for the given training pairs and penalty C
    ///
    /// On success the support-vector components (αᵢ·yᵢ, xᵢ) have been
    /// appended to `kernel` and the outcome carries the full α vector.
    fn train(
        &self,
        pairs: &[TrainingPair<K::Item>],
        c: f64,
        kernel: &mut ComponentKernel<K>,
    ) -> Result<TrainOutcome>;
}

/// Fail fast on inputs no solver can work with
pub(crate) fn check_training_inputs<T>(pairs: &[TrainingPair<T>], c: f64) -> Result<()> {
    if pairs.is_empty() {
        return Err(SvmError::EmptyTrainingSet);
    }
    if c <= 0.0 {
        return Err(SvmError::InvalidParameter(format!(
            "penalty C must be positive, got {}",
            c
        )));
    }
    for pair in pairs {
        if pair.label != 1.0 && pair.label != -1.0 {
            return Err(SvmError::InvalidLabel(pair.label));
        }
    }
    Ok(())
}

/// Append the support vectors (αᵢ > threshold) to the kernel
pub(crate) fn append_support_vectors<K: KernelFunction>(
    kernel: &mut ComponentKernel<K>,
    pairs: &[TrainingPair<K::Item>],
    alpha: &[f64],
    threshold: f64,
) -> usize {
    let mut count = 0;
    for (pair, &a) in pairs.iter().zip(alpha) {
        if a > threshold {
            kernel.add_component(a * pair.label, pair.item.clone());
            count += 1;
        }
    }
    count
}
