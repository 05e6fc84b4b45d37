//! Public classifier surface
//!
//! Binds a trainer to a kernel. The constructor augments the kernel with a
//! constant +1 shift so the intercept is absorbed into the kernel and the
//! dual needs no equality constraint; after training, the discriminant is
//! the kernel's component sum.

use crate::core::error::{Result, SvmError};
use crate::core::{TrainOutcome, TrainingPair};
use crate::kernel::{ComponentKernel, KernelFunction};
use crate::solver::{ParallelCoordinateDescent, SvmTrainer};
use log::debug;

/// Constant kernel shift absorbing the intercept
const BIAS_SHIFT: f64 = 1.0;

/// A binary kernel classifier
pub struct BinaryClassifier<K: KernelFunction, T> {
    kernel: ComponentKernel<K>,
    trainer: T,
    outcome: Option<TrainOutcome>,
}

impl<K: KernelFunction> BinaryClassifier<K, ParallelCoordinateDescent> {
    /// Create a classifier with the default trainer (parallel coordinate
    /// descent)
    pub fn new(function: K) -> Self {
        Self::with_trainer(function, ParallelCoordinateDescent::default())
    }
}

impl<K: KernelFunction, T: SvmTrainer<K>> BinaryClassifier<K, T> {
    /// Create a classifier with an explicit trainer
    pub fn with_trainer(function: K, trainer: T) -> Self {
        Self {
            kernel: ComponentKernel::with_shift(function, BIAS_SHIFT),
            trainer,
            outcome: None,
        }
    }

    /// Train on the given pairs with penalty C
    ///
    /// Requires at least one positive and one negative example; clears any
    /// previously trained components first.
    pub fn train(&mut self, pairs: &[TrainingPair<K::Item>], c: f64) -> Result<&TrainOutcome> {
        if pairs.is_empty() {
            return Err(SvmError::EmptyTrainingSet);
        }
        if !pairs.iter().any(|p| p.label > 0.0) {
            return Err(SvmError::MissingClass("positive"));
        }
        if !pairs.iter().any(|p| p.label < 0.0) {
            return Err(SvmError::MissingClass("negative"));
        }

        self.kernel.clear_components();
        self.outcome = None;
        let outcome = self.trainer.train(pairs, c, &mut self.kernel)?;
        debug!(
            "trained on {} pairs: {} support vectors, converged = {}",
            pairs.len(),
            outcome.support_count,
            outcome.converged
        );
        Ok(self.outcome.insert(outcome))
    }

    /// Raw discriminant value; its sign is the predicted class, and it is
    /// 0.0 before training
    pub fn discriminate(&self, item: &K::Item) -> f64 {
        self.kernel.compute_sum(item)
    }

    /// Predicted class label, +1.0 or -1.0
    pub fn predict(&self, item: &K::Item) -> f64 {
        if self.discriminate(item) >= 0.0 {
            1.0
        } else {
            -1.0
        }
    }

    /// Whether the classifier holds a trained discriminant
    pub fn is_trained(&self) -> bool {
        self.kernel.has_components()
    }

    /// The kernel with its accumulated support-vector components
    pub fn kernel(&self) -> &ComponentKernel<K> {
        &self.kernel
    }

    /// The last training outcome, if any
    pub fn outcome(&self) -> Option<&TrainOutcome> {
        self.outcome.as_ref()
    }
}
