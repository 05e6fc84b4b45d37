//! Component-accumulating kernel façade
//!
//! Wraps a [`KernelFunction`] together with a list of weighted components
//! (the support vectors of a trained machine) and a constant additive shift.
//! The shift augments the kernel, K'(x, y) = K(x, y) + s; with s = 1.0 the
//! intercept of the discriminant is absorbed into the kernel, which is what
//! lets the solvers drop the bias equality constraint.

use crate::kernel::KernelFunction;
use std::sync::Arc;

/// A weighted component of the discriminant
#[derive(Clone, Debug)]
pub struct Component<T> {
    /// Weight, αᵢ·yᵢ for a support vector
    pub weight: f64,
    /// The stored item
    pub item: T,
}

/// Kernel evaluator with accumulated components and a constant shift
///
/// The wrapped kernel function is shared immutably; the component list and
/// the shift are per-evaluator state, so a fork is an independent evaluator
/// that can be moved to another thread.
pub struct ComponentKernel<K: KernelFunction> {
    function: Arc<K>,
    shift: f64,
    components: Vec<Component<K::Item>>,
}

impl<K: KernelFunction> ComponentKernel<K> {
    /// Create a new evaluator with no components and no shift
    pub fn new(function: K) -> Self {
        Self::with_shift(function, 0.0)
    }

    /// Create a new evaluator with a constant additive kernel shift
    pub fn with_shift(function: K, shift: f64) -> Self {
        Self {
            function: Arc::new(function),
            shift,
            components: Vec::new(),
        }
    }

    /// Kernel value between two items, including the shift
    pub fn compute(&self, x: &K::Item, y: &K::Item) -> f64 {
        self.function.compute(x, y) + self.shift
    }

    /// Weighted sum Σ_k w_k · K'(c_k, x) over the accumulated components
    ///
    /// Returns 0.0 when no components have been added.
    pub fn compute_sum(&self, x: &K::Item) -> f64 {
        self.components
            .iter()
            .map(|c| c.weight * self.compute(&c.item, x))
            .sum()
    }

    /// Append a weighted component
    pub fn add_component(&mut self, weight: f64, item: K::Item) {
        self.components.push(Component { weight, item });
    }

    /// Remove all components
    pub fn clear_components(&mut self) {
        self.components.clear();
    }

    /// Whether any components have been accumulated
    pub fn has_components(&self) -> bool {
        !self.components.is_empty()
    }

    /// The accumulated components
    pub fn components(&self) -> &[Component<K::Item>] {
        &self.components
    }

    /// The constant additive shift
    pub fn shift(&self) -> f64 {
        self.shift
    }

    /// Fork an independent evaluator
    ///
    /// The fork shares only the immutable kernel function; it starts with an
    /// empty component list, so it can be handed to another thread and
    /// mutated there without touching this evaluator.
    pub fn fork_new(&self) -> Self {
        Self {
            function: Arc::clone(&self.function),
            shift: self.shift,
            components: Vec::new(),
        }
    }
}

impl<K: KernelFunction> Clone for ComponentKernel<K> {
    fn clone(&self) -> Self {
        Self {
            function: Arc::clone(&self.function),
            shift: self.shift,
            components: self.components.clone(),
        }
    }
}
