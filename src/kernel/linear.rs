//! Linear kernel implementation

use crate::core::SparseVector;
use crate::kernel::KernelFunction;

/// Linear kernel: K(x, y) = x^T · y
///
/// The simplest kernel function; for sparse vectors the dot product is a
/// merge walk over the sorted index lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearKernel;

impl LinearKernel {
    /// Create a new linear kernel
    pub fn new() -> Self {
        Self
    }
}

impl KernelFunction for LinearKernel {
    type Item = SparseVector;

    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        x.dot(y)
    }
}
