//! Training core for kernel-based binary Support Vector Machines
//!
//! Learns a discriminant of the form f(x) = Σᵢ αᵢ·yᵢ·K(xᵢ, x) by solving the
//! L1 soft-margin dual without the bias equality constraint. The intercept is
//! absorbed by a constant additive shift on the kernel, which enables
//! one-coordinate updates in the coordinate-descent solver.

pub mod cache;
pub mod classifier;
pub mod core;
pub mod kernel;
pub mod optim;
pub mod solver;
pub mod utils;

// Re-export main types
pub use crate::cache::{HessianCache, RowCreator, SharedHessianCache};
pub use crate::classifier::BinaryClassifier;
pub use crate::core::error::{Result, SvmError};
pub use crate::core::types::*;
pub use crate::kernel::{ComponentKernel, KernelFunction, LinearKernel, RbfKernel};
pub use crate::solver::{
    ChunkingOptions, ChunkingTrainer, CoordinateDescent, CoordinateDescentOptions,
    ParallelCoordinateDescent, SvmTrainer,
};

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
