//! Tunable thresholds and limits for the trainers

use crate::core::error::{Result, SvmError};
use std::thread;

fn default_workers() -> usize {
    thread::available_parallelism().map_or(1, |n| n.get())
}

/// Configuration for the coordinate-descent trainers
#[derive(Debug, Clone)]
pub struct CoordinateDescentOptions {
    /// Maximum number of Hessian rows kept resident
    pub cache_size: usize,
    /// Alpha threshold below which an index is not a support vector
    pub constraint_threshold: f64,
    /// KKT tolerance on the normalised gradient g/Q_ii
    pub gradient_threshold: f64,
    /// Iterations between shrink attempts once the ramp has saturated
    pub shrinking_period: usize,
    /// Enable active-set shrinking
    pub use_shrinking: bool,
    /// Outer-iteration bound; exhausting it reports non-convergence
    pub max_iterations: usize,
    /// Worker count for the partitioned loops (parallel variant only)
    pub workers: usize,
}

impl Default for CoordinateDescentOptions {
    fn default() -> Self {
        Self {
            cache_size: 2048,
            constraint_threshold: 1e-5,
            gradient_threshold: 2e-3,
            shrinking_period: 1300,
            use_shrinking: true,
            max_iterations: 400_000,
            workers: default_workers(),
        }
    }
}

impl CoordinateDescentOptions {
    /// Validate option ranges
    pub fn validate(&self) -> Result<()> {
        if self.constraint_threshold <= 0.0 {
            return Err(SvmError::InvalidParameter(format!(
                "constraint threshold must be positive, got {}",
                self.constraint_threshold
            )));
        }
        if self.gradient_threshold <= 0.0 {
            return Err(SvmError::InvalidParameter(format!(
                "gradient threshold must be positive, got {}",
                self.gradient_threshold
            )));
        }
        if self.shrinking_period == 0 {
            return Err(SvmError::InvalidParameter(
                "shrinking period must be positive".to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(SvmError::InvalidParameter(
                "max iterations must be positive".to_string(),
            ));
        }
        if self.workers == 0 || self.workers > default_workers() {
            return Err(SvmError::InvalidParameter(format!(
                "worker count must be in 1..={}, got {}",
                default_workers(),
                self.workers
            )));
        }
        Ok(())
    }
}

/// Configuration for the chunking trainer
#[derive(Debug, Clone)]
pub struct ChunkingOptions {
    /// Upper bound on the working-set size
    pub max_chunk_size: usize,
    /// Alpha distance to a box bound under which an index counts as bounded
    pub constraint_threshold: f64,
    /// KKT tolerance on the normalised gradient g/Q_ii
    pub gradient_threshold: f64,
    /// Maximum number of Hessian rows kept resident
    pub cache_size: usize,
    /// Outer-iteration bound; exhausting it reports non-convergence
    pub max_outer_iterations: usize,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            max_chunk_size: 1000,
            constraint_threshold: 1e-3,
            gradient_threshold: 1e-3,
            cache_size: 2048,
            max_outer_iterations: 10_000,
        }
    }
}

impl ChunkingOptions {
    /// Validate option ranges
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_size == 0 {
            return Err(SvmError::InvalidParameter(
                "chunk size must be positive".to_string(),
            ));
        }
        if self.constraint_threshold <= 0.0 {
            return Err(SvmError::InvalidParameter(format!(
                "constraint threshold must be positive, got {}",
                self.constraint_threshold
            )));
        }
        if self.gradient_threshold <= 0.0 {
            return Err(SvmError::InvalidParameter(format!(
                "gradient threshold must be positive, got {}",
                self.gradient_threshold
            )));
        }
        if self.max_outer_iterations == 0 {
            return Err(SvmError::InvalidParameter(
                "max outer iterations must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_descent_defaults() {
        let options = CoordinateDescentOptions::default();
        assert_eq!(options.constraint_threshold, 1e-5);
        assert_eq!(options.gradient_threshold, 2e-3);
        assert_eq!(options.shrinking_period, 1300);
        assert!(options.use_shrinking);
        assert_eq!(options.max_iterations, 400_000);
        assert!(options.workers >= 1);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_chunking_defaults() {
        let options = ChunkingOptions::default();
        assert_eq!(options.max_chunk_size, 1000);
        assert_eq!(options.constraint_threshold, 1e-3);
        assert_eq!(options.gradient_threshold, 1e-3);
        assert_eq!(options.cache_size, 2048);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_workers() {
        let mut options = CoordinateDescentOptions::default();
        options.workers = 0;
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_rejects_oversubscribed_workers() {
        let mut options = CoordinateDescentOptions::default();
        options.workers = default_workers() + 1;
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_rejects_non_positive_thresholds() {
        let mut cd = CoordinateDescentOptions::default();
        cd.gradient_threshold = 0.0;
        assert!(cd.validate().is_err());

        let mut chunking = ChunkingOptions::default();
        chunking.constraint_threshold = -1.0;
        assert!(chunking.validate().is_err());
    }
}
