//! Log-barrier constrained minimisation for the chunking subproblems
//!
//! Minimises a smooth convex objective over the open box (0, C)^n with two
//! interchangeable strategies: preconditioned conjugate-gradient descent
//! with a backtracking line search, and a truncated-Newton method whose
//! Newton systems are solved approximately by Jacobi-preconditioned CG.

pub mod cg;
pub mod line_search;
pub mod newton;
pub mod objective;
mod step;

pub use self::cg::*;
pub use self::line_search::*;
pub use self::newton::*;
pub use self::objective::*;

#[cfg(test)]
pub(crate) mod tests {
    use super::Objective;

    /// ½·xᵀ·diag(d)·x + b·x, the simplest strictly convex test objective
    pub(crate) struct DiagonalQuadratic {
        diagonal: Vec<f64>,
        linear: Vec<f64>,
    }

    impl DiagonalQuadratic {
        pub(crate) fn new(diagonal: Vec<f64>, linear: Vec<f64>) -> Self {
            assert_eq!(diagonal.len(), linear.len());
            Self { diagonal, linear }
        }
    }

    impl Objective for DiagonalQuadratic {
        fn dim(&self) -> usize {
            self.diagonal.len()
        }

        fn value(&self, x: &[f64]) -> f64 {
            x.iter()
                .zip(self.diagonal.iter().zip(&self.linear))
                .map(|(&xi, (&di, &bi))| 0.5 * di * xi * xi + bi * xi)
                .sum()
        }

        fn gradient(&self, x: &[f64], out: &mut [f64]) {
            for (o, (&xi, (&di, &bi))) in out
                .iter_mut()
                .zip(x.iter().zip(self.diagonal.iter().zip(&self.linear)))
            {
                *o = di * xi + bi;
            }
        }

        fn hessian_apply(&self, _x: &[f64], v: &[f64], out: &mut [f64]) {
            for (o, (&vi, &di)) in out.iter_mut().zip(v.iter().zip(&self.diagonal)) {
                *o = di * vi;
            }
        }

        fn hessian_diagonal(&self, _x: &[f64], out: &mut [f64]) {
            out.copy_from_slice(&self.diagonal);
        }
    }
}
