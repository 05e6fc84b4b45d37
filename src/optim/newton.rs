//! Truncated-Newton barrier solver
//!
//! At each barrier level t the Newton system (t·H_L + H_φ)·d = −(t·∇L + ∇φ)
//! is solved approximately by Jacobi-preconditioned conjugate gradient; the
//! barrier parameter is driven until the duality gap closes.

use crate::core::error::{Result, SvmError};
use crate::optim::cg::{dot, norm, preconditioned_cg};
use crate::optim::step::{backtrack, merit};
use crate::optim::{BarrierOptions, Certificate, LogBarrier, MultiplierEstimate, Objective};
use log::trace;

const NEWTON_STEP_LIMIT: usize = 50;
const NEWTON_CG_TOLERANCE: f64 = 1e-6;

/// Minimise `objective` over the barrier's box by truncated Newton steps
pub fn truncated_newton<O: Objective>(
    objective: &O,
    barrier: &LogBarrier,
    start: &[f64],
    options: &BarrierOptions,
) -> Result<Certificate> {
    options.validate()?;
    let n = start.len();
    if n == 0 {
        return Ok(Certificate {
            optimum: Vec::new(),
            multipliers: Vec::new(),
            iterations: 0,
            converged: true,
        });
    }
    if objective.dim() != n {
        return Err(SvmError::InvalidParameter(format!(
            "objective dimension {} does not match start point {}",
            objective.dim(),
            n
        )));
    }
    if !barrier.in_domain(start) {
        return Err(SvmError::InvalidParameter(
            "start point outside barrier domain".to_string(),
        ));
    }

    let scale = n as f64;
    let mut x = start.to_vec();
    let mut t = options.barrier_start;
    let mut total_iterations = 0;
    let mut converged = false;

    let mut grad_l = vec![0.0; n];
    let mut grad_phi = vec![0.0; n];
    let mut hdiag_l = vec![0.0; n];
    let mut hdiag_phi = vec![0.0; n];

    for round in 0..options.max_outer_rounds {
        for _ in 0..NEWTON_STEP_LIMIT {
            objective.gradient(&x, &mut grad_l);
            barrier.gradient(&x, &mut grad_phi);
            let grad: Vec<f64> = grad_l
                .iter()
                .zip(&grad_phi)
                .map(|(&gl, &gp)| t * gl + gp)
                .collect();

            objective.hessian_diagonal(&x, &mut hdiag_l);
            barrier.hessian_diagonal(&x, &mut hdiag_phi);
            let jacobi: Vec<f64> = hdiag_l
                .iter()
                .zip(&hdiag_phi)
                .map(|(&hl, &hp)| 1.0 / (t * hl + hp))
                .collect();

            let scaled_norm = grad
                .iter()
                .zip(&jacobi)
                .map(|(&g, &m)| (g * m) * (g * m))
                .sum::<f64>()
                .sqrt();
            if scaled_norm / scale < options.step_tolerance {
                break;
            }

            let rhs: Vec<f64> = grad.iter().map(|&g| -g).collect();
            let mut direction = vec![0.0; n];
            let point = &x;
            let apply = |v: &[f64], out: &mut [f64]| {
                objective.hessian_apply(point, v, out);
                for ((o, &hp), &vi) in out.iter_mut().zip(&hdiag_phi).zip(v) {
                    *o = t * *o + hp * vi;
                }
            };
            total_iterations += preconditioned_cg(
                apply,
                &rhs,
                &jacobi,
                options.max_cg_iterations,
                NEWTON_CG_TOLERANCE,
                &mut direction,
            );

            let mut directional = dot(&direction, &grad);
            if directional >= 0.0 {
                // The truncated solve can fail to descend; fall back to the
                // preconditioned steepest direction
                for ((d, &g), &m) in direction.iter_mut().zip(&grad).zip(&jacobi) {
                    *d = -g * m;
                }
                directional = dot(&direction, &grad);
            }

            let current = merit(objective, barrier, t, &x);
            let Some((step, next, _)) =
                backtrack(objective, barrier, t, &x, &direction, current, directional)
            else {
                break;
            };

            let displacement = step * norm(&direction);
            x = next;
            if displacement / scale < options.step_tolerance {
                break;
            }
        }

        let gap = 2.0 / t;
        trace!(
            "truncated-newton barrier round {}: t = {:.3e}, gap/n = {:.3e}",
            round,
            t,
            gap
        );
        if gap <= options.duality_gap_tolerance {
            converged = true;
            break;
        }
        t *= options.barrier_growth;
    }

    let multipliers = MultiplierEstimate::new(barrier.upper()).evaluate(t, &x);
    Ok(Certificate {
        optimum: x,
        multipliers,
        iterations: total_iterations,
        converged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optim::tests::DiagonalQuadratic;

    #[test]
    fn test_interior_minimum() {
        let objective = DiagonalQuadratic::new(vec![2.0], vec![-2.0]);
        let barrier = LogBarrier::new(3.0);

        let certificate =
            truncated_newton(&objective, &barrier, &[0.5], &BarrierOptions::default()).unwrap();
        assert!(certificate.converged);
        // Unconstrained minimum of x² − 2x is at 1, interior to (0, 3)
        assert!((certificate.optimum[0] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_matches_line_search() {
        let objective = DiagonalQuadratic::new(vec![1.0, 4.0], vec![-3.0, -1.0]);
        let barrier = LogBarrier::new(2.0);
        let options = BarrierOptions::default();

        let newton = truncated_newton(&objective, &barrier, &[1.0, 1.0], &options).unwrap();
        let descent =
            crate::optim::line_search(&objective, &barrier, &[1.0, 1.0], &options).unwrap();

        for (a, b) in newton.optimum.iter().zip(&descent.optimum) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn test_boundary_minimum_stays_inside() {
        let objective = DiagonalQuadratic::new(vec![1.0], vec![3.0]);
        let barrier = LogBarrier::new(1.0);

        // Unconstrained minimum at −3; the iterate must stay above 0
        let certificate =
            truncated_newton(&objective, &barrier, &[0.5], &BarrierOptions::default()).unwrap();
        assert!(certificate.optimum[0] > 0.0);
        assert!(certificate.optimum[0] < 0.01);
    }

    #[test]
    fn test_rejects_dimension_mismatch() {
        let objective = DiagonalQuadratic::new(vec![1.0, 1.0], vec![0.0, 0.0]);
        let barrier = LogBarrier::new(1.0);

        let result = truncated_newton(&objective, &barrier, &[0.5], &BarrierOptions::default());
        assert!(result.is_err());
    }
}
