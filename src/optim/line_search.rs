//! Barrier solver with conjugate-gradient descent and backtracking
//!
//! Each barrier level minimises t·L + φ by preconditioned Polak-Ribière
//! conjugate-gradient descent; the step along the feasible direction is
//! chosen by backtracking, staying strictly inside the box.

use crate::core::error::{Result, SvmError};
use crate::optim::cg::{dot, norm};
use crate::optim::step::{backtrack, merit};
use crate::optim::{BarrierOptions, Certificate, LogBarrier, MultiplierEstimate, Objective};
use log::trace;

/// Minimise `objective` over the barrier's box by CG descent
pub fn line_search<O: Objective>(
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
        let mut previous: Option<(Vec<f64>, Vec<f64>)> = None;
        let mut direction = vec![0.0; n];

        for _ in 0..options.max_cg_iterations {
            objective.gradient(&x, &mut grad_l);
            barrier.gradient(&x, &mut grad_phi);
            let grad: Vec<f64> = grad_l
                .iter()
                .zip(&grad_phi)
                .map(|(&gl, &gp)| t * gl + gp)
                .collect();

            objective.hessian_diagonal(&x, &mut hdiag_l);
            barrier.hessian_diagonal(&x, &mut hdiag_phi);
            let preconditioned: Vec<f64> = grad
                .iter()
                .zip(hdiag_l.iter().zip(&hdiag_phi))
                .map(|(&g, (&hl, &hp))| g / (t * hl + hp))
                .collect();

            if norm(&preconditioned) / scale < options.step_tolerance {
                break;
            }

            // Polak-Ribière on the preconditioned gradient, restarted when
            // the conjugate direction fails to descend
            let beta = match &previous {
                Some((grad_prev, precond_prev)) => {
                    let denominator = dot(precond_prev, grad_prev);
                    if denominator > 0.0 {
                        ((dot(&preconditioned, &grad) - dot(&preconditioned, grad_prev))
                            / denominator)
                            .max(0.0)
                    } else {
                        0.0
                    }
                }
                None => 0.0,
            };
            for (d, &z) in direction.iter_mut().zip(&preconditioned) {
                *d = -z + beta * *d;
            }
            let mut directional = dot(&direction, &grad);
            if directional >= 0.0 {
                for (d, &z) in direction.iter_mut().zip(&preconditioned) {
                    *d = -z;
                }
                directional = -dot(&preconditioned, &grad);
            }

            let current = merit(objective, barrier, t, &x);
            let Some((step, next, _)) =
                backtrack(objective, barrier, t, &x, &direction, current, directional)
            else {
                break;
            };

            let displacement = step * norm(&direction);
            x = next;
            total_iterations += 1;
            previous = Some((grad, preconditioned));

            if displacement / scale < options.step_tolerance {
                break;
            }
        }

        let gap = 2.0 / t;
        trace!(
            "line-search barrier round {}: t = {:.3e}, gap/n = {:.3e}",
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
