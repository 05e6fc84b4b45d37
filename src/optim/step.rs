//! Backtracking step selection shared by the barrier solvers

use crate::optim::{LogBarrier, Objective};

const ARMIJO_SLOPE: f64 = 1e-4;
const MAX_HALVINGS: usize = 60;

/// Merit function of the barrier subproblem: t·L(x) + φ(x)
///
/// +∞ outside the barrier domain, which makes every out-of-domain candidate
/// fail the sufficient-decrease test.
pub(crate) fn merit<O: Objective>(objective: &O, barrier: &LogBarrier, t: f64, x: &[f64]) -> f64 {
    let phi = barrier.value(x);
    if phi.is_infinite() {
        return f64::INFINITY;
    }
    t * objective.value(x) + phi
}

/// Backtracking line search along `direction`
///
/// Halves the step until the candidate is strictly inside the domain and
/// satisfies the Armijo sufficient-decrease condition. `directional` is the
/// slope g·d at `x` and must be negative. Returns the accepted step, point
/// and merit, or None when no acceptable step exists.
pub(crate) fn backtrack<O: Objective>(
    objective: &O,
    barrier: &LogBarrier,
    t: f64,
    x: &[f64],
    direction: &[f64],
    current_merit: f64,
    directional: f64,
) -> Option<(f64, Vec<f64>, f64)> {
    let mut step = 1.0;
    for _ in 0..MAX_HALVINGS {
        let candidate: Vec<f64> = x
            .iter()
            .zip(direction)
            .map(|(&xi, &di)| xi + step * di)
            .collect();
        if barrier.in_domain(&candidate) {
            let value = merit(objective, barrier, t, &candidate);
            if value <= current_merit + ARMIJO_SLOPE * step * directional {
                return Some((step, candidate, value));
            }
        }
        step *= 0.5;
    }
    None
}
