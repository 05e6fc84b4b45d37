//! Jacobi-preconditioned conjugate gradient

/// Approximately solve A·x = b for a symmetric positive-definite operator
///
/// `apply` computes A·v into its output slice; `jacobi` holds the inverse
/// diagonal preconditioner entries. Starts from x = 0, stops when the
/// residual norm falls below `tolerance·‖b‖`, the iteration cap is reached,
/// or a direction of non-positive curvature is encountered (the truncation
/// case). Returns the number of iterations taken; the solution is left in
/// `solution`.
pub fn preconditioned_cg<A>(
    apply: A,
    rhs: &[f64],
    jacobi: &[f64],
    max_iterations: usize,
    tolerance: f64,
    solution: &mut [f64],
) -> usize
where
    A: Fn(&[f64], &mut [f64]),
{
    let n = rhs.len();
    solution.iter_mut().for_each(|v| *v = 0.0);

    let rhs_norm = norm(rhs);
    if rhs_norm == 0.0 {
        return 0;
    }
    let threshold = tolerance * rhs_norm;

    let mut residual = rhs.to_vec();
    let mut preconditioned: Vec<f64> = residual.iter().zip(jacobi).map(|(&r, &m)| r * m).collect();
    let mut direction = preconditioned.clone();
    let mut rz = dot(&residual, &preconditioned);
    let mut product = vec![0.0; n];

    for iteration in 0..max_iterations {
        apply(&direction, &mut product);
        let curvature = dot(&direction, &product);
        if curvature <= 0.0 {
            // Fall back to the preconditioned gradient when the very first
            // direction already fails, so the caller never gets a zero step
            if iteration == 0 {
                solution.copy_from_slice(&preconditioned);
            }
            return iteration;
        }

        let step = rz / curvature;
        for ((x, &d), (r, &q)) in solution
            .iter_mut()
            .zip(&direction)
            .zip(residual.iter_mut().zip(&product))
        {
            *x += step * d;
            *r -= step * q;
        }

        if norm(&residual) <= threshold {
            return iteration + 1;
        }

        for ((z, &r), &m) in preconditioned.iter_mut().zip(&residual).zip(jacobi) {
            *z = r * m;
        }
        let rz_next = dot(&residual, &preconditioned);
        let beta = rz_next / rz;
        rz = rz_next;
        for (d, &z) in direction.iter_mut().zip(&preconditioned) {
            *d = z + beta * *d;
        }
    }

    max_iterations
}

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(&x, &y)| x * y).sum()
}

pub(crate) fn norm(v: &[f64]) -> f64 {
    dot(v, v).sqrt()
}
