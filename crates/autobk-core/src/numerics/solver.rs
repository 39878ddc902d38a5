//! Levenberg-Marquardt least squares over free scalar parameters.
//!
//! The residual function is treated as a black box: the Jacobian is estimated
//! by forward differences and the damped normal equations are solved on dense
//! [`DenseMatrix`] storage. Failure to converge within the evaluation budget
//! is not an error; the best parameters reached are returned with
//! `converged == false` so callers can decide what to do with them.

use super::linalg::{DenseMatrix, lu_factorize};
use thiserror::Error;

const INITIAL_DAMPING: f64 = 1.0e-3;
const DAMPING_INCREASE: f64 = 10.0;
const DAMPING_DECREASE: f64 = 0.1;
const MAX_DAMPING: f64 = 1.0e12;
const MIN_DAMPING: f64 = 1.0e-12;
/// Additive floor on the damped diagonal so parameters with locally vanishing
/// influence cannot make the normal equations singular.
const DIAGONAL_FLOOR: f64 = 1.0e-12;
const GRADIENT_FLOOR: f64 = 1.0e-14;
const COST_FLOOR: f64 = 1.0e-30;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverOptions {
    /// Relative cost reduction (and step size) below which an accepted step
    /// counts as converged.
    pub tolerance: f64,
    /// Residual-evaluation budget; 0 selects `200 * (n + 1)`.
    pub max_evaluations: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            tolerance: 1.0e-4,
            max_evaluations: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("least-squares fit needs at least one free parameter")]
    NoParameters,
    #[error("residual vector must not be empty")]
    EmptyResidual,
    #[error("under-determined fit: {residuals} residuals for {parameters} parameters")]
    Underdetermined {
        residuals: usize,
        parameters: usize,
    },
    #[error("residual contained a non-finite value at the starting point")]
    NonFiniteResidual,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeastSquaresSolution {
    pub parameters: Vec<f64>,
    /// Parameter covariance scaled by the reduced chi-square; all zeros when
    /// the normal equations are singular at the solution.
    pub covariance: DenseMatrix,
    pub standard_errors: Vec<f64>,
    pub n_evaluations: usize,
    pub n_residuals: usize,
    pub reduced_chi_square: f64,
    pub converged: bool,
}

/// Minimize the sum of squares of `residual_fn` over `initial`.
pub fn minimize<F>(
    mut residual_fn: F,
    initial: &[f64],
    options: SolverOptions,
) -> Result<LeastSquaresSolution, SolverError>
where
    F: FnMut(&[f64]) -> Vec<f64>,
{
    let n = initial.len();
    if n == 0 {
        return Err(SolverError::NoParameters);
    }
    let max_evaluations = if options.max_evaluations == 0 {
        200 * (n + 1)
    } else {
        options.max_evaluations
    };

    let mut params = initial.to_vec();
    let mut residuals = residual_fn(&params);
    let mut n_evaluations = 1;

    let m = residuals.len();
    if m == 0 {
        return Err(SolverError::EmptyResidual);
    }
    if m < n {
        return Err(SolverError::Underdetermined {
            residuals: m,
            parameters: n,
        });
    }
    if !residuals.iter().all(|value| value.is_finite()) {
        return Err(SolverError::NonFiniteResidual);
    }

    let mut cost = sum_of_squares(&residuals);
    let mut damping = INITIAL_DAMPING;
    let mut converged = false;

    while n_evaluations < max_evaluations && !converged {
        let jacobian = numeric_jacobian(&mut residual_fn, &params, &residuals, &mut n_evaluations);
        let (jtj, gradient) = normal_equations(&jacobian, &residuals);

        let gradient_scale = GRADIENT_FLOOR * cost.max(1.0);
        if gradient.iter().all(|g| g.abs() <= gradient_scale) {
            converged = true;
            break;
        }

        let mut step_accepted = false;
        while n_evaluations < max_evaluations {
            let step = match solve_damped(&jtj, &gradient, damping) {
                Some(step) => step,
                None => {
                    damping *= DAMPING_INCREASE;
                    if damping > MAX_DAMPING {
                        break;
                    }
                    continue;
                }
            };

            let trial: Vec<f64> = params.iter().zip(&step).map(|(p, s)| p + s).collect();
            let trial_residuals = residual_fn(&trial);
            n_evaluations += 1;
            let trial_cost = if trial_residuals.iter().all(|value| value.is_finite()) {
                sum_of_squares(&trial_residuals)
            } else {
                f64::INFINITY
            };

            if trial_cost < cost {
                let improvement = (cost - trial_cost) / cost.max(f64::MIN_POSITIVE);
                let small_step = step
                    .iter()
                    .zip(&trial)
                    .all(|(s, p)| s.abs() <= options.tolerance * (p.abs() + options.tolerance));

                params = trial;
                residuals = trial_residuals;
                cost = trial_cost;
                damping = (damping * DAMPING_DECREASE).max(MIN_DAMPING);

                if improvement < options.tolerance || small_step || cost <= COST_FLOOR {
                    converged = true;
                }
                step_accepted = true;
                break;
            }

            damping *= DAMPING_INCREASE;
            if damping > MAX_DAMPING {
                break;
            }
        }

        if !step_accepted {
            break;
        }
    }

    let reduced_chi_square = cost / (m.saturating_sub(n)).max(1) as f64;

    let jacobian = numeric_jacobian(&mut residual_fn, &params, &residuals, &mut n_evaluations);
    let (jtj, _) = normal_equations(&jacobian, &residuals);
    let (covariance, standard_errors) = covariance_from_normal(&jtj, reduced_chi_square, n);

    Ok(LeastSquaresSolution {
        parameters: params,
        covariance,
        standard_errors,
        n_evaluations,
        n_residuals: m,
        reduced_chi_square,
        converged,
    })
}

fn sum_of_squares(values: &[f64]) -> f64 {
    values.iter().map(|value| value * value).sum()
}

/// Forward-difference Jacobian, one row per parameter. Non-finite entries are
/// zeroed so a single bad probe cannot poison the normal equations.
fn numeric_jacobian<F>(
    residual_fn: &mut F,
    params: &[f64],
    base: &[f64],
    n_evaluations: &mut usize,
) -> Vec<Vec<f64>>
where
    F: FnMut(&[f64]) -> Vec<f64>,
{
    let relative_step = f64::EPSILON.sqrt();
    let mut rows = Vec::with_capacity(params.len());

    for index in 0..params.len() {
        let step = relative_step * params[index].abs().max(1.0);
        let mut probe = params.to_vec();
        probe[index] += step;

        let shifted = residual_fn(&probe);
        *n_evaluations += 1;

        let row: Vec<f64> = shifted
            .iter()
            .zip(base)
            .map(|(after, before)| {
                let derivative = (after - before) / step;
                if derivative.is_finite() { derivative } else { 0.0 }
            })
            .collect();
        rows.push(row);
    }

    rows
}

/// `J^T J` and the gradient `J^T r` from row-major Jacobian storage.
fn normal_equations(jacobian: &[Vec<f64>], residuals: &[f64]) -> (DenseMatrix, Vec<f64>) {
    let n = jacobian.len();
    let mut jtj = DenseMatrix::zeros(n, n);
    let mut gradient = vec![0.0; n];

    for i in 0..n {
        for j in i..n {
            let mut sum = 0.0;
            for (a, b) in jacobian[i].iter().zip(&jacobian[j]) {
                sum += a * b;
            }
            jtj[(i, j)] = sum;
            jtj[(j, i)] = sum;
        }
        let mut g = 0.0;
        for (a, r) in jacobian[i].iter().zip(residuals) {
            g += a * r;
        }
        gradient[i] = g;
    }

    (jtj, gradient)
}

fn solve_damped(jtj: &DenseMatrix, gradient: &[f64], damping: f64) -> Option<Vec<f64>> {
    let n = gradient.len();
    let mut damped = jtj.clone();
    for i in 0..n {
        damped[(i, i)] += damping * (jtj[(i, i)] + DIAGONAL_FLOOR);
    }

    let negative_gradient: Vec<f64> = gradient.iter().map(|g| -g).collect();
    lu_factorize(&damped)
        .and_then(|factors| factors.solve(&negative_gradient))
        .ok()
}

fn covariance_from_normal(
    jtj: &DenseMatrix,
    reduced_chi_square: f64,
    n: usize,
) -> (DenseMatrix, Vec<f64>) {
    let inverse = lu_factorize(jtj).and_then(|factors| factors.invert());
    match inverse {
        Ok(mut covariance) => {
            for i in 0..n {
                for j in 0..n {
                    covariance[(i, j)] *= reduced_chi_square;
                }
            }
            let standard_errors = (0..n)
                .map(|i| covariance[(i, i)].max(0.0).sqrt())
                .collect();
            (covariance, standard_errors)
        }
        Err(_) => (DenseMatrix::zeros(n, n), vec![0.0; n]),
    }
}
