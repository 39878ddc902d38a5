//! Cubic spline kernels for the background model.
//!
//! [`BSpline`] is the FITPACK-style representation `(knots, coefficients,
//! degree 3)` used for the fitted background: end knots carry full
//! multiplicity, interior knots sit on the interior seed abscissae, and the
//! coefficient vector has the same length as the knot vector with the
//! trailing entries unused by evaluation. [`CubicResampler`] is the
//! interpolating spline used to move chi from the raw k grid onto the uniform
//! output grid.

use super::linalg::{DenseMatrix, LinearSolveError, lu_factorize};
use crate::common::constants::SPLINE_DEGREE;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SplineError {
    #[error("spline fit requires at least {required} points, got {actual}")]
    TooFewPoints { required: usize, actual: usize },
    #[error("spline input length mismatch: x={x_len}, y={y_len}")]
    LengthMismatch { x_len: usize, y_len: usize },
    #[error(
        "spline abscissae must be strictly increasing, index {index} has {current} after {previous}"
    )]
    NonIncreasingAbscissae {
        index: usize,
        previous: f64,
        current: f64,
    },
    #[error("spline input must be finite at index {index}")]
    NonFinite { index: usize },
    #[error("spline interpolation system could not be solved: {0}")]
    DegenerateSystem(#[from] LinearSolveError),
}

/// Cubic B-spline with a FITPACK-style padded coefficient vector.
#[derive(Debug, Clone, PartialEq)]
pub struct BSpline {
    knots: Vec<f64>,
    coefs: Vec<f64>,
}

impl BSpline {
    /// Fit an interpolating cubic B-spline through `(x, y)`.
    ///
    /// This mirrors the zero-residual limit of a smoothing-spline fit: the
    /// curve passes through every point, end knots repeat `degree + 1` times
    /// and the interior knots are the interior data abscissae.
    pub fn interpolating(x: &[f64], y: &[f64]) -> Result<Self, SplineError> {
        let m = x.len();
        let required = SPLINE_DEGREE + 1;
        if m < required {
            return Err(SplineError::TooFewPoints {
                required,
                actual: m,
            });
        }
        if y.len() != m {
            return Err(SplineError::LengthMismatch {
                x_len: m,
                y_len: y.len(),
            });
        }
        validate_abscissae(x)?;
        for (index, value) in y.iter().enumerate() {
            if !value.is_finite() {
                return Err(SplineError::NonFinite { index });
            }
        }

        let knots = interpolation_knots(x);
        let n_basis = knots.len() - SPLINE_DEGREE - 1;

        let mut system = DenseMatrix::zeros(m, n_basis);
        for (row, &xi) in x.iter().enumerate() {
            let span = find_span(&knots, n_basis, xi);
            let values = basis_values(&knots, span, xi);
            for (offset, value) in values.iter().enumerate() {
                system[(row, span - SPLINE_DEGREE + offset)] = *value;
            }
        }

        let factors = lu_factorize(&system)?;
        let mut coefs = factors.solve(y)?;
        coefs.resize(knots.len(), 0.0);

        Ok(Self { knots, coefs })
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    pub fn coefs(&self) -> &[f64] {
        &self.coefs
    }

    /// Number of basis functions actually used by evaluation.
    pub fn n_basis(&self) -> usize {
        self.knots.len() - SPLINE_DEGREE - 1
    }

    /// Same knot vector with a replacement coefficient vector, padded or
    /// truncated to the knot-vector length.
    pub fn with_coefs(&self, mut coefs: Vec<f64>) -> Self {
        coefs.resize(self.knots.len(), 0.0);
        Self {
            knots: self.knots.clone(),
            coefs,
        }
    }

    /// De Boor evaluation; outside the knot span the boundary polynomial is
    /// extended, matching FITPACK's extrapolating evaluator.
    pub fn eval(&self, x: f64) -> f64 {
        let n_basis = self.n_basis();
        let span = find_span(&self.knots, n_basis, x);
        let values = basis_values(&self.knots, span, x);

        let mut sum = 0.0;
        for (offset, value) in values.iter().enumerate() {
            sum += self.coefs[span - SPLINE_DEGREE + offset] * value;
        }
        sum
    }

    pub fn eval_many(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.eval(x)).collect()
    }
}

/// Knot vector for cubic interpolation: `degree + 1` copies of each end
/// point, interior knots at `x[2..m-2]`.
fn interpolation_knots(x: &[f64]) -> Vec<f64> {
    let m = x.len();
    let mut knots = Vec::with_capacity(m + SPLINE_DEGREE + 1);
    for _ in 0..=SPLINE_DEGREE {
        knots.push(x[0]);
    }
    knots.extend_from_slice(&x[2..m - 2]);
    for _ in 0..=SPLINE_DEGREE {
        knots.push(x[m - 1]);
    }
    knots
}

/// Largest valid span index `l` with `knots[l] <= x`, clamped into
/// `[degree, n_basis - 1]` so out-of-range arguments reuse the boundary span.
fn find_span(knots: &[f64], n_basis: usize, x: f64) -> usize {
    let count = knots[SPLINE_DEGREE..n_basis].partition_point(|knot| *knot <= x);
    (SPLINE_DEGREE + count.saturating_sub(1)).min(n_basis - 1)
}

/// The `degree + 1` basis functions that are nonzero on `span`, evaluated at
/// `x` (triangular Cox-de Boor recurrence).
fn basis_values(knots: &[f64], span: usize, x: f64) -> [f64; SPLINE_DEGREE + 1] {
    let mut values = [0.0; SPLINE_DEGREE + 1];
    let mut left = [0.0; SPLINE_DEGREE + 1];
    let mut right = [0.0; SPLINE_DEGREE + 1];
    values[0] = 1.0;

    for j in 1..=SPLINE_DEGREE {
        left[j] = x - knots[span + 1 - j];
        right[j] = knots[span + j] - x;
        let mut saved = 0.0;
        for r in 0..j {
            let denominator = right[r + 1] + left[j - r];
            let term = values[r] / denominator;
            values[r] = saved + right[r + 1] * term;
            saved = left[j - r] * term;
        }
        values[j] = saved;
    }

    values
}

fn validate_abscissae(x: &[f64]) -> Result<(), SplineError> {
    for (index, value) in x.iter().enumerate() {
        if !value.is_finite() {
            return Err(SplineError::NonFinite { index });
        }
        if index > 0 && *value <= x[index - 1] {
            return Err(SplineError::NonIncreasingAbscissae {
                index,
                previous: x[index - 1],
                current: *value,
            });
        }
    }
    Ok(())
}

/// Interpolating natural cubic spline with a fixed abscissa and target grid;
/// only the ordinates change between calls, so validation happens once.
#[derive(Debug, Clone, PartialEq)]
pub struct CubicResampler {
    xs: Vec<f64>,
    targets: Vec<f64>,
}

impl CubicResampler {
    pub fn new(xs: &[f64], targets: &[f64]) -> Result<Self, SplineError> {
        if xs.len() < 2 {
            return Err(SplineError::TooFewPoints {
                required: 2,
                actual: xs.len(),
            });
        }
        validate_abscissae(xs)?;
        for (index, value) in targets.iter().enumerate() {
            if !value.is_finite() {
                return Err(SplineError::NonFinite { index });
            }
        }

        Ok(Self {
            xs: xs.to_vec(),
            targets: targets.to_vec(),
        })
    }

    pub fn targets(&self) -> &[f64] {
        &self.targets
    }

    /// Interpolate `ys` (one ordinate per abscissa) at every target point.
    /// Beyond the data range the boundary polynomial is extended.
    pub fn resample(&self, ys: &[f64]) -> Vec<f64> {
        debug_assert_eq!(ys.len(), self.xs.len());

        let second_derivatives = natural_second_derivatives(&self.xs, ys);
        self.targets
            .iter()
            .map(|&x| eval_cubic(&self.xs, ys, &second_derivatives, x))
            .collect()
    }
}

fn natural_second_derivatives(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let n = xs.len();
    let mut y2 = vec![0.0; n];
    let mut scratch = vec![0.0; n.saturating_sub(1)];

    for i in 1..n - 1 {
        let sig = (xs[i] - xs[i - 1]) / (xs[i + 1] - xs[i - 1]);
        let p = sig * y2[i - 1] + 2.0;
        y2[i] = (sig - 1.0) / p;
        let slope_right = (ys[i + 1] - ys[i]) / (xs[i + 1] - xs[i]);
        let slope_left = (ys[i] - ys[i - 1]) / (xs[i] - xs[i - 1]);
        scratch[i] = (6.0 * (slope_right - slope_left) / (xs[i + 1] - xs[i - 1])
            - sig * scratch[i - 1])
            / p;
    }

    for i in (1..n - 1).rev() {
        y2[i] = y2[i] * y2[i + 1] + scratch[i];
    }
    y2[0] = 0.0;
    y2[n - 1] = 0.0;
    y2
}

fn eval_cubic(xs: &[f64], ys: &[f64], y2: &[f64], x: f64) -> f64 {
    let n = xs.len();
    let upper = xs.partition_point(|value| *value < x).clamp(1, n - 1);
    let lower = upper - 1;

    let h = xs[upper] - xs[lower];
    let a = (xs[upper] - x) / h;
    let b = (x - xs[lower]) / h;

    a * ys[lower]
        + b * ys[upper]
        + ((a * a * a - a) * y2[lower] + (b * b * b - b) * y2[upper]) * h * h / 6.0
}
