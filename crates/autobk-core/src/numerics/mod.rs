pub mod fourier;
pub mod linalg;
pub mod solver;
pub mod spline;
pub mod window;

pub use fourier::{ForwardFft, FourierError, interleave_real_imag};
pub use linalg::{DenseMatrix, LinearSolveError, LuFactors, lu_factorize};
pub use solver::{LeastSquaresSolution, SolverError, SolverOptions, minimize};
pub use spline::{BSpline, CubicResampler, SplineError};
pub use window::{WindowKind, ft_window};

use crate::common::constants::ETOK;

/// Signed k value for an energy offset from the edge: negative below the
/// edge, `sqrt(ETOK * (E - e0))` above it.
pub fn k_from_energy(energy_offset: f64) -> f64 {
    let k = (ETOK * energy_offset.abs()).sqrt();
    if energy_offset < 0.0 { -k } else { k }
}

/// Largest index whose value does not exceed `target`; `None` when every
/// value is above it. `values` must be sorted ascending.
pub fn index_below(values: &[f64], target: f64) -> Option<usize> {
    let count = values.partition_point(|value| *value <= target);
    count.checked_sub(1)
}

/// Index of the value closest to `target`, earliest on ties.
pub fn index_nearest(values: &[f64], target: f64) -> Option<usize> {
    if values.is_empty() {
        return None;
    }
    let mut best_index = 0;
    let mut best_distance = f64::INFINITY;
    for (index, value) in values.iter().enumerate() {
        let distance = (value - target).abs();
        if distance < best_distance {
            best_distance = distance;
            best_index = index;
        }
    }
    Some(best_index)
}

/// Linear interpolation of `(x_grid, y_grid)` at `x`, clamped to the end
/// values outside the grid. Returns `None` for unusable grids.
pub fn interpolate_linear(x: f64, x_grid: &[f64], y_grid: &[f64]) -> Option<f64> {
    if x_grid.len() < 2 || x_grid.len() != y_grid.len() {
        return None;
    }

    if !x_grid.windows(2).all(|window| window[0] <= window[1]) {
        return None;
    }

    if x <= x_grid[0] {
        return Some(y_grid[0]);
    }
    let last = x_grid.len() - 1;
    if x >= x_grid[last] {
        return Some(y_grid[last]);
    }

    let upper = x_grid
        .windows(2)
        .position(|window| x <= window[1])
        .map(|index| index + 1)?;
    let lower = upper - 1;
    let x0 = x_grid[lower];
    let x1 = x_grid[upper];
    if x1 == x0 {
        return Some(y_grid[upper]);
    }

    let fraction = (x - x0) / (x1 - x0);
    Some(y_grid[lower] + fraction * (y_grid[upper] - y_grid[lower]))
}

/// Uniform grid `0, step, 2*step, ...` with `count` points.
pub fn uniform_grid(step: f64, count: usize) -> Vec<f64> {
    (0..count).map(|index| step * index as f64).collect()
}

#[cfg(test)]
mod tests {
    use super::{index_below, index_nearest, interpolate_linear, k_from_energy, uniform_grid};
    use crate::common::constants::KTOE;

    #[test]
    fn k_conversion_is_signed_and_invertible() {
        let k = k_from_energy(25.0 * KTOE);
        assert!((k - 5.0).abs() < 1.0e-12);
        assert!((k_from_energy(-25.0 * KTOE) + 5.0).abs() < 1.0e-12);
        assert_eq!(k_from_energy(0.0), 0.0);
    }

    #[test]
    fn index_below_matches_last_not_greater() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(index_below(&values, 2.5), Some(1));
        assert_eq!(index_below(&values, 2.0), Some(1));
        assert_eq!(index_below(&values, 9.0), Some(3));
        assert_eq!(index_below(&values, 0.5), None);
    }

    #[test]
    fn index_nearest_prefers_earliest_on_ties() {
        let values = [0.0, 1.0, 2.0, 3.0];
        assert_eq!(index_nearest(&values, 1.4), Some(1));
        assert_eq!(index_nearest(&values, 1.5), Some(1));
        assert_eq!(index_nearest(&values, -4.0), Some(0));
        assert_eq!(index_nearest(&[], 1.0), None);
    }

    #[test]
    fn linear_interpolation_clamps_outside_the_grid() {
        let x = [0.0, 1.0, 2.0];
        let y = [10.0, 20.0, 40.0];
        assert_eq!(interpolate_linear(-1.0, &x, &y), Some(10.0));
        assert_eq!(interpolate_linear(3.0, &x, &y), Some(40.0));
        assert_eq!(interpolate_linear(1.5, &x, &y), Some(30.0));
        assert_eq!(interpolate_linear(0.5, &[0.0], &[1.0]), None);
    }

    #[test]
    fn uniform_grid_starts_at_zero() {
        assert_eq!(uniform_grid(0.05, 3), vec![0.0, 0.05, 0.1]);
        assert!(uniform_grid(0.05, 0).is_empty());
    }
}
