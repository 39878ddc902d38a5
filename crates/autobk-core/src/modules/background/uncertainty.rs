//! Finite-difference propagation of the fit covariance into pointwise
//! uncertainty bands on chi(k) and the background.

use super::model::FitWorkspace;
use crate::numerics::solver::LeastSquaresSolution;
use rayon::prelude::*;
use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::function::erf::erf;

pub(crate) struct UncertaintyBands {
    pub delta_chi: Vec<f64>,
    /// Band over the truncated fit range; the caller re-embeds it into the
    /// full energy range.
    pub delta_bkg: Vec<f64>,
}

/// Sensitivity of chi and bkg to each varied coefficient, via central
/// differences at half the reported standard error, combined with the
/// covariance in the standard quadratic form and scaled to the requested
/// confidence level.
pub(crate) fn propagate(
    workspace: &FitWorkspace,
    solution: &LeastSquaresSolution,
    coefs: &[f64],
    err_sigma: f64,
) -> UncertaintyBands {
    let n_vary = solution.parameters.len();
    let n_chi = workspace.resampler.targets().len();
    let n_mue = workspace.kraw.len();
    let reduced_chi_square = solution.reduced_chi_square;

    if n_vary == 0 || reduced_chi_square <= 0.0 || !reduced_chi_square.is_finite() {
        return UncertaintyBands {
            delta_chi: vec![0.0; n_chi],
            delta_bkg: vec![0.0; n_mue],
        };
    }

    // Each coefficient's perturbation pair is independent, so the Jacobian
    // rows can be computed in parallel; accumulation below is ordered.
    let rows: Vec<(Vec<f64>, Vec<f64>)> = (0..n_vary)
        .into_par_iter()
        .map(|index| {
            let half_error = solution.standard_errors[index] / 2.0;
            if half_error <= 0.0 || !half_error.is_finite() {
                return (vec![0.0; n_chi], vec![0.0; n_mue]);
            }

            let mut probe = coefs.to_vec();
            probe[index] = coefs[index] + half_error;
            let (bkg_up, chi_up) = workspace.spline_eval(&probe);

            probe[index] = coefs[index] - half_error;
            let (bkg_down, chi_down) = workspace.spline_eval(&probe);

            let chi_row: Vec<f64> = chi_up
                .iter()
                .zip(&chi_down)
                .map(|(up, down)| (up - down) / (2.0 * half_error))
                .collect();
            let bkg_row: Vec<f64> = bkg_up
                .iter()
                .zip(&bkg_down)
                .map(|(up, down)| (up - down) / (2.0 * half_error))
                .collect();
            (chi_row, bkg_row)
        })
        .collect();

    // covariance / redchi, then the quadratic form, then the redchi factor
    // restored under the square root.
    let mut chi_variance = vec![0.0; n_chi];
    let mut bkg_variance = vec![0.0; n_mue];
    for i in 0..n_vary {
        for j in 0..n_vary {
            let covar = solution.covariance[(i, j)] / reduced_chi_square;
            if covar == 0.0 {
                continue;
            }
            for (variance, (a, b)) in chi_variance
                .iter_mut()
                .zip(rows[i].0.iter().zip(&rows[j].0))
            {
                *variance += a * b * covar;
            }
            for (variance, (a, b)) in bkg_variance
                .iter_mut()
                .zip(rows[i].1.iter().zip(&rows[j].1))
            {
                *variance += a * b * covar;
            }
        }
    }

    let probability = 0.5 * (1.0 + erf(err_sigma / std::f64::consts::SQRT_2));
    let chi_quantile = student_t_quantile(probability, n_chi.saturating_sub(n_vary).max(1) as f64);
    let bkg_quantile = student_t_quantile(probability, n_mue.saturating_sub(n_vary).max(1) as f64);

    let delta_chi = chi_variance
        .iter()
        .map(|variance| chi_quantile * (variance.max(0.0) * reduced_chi_square).sqrt())
        .collect();
    let delta_bkg = bkg_variance
        .iter()
        .map(|variance| bkg_quantile * (variance.max(0.0) * reduced_chi_square).sqrt())
        .collect();

    UncertaintyBands {
        delta_chi,
        delta_bkg,
    }
}

fn student_t_quantile(probability: f64, degrees_of_freedom: f64) -> f64 {
    StudentsT::new(0.0, 1.0, degrees_of_freedom)
        .map(|distribution| distribution.inverse_cdf(probability))
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::student_t_quantile;
    use statrs::function::erf::erf;

    #[test]
    fn one_sigma_probability_matches_the_normal_convention() {
        let probability = 0.5 * (1.0 + erf(1.0 / std::f64::consts::SQRT_2));
        assert!((probability - 0.841_344_746_068_543).abs() < 1.0e-12);
    }

    #[test]
    fn t_quantile_approaches_the_normal_quantile_for_large_dof() {
        let probability = 0.5 * (1.0 + erf(1.0 / std::f64::consts::SQRT_2));
        let quantile = student_t_quantile(probability, 1.0e6);
        assert!(
            (quantile - 1.0).abs() < 1.0e-2,
            "large-dof quantile was {quantile}"
        );
    }

    #[test]
    fn t_quantile_widens_for_small_dof() {
        let probability = 0.5 * (1.0 + erf(1.0 / std::f64::consts::SQRT_2));
        assert!(student_t_quantile(probability, 3.0) > student_t_quantile(probability, 30.0));
    }

    #[test]
    fn invalid_dof_produces_a_zero_quantile() {
        assert_eq!(student_t_quantile(0.8, 0.0), 0.0);
    }
}
