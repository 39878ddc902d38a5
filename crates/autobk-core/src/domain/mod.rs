pub mod errors;

pub use errors::{AutobkError, AutobkErrorCategory, AutobkResult};

use serde::Serialize;

/// Minimum number of points a spectrum must carry before background removal
/// is meaningful (seed averaging reaches five points to each side).
pub const MIN_SPECTRUM_POINTS: usize = 8;

/// A measured absorption spectrum: strictly increasing energies (eV) with one
/// mu(E) sample per point.
///
/// Duplicate energies are dropped on construction, keeping the first
/// occurrence, so two inputs differing only by a repeated point produce the
/// same spectrum.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    energy: Vec<f64>,
    mu: Vec<f64>,
}

impl Spectrum {
    pub fn new(energy: Vec<f64>, mu: Vec<f64>) -> AutobkResult<Self> {
        if energy.len() != mu.len() {
            return Err(AutobkError::input_validation(
                "INPUT.SPECTRUM_SHAPE",
                format!(
                    "energy and mu must have equal lengths, got {} and {}",
                    energy.len(),
                    mu.len()
                ),
            ));
        }

        for (index, (e, m)) in energy.iter().zip(&mu).enumerate() {
            if !e.is_finite() || !m.is_finite() {
                return Err(AutobkError::input_validation(
                    "INPUT.SPECTRUM_FINITE",
                    format!("spectrum value at index {index} is not finite"),
                ));
            }
        }

        let mut deduped_energy = Vec::with_capacity(energy.len());
        let mut deduped_mu = Vec::with_capacity(mu.len());
        for (e, m) in energy.into_iter().zip(mu) {
            if deduped_energy.last() == Some(&e) {
                continue;
            }
            deduped_energy.push(e);
            deduped_mu.push(m);
        }

        if deduped_energy.len() < MIN_SPECTRUM_POINTS {
            return Err(AutobkError::input_validation(
                "INPUT.SPECTRUM_LENGTH",
                format!(
                    "spectrum needs at least {MIN_SPECTRUM_POINTS} distinct points, got {}",
                    deduped_energy.len()
                ),
            ));
        }

        for index in 1..deduped_energy.len() {
            if deduped_energy[index] <= deduped_energy[index - 1] {
                return Err(AutobkError::input_validation(
                    "INPUT.SPECTRUM_ORDER",
                    format!(
                        "energies must be strictly increasing, index {index} has {} after {}",
                        deduped_energy[index],
                        deduped_energy[index - 1]
                    ),
                ));
            }
        }

        Ok(Self {
            energy: deduped_energy,
            mu: deduped_mu,
        })
    }

    pub fn energy(&self) -> &[f64] {
        &self.energy
    }

    pub fn mu(&self) -> &[f64] {
        &self.mu
    }

    pub fn len(&self) -> usize {
        self.energy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.energy.is_empty()
    }
}

/// Edge energy and normalization step, either supplied by the caller or
/// resolved once by an [`crate::common::edge::EdgeResolver`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EdgeParameters {
    pub e0: f64,
    pub edge_step: f64,
}

impl EdgeParameters {
    pub fn new(e0: f64, edge_step: f64) -> AutobkResult<Self> {
        if !e0.is_finite() {
            return Err(AutobkError::input_validation(
                "INPUT.EDGE_PARAMS",
                format!("edge energy must be finite, got {e0}"),
            ));
        }
        if !edge_step.is_finite() || edge_step <= 0.0 {
            return Err(AutobkError::input_validation(
                "INPUT.EDGE_PARAMS",
                format!("edge step must be finite and positive, got {edge_step}"),
            ));
        }
        Ok(Self { e0, edge_step })
    }
}

/// Convergence and spline diagnostics for one background fit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitDiagnostics {
    pub n_evaluations: usize,
    pub reduced_chi_square: f64,
    pub converged: bool,
    /// Number of spline coefficients varied in the fit.
    pub n_coefficients: usize,
    pub kmin: f64,
    pub kmax: f64,
    /// Effective background separation radius after resolution flooring.
    pub rbkg: f64,
    pub knot_energies: Vec<f64>,
    pub knot_k: Vec<f64>,
    /// Converged coefficient values for the varied knots.
    pub knot_values: Vec<f64>,
    /// Seed coefficient values before the fit.
    pub initial_knot_values: Vec<f64>,
}

/// Immutable outcome of one background removal.
///
/// All arrays are freshly allocated for the invocation; the caller owns the
/// result and no shared state is mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackgroundResult {
    /// Fitted background over the full energy range; pre-edge points keep the
    /// original mu.
    pub background: Vec<f64>,
    /// `(mu - background) / edge_step` over the full energy range.
    pub chie: Vec<f64>,
    /// Uniform output k grid.
    pub k: Vec<f64>,
    /// Normalized chi(k) on the output grid.
    pub chi: Vec<f64>,
    /// Background and chi from the seed coefficients, before optimization.
    pub init_background: Vec<f64>,
    pub init_chi: Vec<f64>,
    pub edge: EdgeParameters,
    /// Pointwise uncertainty band on chi(k), when requested.
    pub delta_chi: Option<Vec<f64>>,
    /// Pointwise uncertainty band on the background, full energy range.
    pub delta_background: Option<Vec<f64>>,
    pub diagnostics: FitDiagnostics,
}
