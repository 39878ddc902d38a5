//! Spline background model and the Fourier-domain residual.

use crate::numerics::fourier::{ForwardFft, interleave_real_imag};
use crate::numerics::spline::{BSpline, CubicResampler};

/// The empirical weight tying the clamp penalty to the quality of the base
/// residual; kept exactly as in the reference algorithm.
const CLAMP_RESIDUAL_WEIGHT: f64 = 100.0;

/// Everything the residual needs, fixed for the duration of one fit.
#[derive(Debug, Clone)]
pub(crate) struct FitWorkspace {
    /// Raw k grid truncated to the fit range, one point per mu sample.
    pub kraw: Vec<f64>,
    /// mu samples matching `kraw`.
    pub mu: Vec<f64>,
    /// Apodization window times k^kweight on the output grid.
    pub ftwin: Vec<f64>,
    /// k^kweight on the output grid, for the clamp terms.
    pub kout_weighted: Vec<f64>,
    /// Reference chi resampled onto the output grid, for differential fits.
    pub chi_std: Option<Vec<f64>>,
    /// Knot vector shared by every candidate coefficient vector.
    pub spline: BSpline,
    /// chi resampling from `kraw` onto the output grid.
    pub resampler: CubicResampler,
    pub fft: ForwardFft,
    /// Number of low-R bins kept from the transform.
    pub irbkg: usize,
    pub nclamp: usize,
    pub clamp_lo: f64,
    pub clamp_hi: f64,
}

impl FitWorkspace {
    /// Background on the raw grid and chi on the output grid for one
    /// coefficient vector.
    pub fn spline_eval(&self, coefs: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let model = self.spline.with_coefs(coefs.to_vec());
        let bkg = model.eval_many(&self.kraw);

        let difference: Vec<f64> = self
            .mu
            .iter()
            .zip(&bkg)
            .map(|(mu, bkg)| mu - bkg)
            .collect();
        let chi = self.resampler.resample(&difference);
        (bkg, chi)
    }

    /// Residual vector: interleaved low-R transform bins, then the boundary
    /// clamp samples when `nclamp > 0`.
    pub fn residual(&self, coefs: &[f64]) -> Vec<f64> {
        let (_, mut chi) = self.spline_eval(coefs);
        if let Some(chi_std) = &self.chi_std {
            for (value, reference) in chi.iter_mut().zip(chi_std) {
                *value -= reference;
            }
        }

        let windowed: Vec<f64> = chi
            .iter()
            .zip(&self.ftwin)
            .map(|(chi, win)| chi * win)
            .collect();
        let bins = self.fft.transform(&windowed);
        let mut out = interleave_real_imag(&bins[..self.irbkg.min(bins.len())]);

        if self.nclamp == 0 {
            return out;
        }

        let base_sum_sq: f64 = out.iter().map(|value| value * value).sum();
        let scale =
            (1.0 + CLAMP_RESIDUAL_WEIGHT * base_sum_sq) / (out.len() * self.nclamp) as f64;

        let scaled: Vec<f64> = chi
            .iter()
            .zip(&self.kout_weighted)
            .map(|(chi, weight)| scale * chi * weight)
            .collect();

        let nclamp = self.nclamp.min(scaled.len());
        let lo_weight = self.clamp_lo.abs();
        let hi_weight = self.clamp_hi.abs();
        out.extend(scaled[..nclamp].iter().map(|value| lo_weight * value));
        out.extend(
            scaled[scaled.len() - nclamp..]
                .iter()
                .map(|value| hi_weight * value),
        );
        out
    }

    /// Residual length for this workspace, fixed across coefficient vectors.
    pub fn residual_len(&self) -> usize {
        let clamp_terms = if self.nclamp == 0 {
            0
        } else {
            2 * self.nclamp.min(self.resampler.targets().len())
        };
        2 * self.irbkg + clamp_terms
    }
}
