//! Forward Fourier transform of a k-space signal.
//!
//! The residual only needs the leading low-R bins of the transform of the
//! windowed chi(k): the signal is zero-padded to `nfft`, transformed, scaled
//! by `kstep / sqrt(pi)`, and the first `nfft / 2` complex bins are kept.

use num_complex::Complex64;
use realfft::{RealFftPlanner, RealToComplex};
use std::f64::consts::PI;
use std::sync::Arc;
use thiserror::Error;

pub const MIN_NFFT: usize = 16;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FourierError {
    #[error("fft length must be a power of two of at least {MIN_NFFT}, got {nfft}")]
    InvalidLength { nfft: usize },
    #[error("k step must be finite and positive, got {kstep}")]
    InvalidStep { kstep: f64 },
}

/// Planned forward transform with a fixed length and grid step.
#[derive(Clone)]
pub struct ForwardFft {
    nfft: usize,
    kstep: f64,
    plan: Arc<dyn RealToComplex<f64>>,
}

impl std::fmt::Debug for ForwardFft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForwardFft")
            .field("nfft", &self.nfft)
            .field("kstep", &self.kstep)
            .finish()
    }
}

impl ForwardFft {
    pub fn new(nfft: usize, kstep: f64) -> Result<Self, FourierError> {
        if !nfft.is_power_of_two() || nfft < MIN_NFFT {
            return Err(FourierError::InvalidLength { nfft });
        }
        if !kstep.is_finite() || kstep <= 0.0 {
            return Err(FourierError::InvalidStep { kstep });
        }

        let plan = RealFftPlanner::<f64>::new().plan_fft_forward(nfft);
        Ok(Self { nfft, kstep, plan })
    }

    pub fn nfft(&self) -> usize {
        self.nfft
    }

    /// Spacing of the conjugate (R-space) grid.
    pub fn rgrid(&self) -> f64 {
        PI / (self.kstep * self.nfft as f64)
    }

    /// Transform a real k-space signal into its first `nfft / 2` complex
    /// bins. Samples beyond the transform length are ignored; shorter
    /// signals are zero-padded.
    pub fn transform(&self, signal: &[f64]) -> Vec<Complex64> {
        let mut input = self.plan.make_input_vec();
        let copy_len = signal.len().min(self.nfft);
        input[..copy_len].copy_from_slice(&signal[..copy_len]);

        let mut output = self.plan.make_output_vec();
        self.plan
            .process(&mut input, &mut output)
            .expect("fft buffers are sized by the plan");

        let scale = self.kstep / PI.sqrt();
        output.truncate(self.nfft / 2);
        output.into_iter().map(|bin| bin * scale).collect()
    }
}

/// Flatten complex bins into an interleaved `[re, im, re, im, ...]` vector.
pub fn interleave_real_imag(bins: &[Complex64]) -> Vec<f64> {
    let mut flat = Vec::with_capacity(bins.len() * 2);
    for bin in bins {
        flat.push(bin.re);
        flat.push(bin.im);
    }
    flat
}
