//! Apodization windows for the Fourier-domain residual.
//!
//! A window is built from four breakpoints on the uniform k grid: a ramp from
//! `xmin - dx/2` up to `xmin + dx/2`, a plateau, and a ramp down from
//! `xmax - dx/2` to `xmax + dx/2`, with the breakpoints snapped to grid
//! indices. The gaussian form ignores the plateau and spans the full range.

use std::f64::consts::{FRAC_PI_2, PI};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WindowError {
    #[error("unknown window function '{0}'")]
    UnknownWindow(String),
    #[error("window grid must contain at least 2 points, got {0}")]
    InsufficientPoints(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowKind {
    Hanning,
    Parzen,
    Welch,
    Sine,
    Gaussian,
}

impl WindowKind {
    /// Case-insensitive lookup; three-letter prefixes are accepted.
    pub fn from_name(name: &str) -> Result<Self, WindowError> {
        let normalized = name.trim().to_ascii_lowercase();
        let prefix: String = normalized.chars().take(3).collect();
        match prefix.as_str() {
            "han" => Ok(Self::Hanning),
            "par" => Ok(Self::Parzen),
            "wel" => Ok(Self::Welch),
            "sin" => Ok(Self::Sine),
            "gau" => Ok(Self::Gaussian),
            _ => Err(WindowError::UnknownWindow(name.to_string())),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hanning => "hanning",
            Self::Parzen => "parzen",
            Self::Welch => "welch",
            Self::Sine => "sine",
            Self::Gaussian => "gaussian",
        }
    }
}

/// Window weights over `[xmin, xmax]` with roll-off width `dx`, evaluated on
/// the uniform ascending grid `x`.
pub fn ft_window(
    x: &[f64],
    xmin: f64,
    xmax: f64,
    dx: f64,
    kind: WindowKind,
) -> Result<Vec<f64>, WindowError> {
    let npts = x.len();
    if npts < 2 {
        return Err(WindowError::InsufficientPoints(npts));
    }

    let xstep = (x[npts - 1] - x[0]) / (npts - 1) as f64;
    let xeps = 1.0e-4 * xstep;
    let dx = dx.max(0.0);

    let x1 = x[0].max(xmin - dx / 2.0);
    let x2 = xmin + dx / 2.0 + xeps;
    let x3 = xmax - dx / 2.0 - xeps;
    let x4 = x[npts - 1].min(xmax + dx / 2.0);

    let snap = |value: f64| -> usize {
        let index = ((value - x[0] + xeps) / xstep).floor() as isize;
        index.clamp(0, (npts - 1) as isize) as usize
    };
    let mut i1 = snap(x1);
    let i2 = snap(x2);
    let mut i3 = snap(x3);
    let i4 = snap(x4);
    if i2 == i1 && i1 > 0 {
        i1 -= 1;
    }
    if i4 == i3 && i3 > 0 {
        i3 -= 1;
    }

    let wx1 = x[i1];
    let mut wx2 = x[i2];
    let wx3 = x[i3];
    let mut wx4 = x[i4];
    if wx1 == wx2 {
        wx2 += xeps;
    }
    if wx3 == wx4 {
        wx4 += xeps;
    }
    if wx1 == wx4 {
        wx4 += xeps;
    }

    let mut window = vec![0.0; npts];
    if i3 > i2 {
        for weight in &mut window[i2..i3] {
            *weight = 1.0;
        }
    }

    match kind {
        WindowKind::Hanning => {
            for i in i1..=i2 {
                let t = (x[i] - wx1) / (wx2 - wx1);
                window[i] = (FRAC_PI_2 * t).sin().powi(2);
            }
            for i in i3..=i4 {
                let t = (x[i] - wx3) / (wx4 - wx3);
                window[i] = (FRAC_PI_2 * t).cos().powi(2);
            }
        }
        WindowKind::Parzen => {
            for i in i1..=i2 {
                window[i] = (x[i] - wx1) / (wx2 - wx1);
            }
            for i in i3..=i4 {
                window[i] = 1.0 - (x[i] - wx3) / (wx4 - wx3);
            }
        }
        WindowKind::Welch => {
            for i in i1..=i2 {
                let t = (x[i] - wx2) / (wx2 - wx1);
                window[i] = 1.0 - t * t;
            }
            for i in i3..=i4 {
                let t = (x[i] - wx3) / (wx4 - wx3);
                window[i] = 1.0 - t * t;
            }
        }
        WindowKind::Sine => {
            for i in i1..=i4 {
                window[i] = (PI * (wx4 - x[i]) / (wx4 - wx1)).sin();
            }
        }
        WindowKind::Gaussian => {
            let center = (wx4 + wx1) / 2.0;
            let width = ((wx4 - wx1) / 2.0).abs().max(xeps);
            for (weight, &xi) in window.iter_mut().zip(x) {
                let t = (xi - center) / width;
                *weight = (-0.5 * t * t).exp();
            }
        }
    }

    Ok(window)
}

#[cfg(test)]
mod tests {
    use super::{WindowError, WindowKind, ft_window};

    fn k_grid() -> Vec<f64> {
        (0..401).map(|i| 0.05 * i as f64).collect()
    }

    #[test]
    fn names_resolve_case_insensitively_with_prefixes() {
        assert_eq!(WindowKind::from_name("hanning"), Ok(WindowKind::Hanning));
        assert_eq!(WindowKind::from_name("HAN"), Ok(WindowKind::Hanning));
        assert_eq!(WindowKind::from_name("parzen"), Ok(WindowKind::Parzen));
        assert_eq!(WindowKind::from_name("welch"), Ok(WindowKind::Welch));
        assert_eq!(WindowKind::from_name("sine"), Ok(WindowKind::Sine));
        assert_eq!(WindowKind::from_name("gauss"), Ok(WindowKind::Gaussian));
        assert_eq!(
            WindowKind::from_name("boxcar"),
            Err(WindowError::UnknownWindow("boxcar".to_string()))
        );
    }

    #[test]
    fn hanning_has_unit_plateau_and_zero_tails() {
        let x = k_grid();
        let window = ft_window(&x, 3.0, 14.0, 2.0, WindowKind::Hanning).expect("window");

        // Plateau well inside [xmin + dx/2, xmax - dx/2].
        let mid = x.iter().position(|&k| k >= 8.0).expect("mid index");
        assert!((window[mid] - 1.0).abs() < 1.0e-12);

        // Zero well outside [xmin - dx/2, xmax + dx/2].
        assert_eq!(window[10], 0.0); // k = 0.5
        assert_eq!(window[340], 0.0); // k = 17.0
        assert!(window.iter().all(|w| (-1.0e-12..=1.0 + 1.0e-12).contains(w)));
    }

    #[test]
    fn hanning_ramp_rises_monotonically() {
        let x = k_grid();
        let window = ft_window(&x, 3.0, 14.0, 2.0, WindowKind::Hanning).expect("window");

        let ramp_start = x.iter().position(|&k| k >= 2.0).expect("ramp start");
        let ramp_end = x.iter().position(|&k| k >= 4.0).expect("ramp end");
        for i in ramp_start..ramp_end {
            assert!(
                window[i + 1] >= window[i] - 1.0e-12,
                "window not monotone at index {i}"
            );
        }
    }

    #[test]
    fn parzen_ramp_is_linear_at_midpoint() {
        let x = k_grid();
        let window = ft_window(&x, 3.0, 14.0, 2.0, WindowKind::Parzen).expect("window");
        let ramp_mid = x.iter().position(|&k| k >= 3.0).expect("ramp midpoint");
        assert!(
            (window[ramp_mid] - 0.5).abs() < 0.05,
            "parzen midpoint was {}",
            window[ramp_mid]
        );
    }

    #[test]
    fn sine_window_vanishes_at_the_upper_break() {
        let x = k_grid();
        let window = ft_window(&x, 3.0, 14.0, 2.0, WindowKind::Sine).expect("window");
        let upper = x.iter().position(|&k| k >= 15.0).expect("upper break");
        assert!(window[upper].abs() < 0.05);
    }

    #[test]
    fn gaussian_peaks_at_the_window_center() {
        let x = k_grid();
        let window = ft_window(&x, 3.0, 14.0, 2.0, WindowKind::Gaussian).expect("window");
        let center = x.iter().position(|&k| k >= 8.5).expect("center index");
        assert!((window[center] - 1.0).abs() < 0.01);
        assert!(window[0] < window[center]);
    }

    #[test]
    fn zero_rolloff_still_produces_a_window() {
        let x = k_grid();
        let window = ft_window(&x, 2.0, 12.0, 0.0, WindowKind::Hanning).expect("window");
        let mid = x.iter().position(|&k| k >= 7.0).expect("mid index");
        assert!((window[mid] - 1.0).abs() < 1.0e-12);
        assert_eq!(window[0], 0.0);
    }

    #[test]
    fn too_short_grids_are_rejected() {
        assert_eq!(
            ft_window(&[0.0], 0.0, 1.0, 0.1, WindowKind::Hanning),
            Err(WindowError::InsufficientPoints(1))
        );
    }
}
