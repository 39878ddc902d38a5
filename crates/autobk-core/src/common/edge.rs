//! Edge-energy and edge-step resolution for spectra that do not carry them.
//!
//! The background fit only needs two scalars from pre-edge analysis: the edge
//! energy `e0` and the normalization jump `edge_step`. Callers that already
//! know them pass them through the configuration; otherwise an
//! [`EdgeResolver`] supplies them once before the fit.

use crate::domain::{AutobkError, AutobkResult, EdgeParameters, Spectrum};

/// Pre-edge fitting stops this far below the resolved edge energy (eV).
const PRE_EDGE_MARGIN_EV: f64 = 50.0;
/// Post-edge fitting starts this far above the resolved edge energy (eV).
const NORM_MARGIN_EV: f64 = 100.0;

/// Collaborator that supplies `(e0, edge_step)` when the caller does not.
pub trait EdgeResolver {
    fn resolve(&self, spectrum: &Spectrum) -> AutobkResult<EdgeParameters>;
}

/// Default resolver: `e0` at the maximum of the three-point-smoothed
/// derivative of mu(E); `edge_step` as the gap at `e0` between a pre-edge and
/// a post-edge line fit.
#[derive(Debug, Clone, Copy, Default)]
pub struct DerivativeEdgeResolver;

impl EdgeResolver for DerivativeEdgeResolver {
    fn resolve(&self, spectrum: &Spectrum) -> AutobkResult<EdgeParameters> {
        let energy = spectrum.energy();
        let mu = spectrum.mu();

        let e0 = energy[edge_index(energy, mu)];

        let pre = region_line(energy, mu, |e| e <= e0 - PRE_EDGE_MARGIN_EV)
            .or_else(|| leading_line(energy, mu, 5));
        let post = region_line(energy, mu, |e| e >= e0 + NORM_MARGIN_EV)
            .or_else(|| trailing_line(energy, mu, 5));

        let (Some(pre), Some(post)) = (pre, post) else {
            return Err(AutobkError::input_validation(
                "INPUT.EDGE_PARAMS",
                "could not fit pre-edge and post-edge trends to estimate edge_step",
            ));
        };

        let edge_step = post.value_at(e0) - pre.value_at(e0);
        if !edge_step.is_finite() || edge_step <= 0.0 {
            return Err(AutobkError::input_validation(
                "INPUT.EDGE_PARAMS",
                format!("estimated edge step {edge_step} is not positive; supply edge_step explicitly"),
            ));
        }

        EdgeParameters::new(e0, edge_step)
    }
}

/// Index of the steepest smoothed rise of mu(E).
fn edge_index(energy: &[f64], mu: &[f64]) -> usize {
    let n = energy.len();
    let mut derivative = vec![0.0; n];
    for i in 1..n - 1 {
        derivative[i] = (mu[i + 1] - mu[i - 1]) / (energy[i + 1] - energy[i - 1]);
    }
    derivative[0] = derivative[1];
    derivative[n - 1] = derivative[n - 2];

    let mut best_index = 0;
    let mut best_value = f64::NEG_INFINITY;
    for i in 1..n - 1 {
        let smoothed = (derivative[i - 1] + derivative[i] + derivative[i + 1]) / 3.0;
        if smoothed > best_value {
            best_value = smoothed;
            best_index = i;
        }
    }
    best_index
}

#[derive(Debug, Clone, Copy)]
struct Line {
    slope: f64,
    intercept: f64,
}

impl Line {
    fn value_at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

fn region_line(energy: &[f64], mu: &[f64], keep: impl Fn(f64) -> bool) -> Option<Line> {
    let points: Vec<(f64, f64)> = energy
        .iter()
        .zip(mu)
        .filter(|(e, _)| keep(**e))
        .map(|(e, m)| (*e, *m))
        .collect();
    linear_fit(&points)
}

fn leading_line(energy: &[f64], mu: &[f64], count: usize) -> Option<Line> {
    let count = count.min(energy.len());
    let points: Vec<(f64, f64)> = energy[..count]
        .iter()
        .zip(&mu[..count])
        .map(|(e, m)| (*e, *m))
        .collect();
    linear_fit(&points)
}

fn trailing_line(energy: &[f64], mu: &[f64], count: usize) -> Option<Line> {
    let start = energy.len().saturating_sub(count.min(energy.len()));
    let points: Vec<(f64, f64)> = energy[start..]
        .iter()
        .zip(&mu[start..])
        .map(|(e, m)| (*e, *m))
        .collect();
    linear_fit(&points)
}

fn linear_fit(points: &[(f64, f64)]) -> Option<Line> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let sum_x: f64 = points.iter().map(|(x, _)| x).sum();
    let sum_y: f64 = points.iter().map(|(_, y)| y).sum();
    let mean_x = sum_x / n;
    let mean_y = sum_y / n;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (x, y) in points {
        sxx += (x - mean_x) * (x - mean_x);
        sxy += (x - mean_x) * (y - mean_y);
    }
    if sxx == 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    Some(Line {
        slope,
        intercept: mean_y - slope * mean_x,
    })
}

#[cfg(test)]
mod tests {
    use super::{DerivativeEdgeResolver, EdgeResolver};
    use crate::domain::Spectrum;

    fn step_spectrum(e0: f64, step: f64) -> Spectrum {
        let energy: Vec<f64> = (0..600).map(|i| e0 - 150.0 + i as f64).collect();
        let mu: Vec<f64> = energy
            .iter()
            .map(|&e| {
                let x = (e - e0) / 2.0;
                0.01 + step * 0.5 * (1.0 + (x / (1.0 + x.abs() / 4.0)).tanh())
            })
            .collect();
        Spectrum::new(energy, mu).expect("synthetic spectrum")
    }

    #[test]
    fn resolver_locates_edge_near_inflection() {
        let spectrum = step_spectrum(8979.0, 1.0);
        let edge = DerivativeEdgeResolver
            .resolve(&spectrum)
            .expect("edge should resolve");
        assert!(
            (edge.e0 - 8979.0).abs() < 5.0,
            "e0 was {}, expected near 8979",
            edge.e0
        );
    }

    #[test]
    fn resolver_recovers_step_height() {
        let spectrum = step_spectrum(8979.0, 1.6);
        let edge = DerivativeEdgeResolver
            .resolve(&spectrum)
            .expect("edge should resolve");
        assert!(
            (edge.edge_step - 1.6).abs() < 0.3,
            "edge_step was {}, expected near 1.6",
            edge.edge_step
        );
    }

    #[test]
    fn resolver_rejects_flat_spectrum() {
        let energy: Vec<f64> = (0..100).map(|i| 7000.0 + i as f64).collect();
        let mu = vec![0.5; 100];
        let spectrum = Spectrum::new(energy, mu).expect("flat spectrum");
        let error = DerivativeEdgeResolver
            .resolve(&spectrum)
            .expect_err("flat spectrum has no edge");
        assert_eq!(error.code(), "INPUT.EDGE_PARAMS");
    }
}
