//! Behavior of the propagated uncertainty bands under varying noise.

use autobk_core::common::constants::ETOK;
use autobk_core::{BackgroundConfig, BackgroundResult, Spectrum, remove_background};

const E0: f64 = 8979.0;
const EDGE_STEP: f64 = 1.0;

/// Deterministic pseudo-noise so runs are reproducible.
fn noise(index: usize, amplitude: f64) -> f64 {
    amplitude * (12.9898 * index as f64 + 78.233).sin()
}

fn noisy_spectrum(noise_amplitude: f64) -> Spectrum {
    let energy: Vec<f64> = (0..1200).map(|i| E0 - 50.0 + 0.5 * i as f64).collect();
    let mu: Vec<f64> = energy
        .iter()
        .enumerate()
        .map(|(i, &e)| {
            let base = if e < E0 {
                0.2 + 2.0e-5 * (e - E0)
            } else {
                let k = (ETOK * (e - E0)).sqrt();
                0.2 + EDGE_STEP - 1.5e-2 * k + 0.3 * (5.0 * k).sin() * (-0.02 * k * k).exp()
            };
            base + noise(i, noise_amplitude)
        })
        .collect();
    Spectrum::new(energy, mu).expect("synthetic spectrum")
}

fn fit(noise_amplitude: f64) -> BackgroundResult {
    let config = BackgroundConfig {
        e0: Some(E0),
        edge_step: Some(EDGE_STEP),
        calc_uncertainties: true,
        ..BackgroundConfig::default()
    };
    remove_background(&noisy_spectrum(noise_amplitude), &config).expect("fit should run")
}

fn max_band(band: &[f64]) -> f64 {
    band.iter().copied().fold(0.0, f64::max)
}

#[test]
fn bands_are_present_finite_and_non_negative() {
    let result = fit(0.01);
    let delta_chi = result.delta_chi.as_ref().expect("chi band requested");
    let delta_bkg = result
        .delta_background
        .as_ref()
        .expect("background band requested");

    assert_eq!(delta_chi.len(), result.chi.len());
    assert_eq!(delta_bkg.len(), result.background.len());
    assert!(delta_chi.iter().all(|v| v.is_finite() && *v >= 0.0));
    assert!(delta_bkg.iter().all(|v| v.is_finite() && *v >= 0.0));
    assert!(max_band(delta_chi) > 0.0, "noisy fit must have nonzero band");
}

#[test]
fn pre_edge_background_band_is_zero() {
    let result = fit(0.01);
    let spectrum = noisy_spectrum(0.01);
    let delta_bkg = result.delta_background.as_ref().expect("band requested");

    for (energy, delta) in spectrum.energy().iter().zip(delta_bkg) {
        if *energy < E0 - 1.0 {
            assert_eq!(*delta, 0.0, "pre-edge band at {energy} must stay zero");
        }
    }
}

#[test]
fn bands_shrink_as_noise_vanishes() {
    let loud = fit(0.05);
    let quiet = fit(0.01);
    let silent = fit(0.0);

    let loud_band = max_band(loud.delta_chi.as_ref().expect("band"));
    let quiet_band = max_band(quiet.delta_chi.as_ref().expect("band"));
    let silent_band = max_band(silent.delta_chi.as_ref().expect("band"));

    assert!(
        loud_band > quiet_band,
        "five-fold noise should widen the band ({loud_band} vs {quiet_band})"
    );
    assert!(
        silent_band < quiet_band,
        "noiseless band {silent_band} should fall below the noisy {quiet_band}"
    );
    assert!(
        silent_band < loud_band / 2.0,
        "noiseless band {silent_band} should be far below the loud {loud_band}"
    );
}

#[test]
fn bands_can_be_switched_off() {
    let config = BackgroundConfig {
        e0: Some(E0),
        edge_step: Some(EDGE_STEP),
        calc_uncertainties: false,
        ..BackgroundConfig::default()
    };
    let result = remove_background(&noisy_spectrum(0.01), &config).expect("fit should run");
    assert!(result.delta_chi.is_none());
    assert!(result.delta_background.is_none());
}
