//! AUTOBK-style background removal: a spline background constrained in
//! Fourier space below a separation radius, with optional uncertainty bands.

mod config;
mod model;
mod uncertainty;

pub use config::BackgroundConfig;

use crate::common::constants::KTOE;
use crate::common::edge::{DerivativeEdgeResolver, EdgeResolver};
use crate::domain::{
    AutobkError, AutobkResult, BackgroundResult, EdgeParameters, FitDiagnostics, Spectrum,
};
use crate::numerics::fourier::ForwardFft;
use crate::numerics::solver::{SolverOptions, minimize};
use crate::numerics::spline::{BSpline, CubicResampler};
use crate::numerics::window::ft_window;
use crate::numerics::{
    index_below, index_nearest, interpolate_linear, k_from_energy, uniform_grid,
};
use model::FitWorkspace;
use std::f64::consts::PI;

/// Half-width, in raw-grid points, of the local average seeding each knot.
const SEED_HALF_WIDTH: usize = 5;
const MIN_KNOTS: usize = 4;
const MAX_KNOTS: usize = 128;

/// Remove the smooth atomic background from a spectrum, resolving missing
/// edge parameters with the default derivative-based resolver.
pub fn remove_background(
    spectrum: &Spectrum,
    config: &BackgroundConfig,
) -> AutobkResult<BackgroundResult> {
    remove_background_with(spectrum, config, &DerivativeEdgeResolver)
}

pub fn remove_background_with(
    spectrum: &Spectrum,
    config: &BackgroundConfig,
    resolver: &dyn EdgeResolver,
) -> AutobkResult<BackgroundResult> {
    config.validate()?;
    let edge = resolve_edge(spectrum, config, resolver)?;

    let energy = spectrum.energy();
    let mu = spectrum.mu();
    let npts = energy.len();

    let ie0 = index_below(energy, edge.e0).ok_or_else(|| {
        AutobkError::input_validation(
            "INPUT.E0_RANGE",
            format!(
                "edge energy {} lies below the first data point {}",
                edge.e0, energy[0]
            ),
        )
    })?;
    if edge.e0 >= energy[npts - 1] {
        return Err(AutobkError::input_validation(
            "INPUT.E0_RANGE",
            format!(
                "edge energy {} leaves no data above the edge (last point {})",
                edge.e0,
                energy[npts - 1]
            ),
        ));
    }

    // Real-space resolution of the truncated transform; rbkg below two
    // resolution elements cannot be resolved and is floored, not rejected.
    let rgrid = PI / (config.kstep * config.nfft as f64);
    let rbkg = config.rbkg.max(2.0 * rgrid);
    let irbkg = ((1.01 + rbkg / rgrid) as usize).min(config.nfft / 2);

    let kraw_full: Vec<f64> = energy[ie0..]
        .iter()
        .map(|e| k_from_energy(e - edge.e0))
        .collect();
    let Some(&kraw_max) = kraw_full.last() else {
        return Err(AutobkError::internal(
            "COMPUTE.K_GRID",
            "raw k grid is empty despite a validated edge index",
        ));
    };

    let kmax = match config.kmax {
        None => kraw_max,
        Some(value) => value.min(kraw_max).max(0.0),
    };
    if kmax <= config.kmin {
        return Err(AutobkError::input_validation(
            "INPUT.K_RANGE",
            format!(
                "fit window is empty: kmax {} (after clipping to the data range) must exceed kmin {}",
                kmax, config.kmin
            ),
        ));
    }

    let nkout = (1.01 + kmax / config.kstep) as usize;
    if nkout < 2 || nkout > config.nfft {
        return Err(AutobkError::input_validation(
            "INPUT.K_RANGE",
            format!(
                "output grid of {nkout} points is unusable with nfft {}",
                config.nfft
            ),
        ));
    }
    let kout = uniform_grid(config.kstep, nkout);

    let e_fit_max = edge.e0 + kmax * kmax * KTOE;
    let iemax = (index_below(energy, e_fit_max).unwrap_or(ie0) + 2).min(npts) - 1;
    let nmue = iemax - ie0 + 1;
    if nmue < 2 {
        return Err(AutobkError::input_validation(
            "INPUT.K_RANGE",
            format!("only {nmue} points fall inside the fit range"),
        ));
    }

    let kraw: Vec<f64> = kraw_full[..nmue].to_vec();
    let mu_fit: Vec<f64> = mu[ie0..=iemax].to_vec();

    let chi_std = match (&config.k_std, &config.chi_std) {
        (Some(k_std), Some(chi_ref)) => Some(
            kout.iter()
                .map(|&k| interpolate_linear(k, k_std, chi_ref).unwrap_or(0.0))
                .collect(),
        ),
        _ => None,
    };

    let window = ft_window(&kout, config.kmin, kmax, config.dk, config.window_kind()?)
        .map_err(|source| AutobkError::computation("COMPUTE.WINDOW", source.to_string()))?;
    let kout_weighted: Vec<f64> = kout.iter().map(|k| k.powi(config.kweight)).collect();
    let ftwin: Vec<f64> = kout_weighted
        .iter()
        .zip(&window)
        .map(|(weight, win)| weight * win)
        .collect();

    // Knot seeding: evenly spaced k targets, nearest raw point, local
    // 2:1:1-weighted average of mu as the starting value.
    let nspl = (2 * (rbkg * (kmax - config.kmin) / PI) as usize + 1).clamp(MIN_KNOTS, MAX_KNOTS);
    let mut seed_k = Vec::with_capacity(nspl);
    let mut seed_e = Vec::with_capacity(nspl);
    let mut seed_y = Vec::with_capacity(nspl);
    for i in 0..nspl {
        let target = config.kmin + i as f64 * (kmax - config.kmin) / (nspl - 1) as f64;
        let Some(ik) = index_nearest(&kraw_full, target) else {
            continue;
        };
        if seed_k.last().is_some_and(|last| *last >= kraw_full[ik]) {
            continue;
        }
        let upper = (ik + SEED_HALF_WIDTH).min(kraw_full.len() - 1);
        let lower = ik.saturating_sub(SEED_HALF_WIDTH);
        seed_k.push(kraw_full[ik]);
        seed_e.push(energy[ik + ie0]);
        seed_y.push((2.0 * mu[ik + ie0] + mu[upper + ie0] + mu[lower + ie0]) / 4.0);
    }
    if seed_k.len() < MIN_KNOTS {
        return Err(AutobkError::computation(
            "COMPUTE.SPLINE_SEEDS",
            format!(
                "only {} distinct knot positions available in [{}, {kmax}]",
                seed_k.len(),
                config.kmin
            ),
        ));
    }

    let seed_spline = BSpline::interpolating(&seed_k, &seed_y)
        .map_err(|source| AutobkError::computation("COMPUTE.SPLINE_FIT", source.to_string()))?;
    let initial_coefs = seed_spline.coefs().to_vec();
    let n_vary = seed_k.len();

    let resampler = CubicResampler::new(&kraw, &kout)
        .map_err(|source| AutobkError::computation("COMPUTE.RESAMPLE", source.to_string()))?;
    let fft = ForwardFft::new(config.nfft, config.kstep)
        .map_err(|source| AutobkError::computation("COMPUTE.FFT", source.to_string()))?;

    let workspace = FitWorkspace {
        kraw,
        mu: mu_fit,
        ftwin,
        kout_weighted,
        chi_std,
        spline: seed_spline,
        resampler,
        fft,
        irbkg,
        nclamp: config.nclamp,
        clamp_lo: config.clamp_lo,
        clamp_hi: config.clamp_hi,
    };

    tracing::debug!(
        n_points = npts,
        n_fit_points = nmue,
        n_knots = n_vary,
        irbkg,
        kmax,
        rbkg,
        "background fit prepared"
    );

    let initial: Vec<f64> = initial_coefs[..n_vary].to_vec();
    let fixed_tail: Vec<f64> = initial_coefs[n_vary..].to_vec();
    let solution = minimize(
        |varied: &[f64]| {
            let mut full = Vec::with_capacity(varied.len() + fixed_tail.len());
            full.extend_from_slice(varied);
            full.extend_from_slice(&fixed_tail);
            workspace.residual(&full)
        },
        &initial,
        SolverOptions::default(),
    )
    .map_err(|source| AutobkError::computation("COMPUTE.LEASTSQ", source.to_string()))?;

    tracing::info!(
        n_evaluations = solution.n_evaluations,
        reduced_chi_square = solution.reduced_chi_square,
        converged = solution.converged,
        "background fit finished"
    );
    if !solution.converged {
        tracing::warn!(
            "least-squares fit stopped before meeting tolerance; keeping the best coefficients found"
        );
    }

    let mut final_coefs = solution.parameters.clone();
    final_coefs.extend_from_slice(&fixed_tail);
    let (bkg, chi_raw) = workspace.spline_eval(&final_coefs);
    let (init_bkg, init_chi_raw) = workspace.spline_eval(&initial_coefs);

    let mut background = mu.to_vec();
    background[ie0..ie0 + bkg.len()].copy_from_slice(&bkg);
    let mut init_background = mu.to_vec();
    init_background[ie0..ie0 + init_bkg.len()].copy_from_slice(&init_bkg);

    let chie: Vec<f64> = mu
        .iter()
        .zip(&background)
        .map(|(mu, bkg)| (mu - bkg) / edge.edge_step)
        .collect();
    let chi: Vec<f64> = chi_raw
        .iter()
        .map(|value| value / edge.edge_step)
        .collect();
    let init_chi: Vec<f64> = init_chi_raw
        .iter()
        .map(|value| value / edge.edge_step)
        .collect();

    let (delta_chi, delta_background) = if config.calc_uncertainties {
        let bands = uncertainty::propagate(&workspace, &solution, &final_coefs, config.err_sigma);
        let mut delta_bkg_full = vec![0.0; npts];
        delta_bkg_full[ie0..ie0 + bands.delta_bkg.len()].copy_from_slice(&bands.delta_bkg);
        (Some(bands.delta_chi), Some(delta_bkg_full))
    } else {
        (None, None)
    };

    let diagnostics = FitDiagnostics {
        n_evaluations: solution.n_evaluations,
        reduced_chi_square: solution.reduced_chi_square,
        converged: solution.converged,
        n_coefficients: n_vary,
        kmin: config.kmin,
        kmax,
        rbkg,
        knot_energies: seed_e,
        knot_k: seed_k,
        knot_values: final_coefs[..n_vary].to_vec(),
        initial_knot_values: seed_y,
    };

    Ok(BackgroundResult {
        background,
        chie,
        k: kout,
        chi,
        init_background,
        init_chi,
        edge,
        delta_chi,
        delta_background,
        diagnostics,
    })
}

fn resolve_edge(
    spectrum: &Spectrum,
    config: &BackgroundConfig,
    resolver: &dyn EdgeResolver,
) -> AutobkResult<EdgeParameters> {
    match (config.e0, config.edge_step) {
        (Some(e0), Some(edge_step)) => EdgeParameters::new(e0, edge_step),
        (e0, edge_step) => {
            let resolved = resolver.resolve(spectrum)?;
            EdgeParameters::new(
                e0.unwrap_or(resolved.e0),
                edge_step.unwrap_or(resolved.edge_step),
            )
        }
    }
}
