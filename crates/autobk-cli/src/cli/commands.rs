use super::CliError;
use super::helpers::{
    read_spectrum_file, write_background_table, write_chi_table, write_diagnostics_json,
};
use anyhow::Context;
use autobk_core::{BackgroundConfig, remove_background};
use std::path::PathBuf;

#[derive(clap::Args)]
pub(super) struct RunArgs {
    /// Two-column energy/mu data file; '#', '*' and ';' lines are skipped
    #[arg(long)]
    data: PathBuf,

    /// JSON file with the recognized autobk options; flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory for bkg.dat, chi.dat and autobk.json
    #[arg(long, default_value = "autobk-out")]
    out_dir: PathBuf,

    /// Background separation radius in Angstrom
    #[arg(long)]
    rbkg: Option<f64>,

    /// Edge energy in eV (resolved from the data when absent)
    #[arg(long)]
    e0: Option<f64>,

    /// Normalization step (resolved from the data when absent)
    #[arg(long)]
    edge_step: Option<f64>,

    /// Lower k bound of the fit window
    #[arg(long)]
    kmin: Option<f64>,

    /// Upper k bound of the fit window
    #[arg(long)]
    kmax: Option<f64>,

    /// k-weight exponent for the Fourier transform
    #[arg(long)]
    kweight: Option<i32>,

    /// Window roll-off width
    #[arg(long)]
    dk: Option<f64>,

    /// Window function name
    #[arg(long)]
    win: Option<String>,

    /// Output grid spacing
    #[arg(long)]
    kstep: Option<f64>,

    /// FFT length
    #[arg(long)]
    nfft: Option<usize>,

    /// Number of boundary clamp samples
    #[arg(long)]
    nclamp: Option<usize>,

    /// Low-k clamp weight
    #[arg(long)]
    clamp_lo: Option<f64>,

    /// High-k clamp weight
    #[arg(long)]
    clamp_hi: Option<f64>,

    /// Skip uncertainty propagation
    #[arg(long)]
    no_uncertainties: bool,

    /// Confidence level in sigma for the uncertainty bands
    #[arg(long)]
    err_sigma: Option<f64>,
}

impl RunArgs {
    fn into_parts(self) -> Result<(PathBuf, PathBuf, BackgroundConfig), CliError> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config '{}'", path.display()))?;
                BackgroundConfig::from_json_str(&text).map_err(CliError::Compute)?
            }
            None => BackgroundConfig::default(),
        };

        if let Some(rbkg) = self.rbkg {
            config.rbkg = rbkg;
        }
        if self.e0.is_some() {
            config.e0 = self.e0;
        }
        if self.edge_step.is_some() {
            config.edge_step = self.edge_step;
        }
        if let Some(kmin) = self.kmin {
            config.kmin = kmin;
        }
        if self.kmax.is_some() {
            config.kmax = self.kmax;
        }
        if let Some(kweight) = self.kweight {
            config.kweight = kweight;
        }
        if let Some(dk) = self.dk {
            config.dk = dk;
        }
        if let Some(win) = self.win {
            config.win = win;
        }
        if let Some(kstep) = self.kstep {
            config.kstep = kstep;
        }
        if let Some(nfft) = self.nfft {
            config.nfft = nfft;
        }
        if let Some(nclamp) = self.nclamp {
            config.nclamp = nclamp;
        }
        if let Some(clamp_lo) = self.clamp_lo {
            config.clamp_lo = clamp_lo;
        }
        if let Some(clamp_hi) = self.clamp_hi {
            config.clamp_hi = clamp_hi;
        }
        if self.no_uncertainties {
            config.calc_uncertainties = false;
        }
        if let Some(err_sigma) = self.err_sigma {
            config.err_sigma = err_sigma;
        }

        Ok((self.data, self.out_dir, config))
    }
}

pub(super) fn run_fit_command(args: RunArgs) -> Result<i32, CliError> {
    let (data_path, out_dir, config) = args.into_parts()?;
    config.validate().map_err(CliError::Compute)?;

    let spectrum = read_spectrum_file(&data_path)?;
    tracing::info!(
        data = %data_path.display(),
        n_points = spectrum.len(),
        "running background removal"
    );
    let result = remove_background(&spectrum, &config).map_err(CliError::Compute)?;

    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create output directory '{}'", out_dir.display()))?;
    write_background_table(&out_dir.join("bkg.dat"), &spectrum, &result)?;
    write_chi_table(&out_dir.join("chi.dat"), &result)?;
    write_diagnostics_json(&out_dir.join("autobk.json"), &result)?;

    println!(
        "autobk: {} evaluations, reduced chi-square {:.6e}, {}",
        result.diagnostics.n_evaluations,
        result.diagnostics.reduced_chi_square,
        if result.diagnostics.converged {
            "converged"
        } else {
            "not converged"
        }
    );
    println!("Artifacts written to '{}'.", out_dir.display());
    Ok(0)
}

pub(super) fn run_windows_command() -> Result<i32, CliError> {
    for name in ["hanning", "parzen", "welch", "sine", "gaussian"] {
        println!("{name}");
    }
    Ok(0)
}
