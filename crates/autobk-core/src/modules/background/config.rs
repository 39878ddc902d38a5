//! Recognized background-removal options and their validation.

use crate::domain::{AutobkError, AutobkResult};
use crate::numerics::fourier::MIN_NFFT;
use crate::numerics::window::WindowKind;
use serde::Deserialize;

/// Configuration for one background removal.
///
/// Deserialization rejects unrecognized keys, so a misspelled option aborts
/// the run with a diagnostic instead of being silently ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackgroundConfig {
    /// Background separation radius in Angstrom.
    pub rbkg: f64,
    /// Edge energy in eV; resolved from the spectrum when absent.
    pub e0: Option<f64>,
    /// Normalization step; resolved from the spectrum when absent.
    pub edge_step: Option<f64>,
    /// Lower k bound of the fit window (1/Angstrom).
    pub kmin: f64,
    /// Upper k bound; defaults to the full data range.
    pub kmax: Option<f64>,
    /// k-weighting exponent applied before the Fourier transform.
    #[serde(alias = "kw")]
    pub kweight: i32,
    /// Window roll-off width (1/Angstrom).
    pub dk: f64,
    /// Window function name.
    pub win: String,
    /// Output grid spacing (1/Angstrom).
    pub kstep: f64,
    /// FFT length.
    pub nfft: usize,
    /// Number of boundary samples per clamp.
    pub nclamp: usize,
    pub clamp_lo: f64,
    pub clamp_hi: f64,
    /// Optional reference chi(k) for differential fitting.
    pub k_std: Option<Vec<f64>>,
    pub chi_std: Option<Vec<f64>>,
    pub calc_uncertainties: bool,
    /// Confidence level, in sigma, for the uncertainty bands.
    pub err_sigma: f64,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            rbkg: 1.0,
            e0: None,
            edge_step: None,
            kmin: 0.0,
            kmax: None,
            kweight: 1,
            dk: 0.0,
            win: "hanning".to_string(),
            kstep: 0.05,
            nfft: 2048,
            nclamp: 4,
            clamp_lo: 1.0,
            clamp_hi: 1.0,
            k_std: None,
            chi_std: None,
            calc_uncertainties: true,
            err_sigma: 1.0,
        }
    }
}

impl BackgroundConfig {
    pub fn from_json_str(text: &str) -> AutobkResult<Self> {
        let config: Self = serde_json::from_str(text).map_err(|source| {
            AutobkError::input_validation(
                "INPUT.CONFIG",
                format!("unrecognized or invalid configuration: {source}"),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn window_kind(&self) -> AutobkResult<WindowKind> {
        WindowKind::from_name(&self.win)
            .map_err(|source| AutobkError::input_validation("INPUT.WINDOW", source.to_string()))
    }

    pub fn validate(&self) -> AutobkResult<()> {
        if !self.rbkg.is_finite() || self.rbkg <= 0.0 {
            return Err(AutobkError::input_validation(
                "INPUT.RBKG",
                format!("rbkg must be finite and positive, got {}", self.rbkg),
            ));
        }
        if !self.kstep.is_finite() || self.kstep <= 0.0 {
            return Err(AutobkError::input_validation(
                "INPUT.KSTEP",
                format!("kstep must be finite and positive, got {}", self.kstep),
            ));
        }
        if !self.nfft.is_power_of_two() || self.nfft < MIN_NFFT {
            return Err(AutobkError::input_validation(
                "INPUT.NFFT",
                format!(
                    "nfft must be a power of two of at least {MIN_NFFT}, got {}",
                    self.nfft
                ),
            ));
        }
        if !self.kmin.is_finite() || self.kmin < 0.0 {
            return Err(AutobkError::input_validation(
                "INPUT.K_RANGE",
                format!("kmin must be finite and non-negative, got {}", self.kmin),
            ));
        }
        if let Some(kmax) = self.kmax
            && !kmax.is_finite()
        {
            return Err(AutobkError::input_validation(
                "INPUT.K_RANGE",
                format!("kmax must be finite, got {kmax}"),
            ));
        }
        if self.kweight < 0 {
            return Err(AutobkError::input_validation(
                "INPUT.KWEIGHT",
                format!("kweight must be non-negative, got {}", self.kweight),
            ));
        }
        if !self.dk.is_finite() || self.dk < 0.0 {
            return Err(AutobkError::input_validation(
                "INPUT.WINDOW",
                format!("dk must be finite and non-negative, got {}", self.dk),
            ));
        }
        if !self.clamp_lo.is_finite() || !self.clamp_hi.is_finite() {
            return Err(AutobkError::input_validation(
                "INPUT.CLAMP",
                "clamp weights must be finite",
            ));
        }
        if !self.err_sigma.is_finite() || self.err_sigma <= 0.0 {
            return Err(AutobkError::input_validation(
                "INPUT.ERR_SIGMA",
                format!("err_sigma must be finite and positive, got {}", self.err_sigma),
            ));
        }

        match (&self.k_std, &self.chi_std) {
            (None, None) => {}
            (Some(k_std), Some(chi_std)) => {
                if k_std.len() != chi_std.len() || k_std.len() < 2 {
                    return Err(AutobkError::input_validation(
                        "INPUT.CHI_STD",
                        format!(
                            "k_std and chi_std must have equal lengths of at least 2, got {} and {}",
                            k_std.len(),
                            chi_std.len()
                        ),
                    ));
                }
                if !k_std.windows(2).all(|pair| pair[0] < pair[1]) {
                    return Err(AutobkError::input_validation(
                        "INPUT.CHI_STD",
                        "k_std must be strictly increasing",
                    ));
                }
            }
            _ => {
                return Err(AutobkError::input_validation(
                    "INPUT.CHI_STD",
                    "k_std and chi_std must be supplied together",
                ));
            }
        }

        self.window_kind()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::BackgroundConfig;

    #[test]
    fn defaults_match_the_reference_algorithm() {
        let config = BackgroundConfig::default();
        assert_eq!(config.rbkg, 1.0);
        assert_eq!(config.kmin, 0.0);
        assert_eq!(config.kmax, None);
        assert_eq!(config.kweight, 1);
        assert_eq!(config.win, "hanning");
        assert_eq!(config.kstep, 0.05);
        assert_eq!(config.nfft, 2048);
        assert_eq!(config.nclamp, 4);
        assert!(config.calc_uncertainties);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_keys_abort_with_a_diagnostic() {
        let error = BackgroundConfig::from_json_str(r#"{"rbgk": 1.2}"#)
            .expect_err("misspelled key must be rejected");
        assert_eq!(error.code(), "INPUT.CONFIG");
        assert!(error.message().contains("rbgk"));
    }

    #[test]
    fn kw_is_accepted_as_an_alias_for_kweight() {
        let config = BackgroundConfig::from_json_str(r#"{"kw": 2}"#).expect("alias accepted");
        assert_eq!(config.kweight, 2);
    }

    #[test]
    fn invalid_numeric_options_are_rejected() {
        let mut config = BackgroundConfig::default();
        config.kstep = 0.0;
        assert_eq!(config.validate().expect_err("zero kstep").code(), "INPUT.KSTEP");

        let mut config = BackgroundConfig::default();
        config.nfft = 1000;
        assert_eq!(config.validate().expect_err("nfft").code(), "INPUT.NFFT");

        let mut config = BackgroundConfig::default();
        config.rbkg = -1.0;
        assert_eq!(config.validate().expect_err("rbkg").code(), "INPUT.RBKG");

        let mut config = BackgroundConfig::default();
        config.win = "blackman".to_string();
        assert_eq!(config.validate().expect_err("window").code(), "INPUT.WINDOW");
    }

    #[test]
    fn reference_signal_must_come_in_pairs() {
        let mut config = BackgroundConfig::default();
        config.chi_std = Some(vec![0.0, 0.1, 0.0]);
        assert_eq!(
            config.validate().expect_err("chi_std alone").code(),
            "INPUT.CHI_STD"
        );

        config.k_std = Some(vec![0.0, 1.0]);
        assert_eq!(
            config.validate().expect_err("length mismatch").code(),
            "INPUT.CHI_STD"
        );

        config.k_std = Some(vec![0.0, 1.0, 2.0]);
        assert!(config.validate().is_ok());
    }
}
