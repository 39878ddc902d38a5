//! Background removal for X-ray absorption spectra.
//!
//! The core operation separates the smooth atomic absorption from the
//! oscillatory fine-structure signal chi(k): a cubic spline background is
//! fitted so that the low-R part of the Fourier transform of chi(k) vanishes
//! below a separation radius, and the fit covariance can be propagated into
//! pointwise uncertainty bands on both outputs.

pub mod common;
pub mod domain;
pub mod modules;
pub mod numerics;

pub use common::edge::{DerivativeEdgeResolver, EdgeResolver};
pub use domain::{
    AutobkError, AutobkErrorCategory, AutobkResult, BackgroundResult, EdgeParameters,
    FitDiagnostics, Spectrum,
};
pub use modules::background::{BackgroundConfig, remove_background, remove_background_with};
