//! Physical constants and fixed model parameters for the k-space pipeline.

/// hbar^2 / (2 m_e) in eV * Angstrom^2: converts k^2 (1/Angstrom^2) to
/// photoelectron energy above the edge (eV).
pub const KTOE: f64 = 3.809_980_849_311_092;

/// Inverse of [`KTOE`]: converts (E - e0) in eV to k^2.
pub const ETOK: f64 = 1.0 / KTOE;

/// Polynomial order of the background spline.
pub const SPLINE_DEGREE: usize = 3;
