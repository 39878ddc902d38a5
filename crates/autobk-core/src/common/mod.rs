pub mod constants;
pub mod edge;

pub use constants::{ETOK, KTOE, SPLINE_DEGREE};
pub use edge::{DerivativeEdgeResolver, EdgeResolver};
