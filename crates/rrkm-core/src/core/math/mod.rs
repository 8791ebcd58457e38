//! Numeric kernel shared by every model family.

pub mod fourier;
pub mod gamma;
pub mod hyperbolic;
pub mod quadrature;
pub mod roots;
pub mod spline;
pub mod tabulated;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum NumericError {
    #[error("Invalid table: {0}")]
    InvalidTable(String),

    #[error("Argument {x} is outside the supported range [{min}, {max}]")]
    OutOfRange { x: f64, min: f64, max: f64 },

    #[error("Root search did not converge after {iterations} iterations (last estimate {last})")]
    NotConverged { iterations: usize, last: f64 },

    #[error("Root is not bracketed by [{lower}, {upper}]")]
    NoBracket { lower: f64, upper: f64 },

    #[error("Derivative order {0} is not supported")]
    UnsupportedDerivative(usize),

    #[error("Ill-conditioned computation: {0}")]
    IllConditioned(String),
}
