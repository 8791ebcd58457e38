//! # Core Module
//!
//! Stateless numerics and the model families used to count molecular states.
//!
//! ## Architecture
//!
//! - **Numeric kernel** ([`math`]) - Splines, tabulated functions, root search, quadrature,
//!   the gamma function and multi-dimensional Fourier series
//! - **Input blocks** ([`io`]) - Typed access to keyword tables and companion data streams
//! - **Counting mode** ([`mode`]) - Whether a model reports densities, numbers or weights only
//! - **Tunneling** ([`tunnel`]) - Semiclassical transmission through a barrier
//! - **Internal rotations** ([`rotor`]) - One-dimensional rotor level ladders
//! - **Base cores** ([`base`]) - Rigid rotors, phase-space theory, tabulated cores and
//!   coupled multi-rotors
//! - **Species** ([`species`]) - Named aggregates combining all of the above

pub mod base;
pub mod io;
pub mod math;
pub mod mode;
pub mod rotor;
pub mod species;
pub mod tunnel;
