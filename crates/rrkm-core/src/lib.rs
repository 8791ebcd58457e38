//! # RRKM Core Library
//!
//! State-counting functions for unimolecular kinetics: density of states, cumulative
//! number of states and canonical statistical weights of wells, barriers and fragments.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture:
//!
//! - **[`core`]: The Foundation.** The numeric kernel (splines, tabulated functions,
//!   root search, torus Fourier series) and every model family: tunnels, rotors,
//!   base cores and composite species. Models are immutable once built, apart from a
//!   single ground-energy shift.
//!
//! - **[`engine`]: The Orchestration Layer.** Configuration, the error taxonomy,
//!   the discriminant-to-constructor factories and the species registry that the
//!   master-equation consumer reads from.
//!
//! - **[`workflows`]: The Public API.** Loading a complete model document into a
//!   registry in one call.
//!
//! All energies, frequencies, rotational constants and temperatures share one
//! caller-chosen energy unit; temperature always means `kT`.

pub mod core;
pub mod engine;
pub mod workflows;
