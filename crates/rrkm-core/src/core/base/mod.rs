//! Base cores.
//!
//! A core is the non-separable part of a species: external rotation, an
//! anharmonic vibrational manifold, a transitional-mode count or a set of
//! coupled torsions. Every core answers queries relative to its own ground.

pub mod multirotor;
pub mod phase_space;
pub mod rigid_rotor;
pub mod rotd;

use crate::core::math::NumericError;
use crate::core::math::quadrature::try_simpson_fn;
use crate::core::mode::StatesMode;
pub use multirotor::MultiRotor;
pub use phase_space::PhaseSpaceTheory;
pub use rigid_rotor::RigidRotor;
pub use rotd::Rotd;

pub(crate) const LAPLACE_SPAN: f64 = 50.0;
pub(crate) const LAPLACE_SPAN_MIN: f64 = 25.0;
pub(crate) const LAPLACE_INTERVALS: usize = 2000;

#[derive(Debug, Clone)]
pub enum CoreKind {
    RigidRotor(RigidRotor),
    PhaseSpaceTheory(PhaseSpaceTheory),
    Rotd(Rotd),
    MultiRotor(Box<MultiRotor>),
}

#[derive(Debug, Clone)]
pub struct Core {
    mode: StatesMode,
    kind: CoreKind,
}

impl Core {
    pub fn new(mode: StatesMode, kind: CoreKind) -> Self {
        Self { mode, kind }
    }

    pub fn mode(&self) -> StatesMode {
        self.mode
    }

    pub fn kind(&self) -> &CoreKind {
        &self.kind
    }

    /// Lowest state relative to the bottom of the core potential.
    pub fn ground(&self) -> f64 {
        match &self.kind {
            CoreKind::RigidRotor(c) => c.ground(),
            CoreKind::PhaseSpaceTheory(_) | CoreKind::Rotd(_) => 0.0,
            CoreKind::MultiRotor(c) => c.ground(),
        }
    }

    /// True when the count is a staircase, so a density grid is a comb of bins.
    pub fn is_discrete(&self) -> bool {
        match &self.kind {
            CoreKind::RigidRotor(c) => c.is_discrete(),
            _ => false,
        }
    }

    /// Cumulative number of states at `energy` above the ground; zero below it.
    pub fn number(&self, energy: f64) -> Result<f64, NumericError> {
        if energy < 0.0 {
            return Ok(0.0);
        }
        match &self.kind {
            CoreKind::RigidRotor(c) => c.number(energy),
            CoreKind::PhaseSpaceTheory(c) => Ok(c.number(energy)),
            CoreKind::Rotd(c) => c.number(energy),
            CoreKind::MultiRotor(c) => c.number(energy),
        }
    }

    pub fn density(&self, energy: f64) -> Result<f64, NumericError> {
        if energy < 0.0 {
            return Ok(0.0);
        }
        match &self.kind {
            CoreKind::RigidRotor(c) => c.density(energy),
            CoreKind::PhaseSpaceTheory(c) => Ok(c.density(energy)),
            CoreKind::Rotd(c) => c.density(energy),
            CoreKind::MultiRotor(c) => c.density(energy),
        }
    }

    /// Density or number according to the mode; `NoStates` cores report numbers.
    pub fn states(&self, energy: f64) -> Result<f64, NumericError> {
        match self.mode {
            StatesMode::Density => self.density(energy),
            StatesMode::Number | StatesMode::NoStates => self.number(energy),
        }
    }

    /// Canonical weight relative to the ground.
    pub fn weight(&self, temperature: f64) -> Result<f64, NumericError> {
        if !(temperature > 0.0) {
            return Err(NumericError::OutOfRange {
                x: temperature,
                min: 0.0,
                max: f64::INFINITY,
            });
        }
        match &self.kind {
            CoreKind::RigidRotor(c) => c.weight(temperature),
            CoreKind::PhaseSpaceTheory(c) => Ok(c.weight(temperature)),
            CoreKind::Rotd(c) => c.weight(temperature),
            CoreKind::MultiRotor(c) => c.weight(temperature),
        }
    }

    /// Values on the grid `k * step`, `k < size`, ready for convolution.
    ///
    /// Number grids hold the cumulative count at each node. Density grids hold
    /// the count falling in the cell centred on each node divided by the step,
    /// which keeps discrete spectra exact under convolution.
    pub fn fill_grid(&self, step: f64, size: usize) -> Result<Vec<f64>, NumericError> {
        match self.mode {
            StatesMode::Number | StatesMode::NoStates => {
                (0..size).map(|k| self.number(step * k as f64)).collect()
            }
            StatesMode::Density => {
                let mut edges = Vec::with_capacity(size + 1);
                edges.push(0.0);
                for k in 0..size {
                    edges.push(self.number(step * (k as f64 + 0.5))?);
                }
                Ok(edges.windows(2).map(|w| (w[1] - w[0]) / step).collect())
            }
        }
    }
}

/// `q(T) = (1/T) ∫₀^∞ N(E) exp(-E/T) dE` for a tabulated count.
///
/// The integral stops at `limit`, the largest energy the count accepts; a
/// temperature for which that truncation matters is out of range.
pub(crate) fn laplace_weight<F>(number: F, temperature: f64, limit: f64) -> Result<f64, NumericError>
where
    F: Fn(f64) -> Result<f64, NumericError>,
{
    if limit < LAPLACE_SPAN_MIN * temperature {
        return Err(NumericError::OutOfRange {
            x: temperature,
            min: 0.0,
            max: limit / LAPLACE_SPAN_MIN,
        });
    }
    let upper = (LAPLACE_SPAN * temperature).min(limit);
    try_simpson_fn(
        |energy| Ok(number(energy)? * (-energy / temperature).exp() / temperature),
        0.0,
        upper,
        LAPLACE_INTERVALS,
    )
}
