//! Species: named aggregates answering state-counting queries at absolute energies.
//!
//! Every species carries an absolute ground energy. `states` takes an absolute
//! energy and is zero below the ground; `weight` is measured from the ground.
//! A species whose ground was lowered by a tunneling cutoff also reports the
//! barrier top as its real ground, from which `tunnel_weight` is measured.

pub mod arrhenius;
pub mod atomic;
pub mod graph;
pub mod grid;
pub mod read;
pub mod rrho;
pub mod union;
pub mod var_barrier;

use crate::core::math::NumericError;
use crate::core::mode::StatesMode;
use crate::engine::error::ModelError;
pub use arrhenius::Arrhenius;
pub use atomic::AtomicSpecies;
pub use graph::GraphExpansion;
pub use grid::StatesGrid;
pub use read::ReadSpecies;
pub use rrho::Rrho;
pub use union::UnionSpecies;
pub use var_barrier::{BlendLaw, Branch, HarmonicBlend, TwoStateMethod, VarBarrier};

#[derive(Debug, Clone)]
pub enum SpeciesKind {
    Rrho(Box<Rrho>),
    Read(ReadSpecies),
    Union(UnionSpecies),
    VarBarrier(Box<VarBarrier>),
    Atomic(AtomicSpecies),
    Arrhenius(Arrhenius),
}

#[derive(Debug, Clone)]
pub struct Species {
    name: String,
    mode: StatesMode,
    ground: f64,
    real_ground: f64,
    kind: SpeciesKind,
}

impl Species {
    pub fn new(name: impl Into<String>, mode: StatesMode, ground: f64, kind: SpeciesKind) -> Self {
        Self {
            name: name.into(),
            mode,
            ground,
            real_ground: ground,
            kind,
        }
    }

    /// Sets the barrier top for species whose ground sits below it.
    pub(crate) fn with_real_ground(mut self, real_ground: f64) -> Self {
        self.real_ground = real_ground;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> StatesMode {
        self.mode
    }

    pub fn kind(&self) -> &SpeciesKind {
        &self.kind
    }

    /// Absolute energy of the lowest state.
    pub fn ground(&self) -> f64 {
        self.ground
    }

    pub fn real_ground(&self) -> f64 {
        self.real_ground
    }

    /// Moves every absolute energy of the species by `shift`.
    pub fn shift_ground(&mut self, shift: f64) {
        self.ground += shift;
        self.real_ground += shift;
        if let SpeciesKind::Union(union) = &mut self.kind {
            union.shift_ground(shift);
        }
    }

    fn numeric(&self, argument: f64) -> impl FnOnce(NumericError) -> ModelError + '_ {
        move |source| ModelError::numeric(&self.name, argument, source)
    }

    /// Density or number of states at the absolute `energy`.
    pub fn states(&self, energy: f64) -> Result<f64, ModelError> {
        if !self.mode.has_states() {
            return Err(ModelError::Logic(format!(
                "species '{}' was built without states",
                self.name
            )));
        }
        let relative = energy - self.ground;
        match &self.kind {
            SpeciesKind::Union(union) => union.states(energy),
            SpeciesKind::Rrho(rrho) => rrho.states(relative).map_err(self.numeric(energy)),
            SpeciesKind::Read(read) => read.states(relative).map_err(self.numeric(energy)),
            SpeciesKind::VarBarrier(barrier) => {
                barrier.states(relative).map_err(self.numeric(energy))
            }
            SpeciesKind::Atomic(atomic) => Ok(atomic.states(relative)),
            SpeciesKind::Arrhenius(arrhenius) => Ok(arrhenius.states(self.mode, relative)),
        }
    }

    /// Canonical weight relative to the ground.
    pub fn weight(&self, temperature: f64) -> Result<f64, ModelError> {
        if !(temperature > 0.0) {
            return Err(ModelError::numeric(
                &self.name,
                temperature,
                NumericError::OutOfRange {
                    x: temperature,
                    min: 0.0,
                    max: f64::INFINITY,
                },
            ));
        }
        match &self.kind {
            SpeciesKind::Union(union) => union.weight(temperature, self.ground),
            SpeciesKind::Rrho(rrho) => rrho.weight(temperature).map_err(self.numeric(temperature)),
            SpeciesKind::Read(read) => read.weight(temperature).map_err(self.numeric(temperature)),
            SpeciesKind::VarBarrier(barrier) => {
                barrier.weight(temperature).map_err(self.numeric(temperature))
            }
            SpeciesKind::Atomic(atomic) => Ok(atomic.weight(temperature)),
            SpeciesKind::Arrhenius(arrhenius) => Ok(arrhenius.weight(temperature)),
        }
    }

    /// Canonical weight relative to [`Species::real_ground`], tunneling included.
    pub fn tunnel_weight(&self, temperature: f64) -> Result<f64, ModelError> {
        match &self.kind {
            SpeciesKind::Rrho(rrho) => rrho
                .tunnel_weight(temperature)
                .map_err(self.numeric(temperature)),
            SpeciesKind::Union(union) => union.tunnel_weight(temperature, self.real_ground),
            _ => {
                let shift = self.real_ground - self.ground;
                Ok(self.weight(temperature)? * (shift / temperature).exp())
            }
        }
    }

    /// Number of infrared-active oscillators.
    pub fn oscillator_size(&self) -> usize {
        match &self.kind {
            SpeciesKind::Rrho(rrho) => rrho.oscillator_size(),
            SpeciesKind::Union(union) => union.oscillator_size(),
            _ => 0,
        }
    }

    pub fn oscillator_frequency(&self, index: usize) -> Option<f64> {
        match &self.kind {
            SpeciesKind::Rrho(rrho) => rrho.oscillator_frequency(index),
            SpeciesKind::Union(union) => union.oscillator_frequency(index),
            _ => None,
        }
    }

    /// Spontaneous emission rate of oscillator `index` at the absolute `energy`.
    pub fn infrared_intensity(&self, energy: f64, index: usize) -> Result<f64, ModelError> {
        match &self.kind {
            SpeciesKind::Rrho(rrho) => rrho
                .infrared_intensity(energy - self.ground, index)
                .map_err(self.numeric(energy))?
                .ok_or_else(|| self.missing_oscillator(index)),
            SpeciesKind::Union(union) => union.infrared_intensity(energy, index),
            _ => Err(self.missing_oscillator(index)),
        }
    }

    fn missing_oscillator(&self, index: usize) -> ModelError {
        ModelError::Logic(format!(
            "species '{}' has no infrared-active oscillator {}",
            self.name, index
        ))
    }
}
