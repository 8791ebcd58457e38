//! One-dimensional internal rotors.
//!
//! A rotor is a quantized level ladder measured from its own ground level. The
//! symmetry number reduces the problem onto one symmetry period: with reduced
//! angle `ψ = σφ` the kinetic operator is `b p²`, `b = B/σ²`.

pub mod free;
pub mod hindered;
pub mod internal_rotation;
pub mod umbrella;

use crate::core::math::NumericError;
pub use free::FreeRotor;
pub use hindered::HinderedRotor;
pub use internal_rotation::InternalRotation;
pub use umbrella::Umbrella;

#[derive(Debug, Clone)]
pub enum Rotor {
    Free(FreeRotor),
    Hindered(HinderedRotor),
    Umbrella(Umbrella),
}

impl Rotor {
    /// Lowest level relative to the potential minimum.
    pub fn ground(&self) -> f64 {
        match self {
            Rotor::Free(_) => 0.0,
            Rotor::Hindered(r) => r.ground(),
            Rotor::Umbrella(r) => r.ground(),
        }
    }

    /// Energy of level `i` relative to [`Rotor::ground`].
    pub fn energy_level(&self, i: usize) -> f64 {
        match self {
            Rotor::Free(r) => r.energy_level(i),
            Rotor::Hindered(r) => r.energy_level(i),
            Rotor::Umbrella(r) => r.energy_level(i),
        }
    }

    pub fn level_size(&self) -> usize {
        match self {
            Rotor::Free(r) => r.level_size(),
            Rotor::Hindered(r) => r.level_size(),
            Rotor::Umbrella(r) => r.level_size(),
        }
    }

    pub fn level_degeneracy(&self, i: usize) -> usize {
        match self {
            Rotor::Free(r) => r.level_degeneracy(i),
            Rotor::Hindered(_) | Rotor::Umbrella(_) => 1,
        }
    }

    /// Canonical weight relative to the ground level.
    pub fn weight(&self, temperature: f64) -> Result<f64, NumericError> {
        match self {
            Rotor::Free(r) => Ok(r.weight(temperature)),
            Rotor::Hindered(r) => r.weight(temperature),
            Rotor::Umbrella(r) => r.weight(temperature),
        }
    }

    /// Convolutes the level ladder into `states`, each level being a unit step
    /// at its nearest grid bin.
    pub fn convolute(&self, states: &mut [f64], step: f64) {
        let mut bins: Vec<(usize, f64)> = Vec::new();
        for i in 0..self.level_size() {
            let bin = (self.energy_level(i) / step).round() as usize;
            if bin >= states.len() {
                continue;
            }
            let degeneracy = self.level_degeneracy(i) as f64;
            match bins.last_mut() {
                Some((last, weight)) if *last == bin => *weight += degeneracy,
                _ => bins.push((bin, degeneracy)),
            }
        }
        convolute_ladder(states, &bins);
    }
}

/// `out[k] = Σ g · in[k - bin]` over `(bin, g)` pairs.
pub(crate) fn convolute_ladder(states: &mut [f64], bins: &[(usize, f64)]) {
    let base = states.to_vec();
    states.fill(0.0);
    for &(bin, weight) in bins {
        for k in bin..states.len() {
            states[k] += weight * base[k - bin];
        }
    }
}

/// Ratio of the quantum to the classical partition function of a harmonic
/// mode of local frequency `frequency` at `temperature`.
///
/// A negative frequency denotes an imaginary one. The correction diverges when
/// an imaginary frequency reaches `2πT`, which is reported as ill-conditioned.
pub(crate) fn path_integral_correction(
    frequency: f64,
    temperature: f64,
) -> Result<f64, NumericError> {
    let half = 0.5 * frequency.abs() / temperature;
    if half < 1e-8 {
        return Ok(1.0);
    }
    if frequency > 0.0 {
        Ok(half / half.sinh())
    } else if half < std::f64::consts::PI {
        Ok(half / half.sin())
    } else {
        Err(NumericError::IllConditioned(format!(
            "imaginary local frequency {} is too large for temperature {}",
            frequency.abs(),
            temperature
        )))
    }
}
