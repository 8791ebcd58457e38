use nalgebra::{Complex, DMatrix, SymmetricEigen};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::f64::consts::PI;
use tracing::{debug, warn};

use super::free::default_symmetry;
use super::{InternalRotation, Rotor, path_integral_correction};
use crate::core::io::block::KeywordBlock;
use crate::core::math::NumericError;
use crate::core::math::fourier::{FourierSeries, MultiIndex};
use crate::engine::config::{ModelConfig, RotorWeightMethod};
use crate::engine::error::ModelError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct HinderedRotorInput {
    rotational_constant: f64,
    #[serde(default = "default_symmetry")]
    symmetry: u32,
    potential_expansion: Option<Vec<(i32, f64)>>,
    potential_samples: Option<Vec<f64>>,
    weight_method: Option<RotorWeightMethod>,
    group: Option<Vec<usize>>,
    axis: Option<[usize; 2]>,
}

/// Torsion in a periodic potential, solved in a plane-wave basis.
///
/// The potential is expressed in the reduced angle `ψ = σφ` and shifted so that
/// its minimum on the sampling grid is zero.
#[derive(Debug, Clone)]
pub struct HinderedRotor {
    rotational_constant: f64,
    symmetry: u32,
    potential: FourierSeries,
    grid_potential: Vec<f64>,
    grid_frequency: Vec<f64>,
    ground: f64,
    levels: Vec<f64>,
    weight_method: RotorWeightMethod,
    thermal_power_max: f64,
    descriptor: Option<InternalRotation>,
}

impl HinderedRotor {
    pub fn new(
        rotational_constant: f64,
        symmetry: u32,
        potential: FourierSeries,
        config: &ModelConfig,
    ) -> Result<Self, NumericError> {
        let b = rotational_constant / (symmetry as f64).powi(2);
        let grid = MultiIndex::new(vec![config.rotor.grid_size])?;

        let raw = potential.on_grid(&grid);
        let minimum = raw.iter().copied().fold(f64::INFINITY, f64::min);
        let potential = potential.add(&FourierSeries::constant(1, -minimum));
        let grid_potential: Vec<f64> = raw.iter().map(|v| v - minimum).collect();
        let maximum = grid_potential.iter().copied().fold(0.0, f64::max);

        let curvature = potential.derivative(0).derivative(0).on_grid(&grid);
        let grid_frequency: Vec<f64> = curvature
            .iter()
            .map(|&c| c.signum() * (2.0 * b * c.abs()).sqrt())
            .collect();

        let ceiling = config.rotor_level_max();
        let needed = ((ceiling + maximum) / b).sqrt().ceil() as usize + 2;
        let dim = (2 * needed + 1).clamp(config.rotor.ham_size_min, config.rotor.ham_size_max);
        let half = (dim.max(1) - 1) / 2;
        if 2 * needed + 1 > config.rotor.ham_size_max {
            warn!(
                needed = 2 * needed + 1,
                cap = config.rotor.ham_size_max,
                "Hindered-rotor basis capped; high levels will be missing."
            );
        }
        let dim = 2 * half + 1;
        let offset = half as i32;

        let hamiltonian = DMatrix::from_fn(dim, dim, |r, c| {
            let m = r as i32 - offset;
            let n = c as i32 - offset;
            let mut element = potential.coefficient(&[m - n]);
            if r == c {
                element += Complex::new(b * (m as f64).powi(2), 0.0);
            }
            element
        });
        let mut energies: Vec<f64> = SymmetricEigen::new(hamiltonian)
            .eigenvalues
            .iter()
            .copied()
            .collect();
        energies.sort_by(|a, b| a.total_cmp(b));

        let ground = energies[0];
        let reliable = ceiling.min(b * (half as f64).powi(2));
        let levels: Vec<f64> = energies
            .iter()
            .map(|e| e - ground)
            .take_while(|e| *e <= reliable)
            .collect();
        debug!(
            basis = dim,
            levels = levels.len(),
            ground,
            barrier = maximum,
            "Hindered rotor diagonalized."
        );

        Ok(Self {
            rotational_constant,
            symmetry,
            potential,
            grid_potential,
            grid_frequency,
            ground,
            levels,
            weight_method: config.rotor.weight_method,
            thermal_power_max: config.rotor.thermal_power_max,
            descriptor: None,
        })
    }

    pub fn rotational_constant(&self) -> f64 {
        self.rotational_constant
    }

    pub fn symmetry(&self) -> u32 {
        self.symmetry
    }

    pub fn potential(&self) -> &FourierSeries {
        &self.potential
    }

    pub fn descriptor(&self) -> Option<&InternalRotation> {
        self.descriptor.as_ref()
    }

    pub fn potential_max(&self) -> f64 {
        self.grid_potential.iter().copied().fold(0.0, f64::max)
    }

    /// Signed local harmonic frequencies on the sampling grid; negative values are imaginary.
    pub fn grid_frequency(&self) -> &[f64] {
        &self.grid_frequency
    }

    pub fn ground(&self) -> f64 {
        self.ground
    }

    pub fn energy_level(&self, i: usize) -> f64 {
        self.levels[i]
    }

    pub fn level_size(&self) -> usize {
        self.levels.len()
    }

    fn reduced_constant(&self) -> f64 {
        self.rotational_constant / (self.symmetry as f64).powi(2)
    }

    /// Classical phase-space weight and its path-integral-corrected counterpart,
    /// both relative to the quantum ground level.
    pub fn semiclassical_weight(&self, temperature: f64) -> Result<(f64, f64), NumericError> {
        let n = self.grid_potential.len() as f64;
        let mut classical = 0.0;
        let mut corrected = 0.0;
        for (&v, &w) in self.grid_potential.iter().zip(&self.grid_frequency) {
            let boltzmann = (-v / temperature).exp();
            classical += boltzmann;
            corrected += boltzmann * path_integral_correction(w, temperature)?;
        }
        let prefactor =
            (PI * temperature / self.reduced_constant()).sqrt() * (self.ground / temperature).exp()
                / n;
        Ok((classical * prefactor, corrected * prefactor))
    }

    pub fn quantum_weight(&self, temperature: f64) -> Result<f64, NumericError> {
        let top = self.levels.last().copied().unwrap_or(0.0);
        if top / temperature < self.thermal_power_max {
            warn!(
                temperature,
                top_level = top,
                "Rotor level ladder too short; using the path-integral weight."
            );
            return Ok(self.semiclassical_weight(temperature)?.1);
        }
        Ok(self.levels.iter().map(|e| (-e / temperature).exp()).sum())
    }

    pub fn weight(&self, temperature: f64) -> Result<f64, NumericError> {
        match self.weight_method {
            RotorWeightMethod::Quantum => self.quantum_weight(temperature),
            RotorWeightMethod::Classical => Ok(self.semiclassical_weight(temperature)?.0),
            RotorWeightMethod::PathIntegral => Ok(self.semiclassical_weight(temperature)?.1),
        }
    }
}

pub fn build(block: &KeywordBlock, config: &ModelConfig) -> Result<Rotor, ModelError> {
    let input: HinderedRotorInput = block.parse()?;
    if !(input.rotational_constant > 0.0) {
        return Err(ModelError::out_of_range(
            block.path(),
            "rotational-constant",
            format!("must be positive, got {}", input.rotational_constant),
        ));
    }
    let descriptor =
        InternalRotation::from_parts(block.path(), input.group, input.axis, input.symmetry)?;

    let potential = match (input.potential_expansion, input.potential_samples) {
        (Some(terms), None) => {
            let map: BTreeMap<i32, f64> = terms.into_iter().collect();
            FourierSeries::from_signed_map(&map)
        }
        (None, Some(samples)) => {
            if samples.len() < 3 {
                return Err(ModelError::input(
                    block.path(),
                    "at least three potential samples are required",
                ));
            }
            let index = MultiIndex::new(vec![samples.len()])
                .map_err(|e| ModelError::input(block.path(), e.to_string()))?;
            FourierSeries::from_samples(&index, &samples)
                .map_err(|e| ModelError::input(block.path(), e.to_string()))?
        }
        (Some(_), Some(_)) => {
            return Err(ModelError::input(
                block.path(),
                "'potential-expansion' and 'potential-samples' are mutually exclusive",
            ));
        }
        (None, None) => {
            return Err(ModelError::MissingKeyword {
                block: block.path().to_string(),
                keyword: "potential-expansion",
            });
        }
    };

    let mut rotor = HinderedRotor::new(input.rotational_constant, input.symmetry, potential, config)
        .map_err(|e| ModelError::numeric(block.path(), 0.0, e))?;
    rotor.descriptor = descriptor;
    if let Some(method) = input.weight_method {
        rotor.weight_method = method;
    }
    Ok(Rotor::Hindered(rotor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::block::block_from_str;
    use crate::core::rotor::FreeRotor;
    use crate::engine::config::test_config;
    use approx::assert_relative_eq;

    fn cosine_barrier(height: f64) -> FourierSeries {
        let mut map = BTreeMap::new();
        map.insert(0, 0.5 * height);
        map.insert(1, -0.5 * height);
        FourierSeries::from_signed_map(&map)
    }

    #[test]
    fn vanishing_barrier_reproduces_free_rotor() {
        let config = test_config(1.0, 300.0);
        let hindered = HinderedRotor::new(2.0, 1, cosine_barrier(0.0), &config).unwrap();
        let free = FreeRotor::new(2.0, 1, &config);
        assert_relative_eq!(hindered.ground(), 0.0, epsilon = 1e-10);
        // The free ladder lists n once with degeneracy two; the hindered ladder lists ±n.
        for i in 1..free.level_size() {
            assert_relative_eq!(hindered.energy_level(2 * i - 1), free.energy_level(i), epsilon = 1e-9);
            assert_relative_eq!(hindered.energy_level(2 * i), free.energy_level(i), epsilon = 1e-9);
        }
        assert_relative_eq!(
            hindered.quantum_weight(5.0).unwrap(),
            free.weight(5.0),
            max_relative = 1e-9
        );
    }

    #[test]
    fn deep_well_levels_are_nearly_harmonic() {
        let config = test_config(1.0, 2000.0);
        let rotor = HinderedRotor::new(1.0, 1, cosine_barrier(400.0), &config).unwrap();
        // V ≈ (V0/4) ψ², so ω = sqrt(2 b V0 / 2) = 20.
        assert_relative_eq!(rotor.ground(), 10.0, max_relative = 0.05);
        assert_relative_eq!(rotor.energy_level(1), 20.0, max_relative = 0.05);
        assert_eq!(rotor.energy_level(0), 0.0);
    }

    #[test]
    fn path_integral_weight_tracks_quantum_weight_at_high_temperature() {
        let config = test_config(1.0, 20_000.0);
        let rotor = HinderedRotor::new(1.0, 1, cosine_barrier(400.0), &config).unwrap();
        let (classical, corrected) = rotor.semiclassical_weight(500.0).unwrap();
        let quantum = rotor.quantum_weight(500.0).unwrap();
        assert_relative_eq!(corrected, quantum, max_relative = 1e-3);
        assert!(classical > 0.0);
    }

    #[test]
    fn sampled_potential_matches_expansion() {
        let config = test_config(1.0, 500.0);
        let samples: Vec<f64> = (0..12)
            .map(|j| 150.0 * (1.0 - (2.0 * PI * j as f64 / 12.0).cos()))
            .collect();
        let block = block_from_str(
            "rotor",
            &format!("rotational-constant = 1.2\npotential-samples = {:?}", samples),
        );
        let Rotor::Hindered(sampled) = build(&block, &config).unwrap() else {
            panic!("expected a hindered rotor");
        };
        let reference = HinderedRotor::new(1.2, 1, cosine_barrier(300.0), &config).unwrap();
        for i in 0..10 {
            assert_relative_eq!(sampled.energy_level(i), reference.energy_level(i), epsilon = 1e-8);
        }
    }

    #[test]
    fn short_ladder_falls_back_to_path_integral_weight() {
        let config = test_config(1.0, 100.0);
        let rotor = HinderedRotor::new(1.0, 1, cosine_barrier(50.0), &config).unwrap();
        let (_, corrected) = rotor.semiclassical_weight(1000.0).unwrap();
        assert_eq!(rotor.quantum_weight(1000.0).unwrap(), corrected);
    }

    #[test]
    fn conflicting_potential_sources_are_rejected() {
        let config = test_config(1.0, 100.0);
        let block = block_from_str(
            "rotor",
            "rotational-constant = 1.0\npotential-expansion = [[1, 2.0]]\npotential-samples = [0.0, 1.0, 0.0]",
        );
        assert!(build(&block, &config).is_err());
    }
}
