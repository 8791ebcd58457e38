use nalgebra::{DMatrix, DVector, SymmetricEigen};
use serde::Deserialize;
use std::f64::consts::PI;
use tracing::{debug, warn};

use super::{Rotor, path_integral_correction};
use crate::core::io::block::KeywordBlock;
use crate::core::math::NumericError;
use crate::engine::config::{ModelConfig, RotorWeightMethod};
use crate::engine::error::ModelError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct UmbrellaInput {
    mass: f64,
    potential_coefficients: Option<Vec<f64>>,
    potential_samples: Option<Vec<(f64, f64)>>,
    fit_order: Option<usize>,
    weight_method: Option<RotorWeightMethod>,
}

/// `∫₀¹ x^power cos(harmonic·π·x) dx` in closed form.
pub fn cosine_moment(power: usize, harmonic: usize) -> f64 {
    if harmonic == 0 {
        return 1.0 / (power as f64 + 1.0);
    }
    let k = harmonic as f64 * PI;
    let parity = if harmonic % 2 == 0 { 1.0 } else { -1.0 };
    // Alternate between the cosine moment I_q and the sine moment J_q.
    let mut cosine = 0.0;
    let mut sine = (1.0 - parity) / k;
    for q in 1..=power {
        let next_cosine = -(q as f64 / k) * sine;
        let next_sine = -parity / k + (q as f64 / k) * cosine;
        cosine = next_cosine;
        sine = next_sine;
    }
    cosine
}

/// Inversion (umbrella) mode with an even-power potential `Σ c_p x^{2p}` on `[-1, 1]`.
#[derive(Debug, Clone)]
pub struct Umbrella {
    mass: f64,
    coefficients: Vec<f64>,
    grid_potential: Vec<f64>,
    grid_frequency: Vec<f64>,
    ground: f64,
    levels: Vec<f64>,
    weight_method: RotorWeightMethod,
    thermal_power_max: f64,
}

fn evaluate(coefficients: &[f64], x: f64) -> (f64, f64) {
    let x2 = x * x;
    let mut value = 0.0;
    let mut curvature = 0.0;
    for (i, c) in coefficients.iter().enumerate() {
        let p = 2 * (i + 1);
        value += c * x2.powi(i as i32 + 1);
        curvature += c * (p * (p - 1)) as f64 * x2.powi(i as i32);
    }
    (value, curvature)
}

/// Least-squares fit of even-power coefficients `c_1..c_order` to sampled points.
pub fn fit_coefficients(samples: &[(f64, f64)], order: usize) -> Result<Vec<f64>, NumericError> {
    if order == 0 || samples.len() < order {
        return Err(NumericError::IllConditioned(format!(
            "cannot fit {} coefficients to {} samples",
            order,
            samples.len()
        )));
    }
    let design = DMatrix::from_fn(samples.len(), order, |r, c| {
        samples[r].0.powi(2 * (c as i32 + 1))
    });
    let rhs = DVector::from_iterator(samples.len(), samples.iter().map(|s| s.1));
    let solution = design
        .svd(true, true)
        .solve(&rhs, 1e-12)
        .map_err(|e| NumericError::IllConditioned(e.to_string()))?;
    Ok(solution.iter().copied().collect())
}

impl Umbrella {
    pub fn new(
        mass: f64,
        coefficients: Vec<f64>,
        config: &ModelConfig,
    ) -> Result<Self, NumericError> {
        let grid_size = config.rotor.grid_size;
        let points: Vec<(f64, f64)> = (0..grid_size)
            .map(|j| evaluate(&coefficients, -1.0 + 2.0 * j as f64 / grid_size as f64))
            .collect();
        let minimum = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
        let grid_potential: Vec<f64> = points.iter().map(|p| p.0 - minimum).collect();
        let grid_frequency: Vec<f64> = points
            .iter()
            .map(|p| p.1.signum() * (p.1.abs() / mass).sqrt())
            .collect();
        let maximum = grid_potential.iter().copied().fold(0.0, f64::max);

        let ceiling = config.rotor_level_max();
        let needed = ((2.0 * mass * (ceiling + maximum)).sqrt() / PI).ceil() as usize + 2;
        let dim = (2 * needed + 1).clamp(config.rotor.ham_size_min, config.rotor.ham_size_max);
        if 2 * needed + 1 > config.rotor.ham_size_max {
            warn!(
                needed = 2 * needed + 1,
                cap = config.rotor.ham_size_max,
                "Umbrella basis capped; high levels will be missing."
            );
        }
        let half = (dim.max(1) - 1) / 2;
        let dim = 2 * half + 1;

        let moments: Vec<f64> = (0..dim)
            .map(|k| {
                coefficients
                    .iter()
                    .enumerate()
                    .map(|(i, c)| c * cosine_moment(2 * (i + 1), k))
                    .sum()
            })
            .collect();
        let hamiltonian = DMatrix::from_fn(dim, dim, |r, c| {
            let mut element = moments[r.abs_diff(c)];
            if r == c {
                let n = (r as f64) - half as f64;
                element += (PI * n).powi(2) / (2.0 * mass) - minimum;
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
        let reliable = ceiling.min((PI * half as f64).powi(2) / (2.0 * mass));
        let levels: Vec<f64> = energies
            .iter()
            .map(|e| e - ground)
            .take_while(|e| *e <= reliable)
            .collect();
        debug!(basis = dim, levels = levels.len(), ground, "Umbrella mode diagonalized.");

        Ok(Self {
            mass,
            coefficients,
            grid_potential,
            grid_frequency,
            ground,
            levels,
            weight_method: config.rotor.weight_method,
            thermal_power_max: config.rotor.thermal_power_max,
        })
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
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

    /// Classical and path-integral-corrected weights relative to the ground level.
    pub fn semiclassical_weight(&self, temperature: f64) -> Result<(f64, f64), NumericError> {
        let n = self.grid_potential.len() as f64;
        let mut classical = 0.0;
        let mut corrected = 0.0;
        for (&v, &w) in self.grid_potential.iter().zip(&self.grid_frequency) {
            let boltzmann = (-v / temperature).exp();
            classical += boltzmann;
            corrected += boltzmann * path_integral_correction(w, temperature)?;
        }
        // Phase-space measure dx dp / 2π over a coordinate interval of length two.
        let prefactor = (self.mass * temperature / (2.0 * PI)).sqrt()
            * (self.ground / temperature).exp()
            * 2.0
            / n;
        Ok((classical * prefactor, corrected * prefactor))
    }

    pub fn weight(&self, temperature: f64) -> Result<f64, NumericError> {
        match self.weight_method {
            RotorWeightMethod::Quantum => {
                let top = self.levels.last().copied().unwrap_or(0.0);
                if top / temperature < self.thermal_power_max {
                    warn!(
                        temperature,
                        top_level = top,
                        "Umbrella level ladder too short; using the path-integral weight."
                    );
                    return Ok(self.semiclassical_weight(temperature)?.1);
                }
                Ok(self.levels.iter().map(|e| (-e / temperature).exp()).sum())
            }
            RotorWeightMethod::Classical => Ok(self.semiclassical_weight(temperature)?.0),
            RotorWeightMethod::PathIntegral => Ok(self.semiclassical_weight(temperature)?.1),
        }
    }
}

pub fn build(block: &KeywordBlock, config: &ModelConfig) -> Result<Rotor, ModelError> {
    let input: UmbrellaInput = block.parse()?;
    if !(input.mass > 0.0) {
        return Err(ModelError::out_of_range(
            block.path(),
            "mass",
            format!("must be positive, got {}", input.mass),
        ));
    }
    let coefficients = match (input.potential_coefficients, input.potential_samples) {
        (Some(coefficients), None) if !coefficients.is_empty() => coefficients,
        (None, Some(samples)) => {
            let order = input.fit_order.unwrap_or(4).min(samples.len());
            fit_coefficients(&samples, order)
                .map_err(|e| ModelError::numeric(block.path(), 0.0, e))?
        }
        (Some(_), Some(_)) => {
            return Err(ModelError::input(
                block.path(),
                "'potential-coefficients' and 'potential-samples' are mutually exclusive",
            ));
        }
        _ => {
            return Err(ModelError::MissingKeyword {
                block: block.path().to_string(),
                keyword: "potential-coefficients",
            });
        }
    };
    let mut rotor = Umbrella::new(input.mass, coefficients, config)
        .map_err(|e| ModelError::numeric(block.path(), 0.0, e))?;
    if let Some(method) = input.weight_method {
        rotor.weight_method = method;
    }
    Ok(Rotor::Umbrella(rotor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::block::block_from_str;
    use crate::core::math::quadrature::simpson_fn;
    use crate::engine::config::test_config;
    use approx::assert_relative_eq;

    #[test]
    fn cosine_moment_known_value() {
        assert_relative_eq!(cosine_moment(2, 1), -2.0 / (PI * PI), epsilon = 1e-14);
        assert_relative_eq!(cosine_moment(3, 0), 0.25, epsilon = 1e-15);
        assert_eq!(cosine_moment(0, 4), 0.0);
    }

    #[test]
    fn cosine_moment_matches_quadrature() {
        for (p, n) in [(1, 1), (2, 3), (4, 2), (6, 5), (8, 1)] {
            let numeric = simpson_fn(
                |x| x.powi(p as i32) * (n as f64 * PI * x).cos(),
                0.0,
                1.0,
                2000,
            );
            assert_relative_eq!(cosine_moment(p, n), numeric, epsilon = 1e-10);
        }
    }

    #[test]
    fn stiff_quadratic_well_has_harmonic_spacing() {
        let config = test_config(1.0, 2000.0);
        let rotor = Umbrella::new(1.0, vec![5000.0], &config).unwrap();
        // ω = sqrt(2c/μ) = 100.
        assert_relative_eq!(rotor.ground(), 50.0, max_relative = 1e-3);
        assert_relative_eq!(rotor.energy_level(1), 100.0, max_relative = 1e-3);
        assert_relative_eq!(rotor.energy_level(2), 200.0, max_relative = 1e-3);
    }

    #[test]
    fn fit_recovers_even_polynomial() {
        let samples: Vec<(f64, f64)> = (0..11)
            .map(|i| {
                let x = -1.0 + 0.2 * i as f64;
                (x, -300.0 * x * x + 900.0 * x.powi(4))
            })
            .collect();
        let fitted = fit_coefficients(&samples, 2).unwrap();
        assert_relative_eq!(fitted[0], -300.0, epsilon = 1e-8);
        assert_relative_eq!(fitted[1], 900.0, epsilon = 1e-8);
    }

    #[test]
    fn double_well_ground_lies_above_potential_minimum() {
        let config = test_config(1.0, 1000.0);
        let block = block_from_str("umbrella", "mass = 2.0\npotential-coefficients = [-400.0, 400.0]");
        let Rotor::Umbrella(rotor) = build(&block, &config).unwrap() else {
            panic!("expected an umbrella mode");
        };
        assert!(rotor.ground() > 0.0);
        assert_eq!(rotor.energy_level(0), 0.0);
        assert!(rotor.weight(300.0).unwrap() > 1.0);
    }
}
