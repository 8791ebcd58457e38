//! Perturbative anharmonic correction by graph expansion.
//!
//! The vibrational potential in dimensionless normal coordinates is
//! `Σ ω_i q_i²/2 + (1/6) Σ f_ijk q_i q_j q_k + (1/24) Σ f_ijkl q_i q_j q_k q_l`.
//! To second order the free-energy correction is the quartic loop
//! `⟨V4⟩`, the cubic dumbbell and the cubic sunset diagrams, built from the
//! harmonic propagator `G(τ) = cosh(ω(β/2 - τ)) / (2 sinh(βω/2))`.

use serde::Deserialize;
use thiserror::Error;

use crate::core::math::hyperbolic::ln_sinh;
use crate::core::mode::StatesMode;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ForceConstantInput {
    pub modes: Vec<usize>,
    pub constant: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct GraphInput {
    #[serde(default)]
    pub cubic: Vec<ForceConstantInput>,
    #[serde(default)]
    pub quartic: Vec<ForceConstantInput>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("force constant needs {expected} mode indices, got {modes:?}")]
    ModeCount { expected: usize, modes: Vec<usize> },

    #[error("mode index {index} is out of range for {size} modes")]
    ModeIndex { index: usize, size: usize },
}

#[derive(Debug, Clone)]
pub struct GraphExpansion {
    frequencies: Vec<f64>,
    /// Fully symmetric cubic tensor, row-major `n³`.
    cubic: Vec<f64>,
    /// `f_iijj`, the only quartic constants entering the first-order loop.
    loops: Vec<f64>,
    ground_shift: f64,
}

impl GraphExpansion {
    /// Builds the expansion over the modes `frequencies`; force-constant
    /// indices refer to this list. Errors name the offending entry.
    pub fn new(frequencies: Vec<f64>, input: &GraphInput) -> Result<Self, GraphError> {
        let n = frequencies.len();
        let mut cubic = vec![0.0; n * n * n];
        for entry in &input.cubic {
            let [i, j, k] = modes_of::<3>(entry, n)?;
            for (a, b, c) in [(i, j, k), (i, k, j), (j, i, k), (j, k, i), (k, i, j), (k, j, i)] {
                cubic[(a * n + b) * n + c] = entry.constant;
            }
        }

        let mut loops = vec![0.0; n * n];
        for entry in &input.quartic {
            let mut modes = modes_of::<4>(entry, n)?;
            modes.sort_unstable();
            if modes[0] == modes[1] && modes[2] == modes[3] {
                let (i, j) = (modes[0], modes[2]);
                loops[i * n + j] = entry.constant;
                loops[j * n + i] = entry.constant;
            }
        }

        let mut expansion = Self {
            frequencies,
            cubic,
            loops,
            ground_shift: 0.0,
        };
        expansion.ground_shift = expansion.zero_temperature_shift();
        Ok(expansion)
    }

    pub fn mode_size(&self) -> usize {
        self.frequencies.len()
    }

    fn f3(&self, i: usize, j: usize, k: usize) -> f64 {
        let n = self.frequencies.len();
        self.cubic[(i * n + j) * n + k]
    }

    /// Zero-point energy correction `ΔE0`, the `T → 0` limit of the free energy.
    pub fn ground_shift(&self) -> f64 {
        self.ground_shift
    }

    fn zero_temperature_shift(&self) -> f64 {
        let half = vec![0.5; self.frequencies.len()];
        let sunset = self.triples().fold(0.0, |acc, (i, j, k, f)| {
            acc + f * f / (self.frequencies[i] + self.frequencies[j] + self.frequencies[k])
        });
        self.loop_term(&half) + self.dumbbell_term(&half) - sunset / 48.0
    }

    fn triples(&self) -> impl Iterator<Item = (usize, usize, usize, f64)> + '_ {
        let n = self.frequencies.len();
        (0..n * n * n).filter_map(move |index| {
            let f = self.cubic[index];
            (f != 0.0).then(|| (index / (n * n), (index / n) % n, index % n, f))
        })
    }

    /// `(1/8) Σ_ij f_iijj s_i s_j`.
    fn loop_term(&self, s: &[f64]) -> f64 {
        let n = self.frequencies.len();
        let mut sum = 0.0;
        for i in 0..n {
            for j in 0..n {
                sum += self.loops[i * n + j] * s[i] * s[j];
            }
        }
        sum / 8.0
    }

    /// `-(1/8) Σ_k (Σ_i f_iik s_i)² / ω_k`.
    fn dumbbell_term(&self, s: &[f64]) -> f64 {
        let n = self.frequencies.len();
        let mut sum = 0.0;
        for k in 0..n {
            let tadpole: f64 = (0..n).map(|i| self.f3(i, i, k) * s[i]).sum();
            sum += tadpole * tadpole / self.frequencies[k];
        }
        -sum / 8.0
    }

    /// Imaginary-time integral of three propagators, `∫₀^β G_i G_j G_k dτ`.
    fn sunset_integral(&self, i: usize, j: usize, k: usize, beta: f64) -> f64 {
        let (a, b, c) = (self.frequencies[i], self.frequencies[j], self.frequencies[k]);
        let denominator = ln_sinh(0.5 * beta * a) + ln_sinh(0.5 * beta * b) + ln_sinh(0.5 * beta * c);
        [a + b + c, a + b - c, a - b + c, -a + b + c]
            .iter()
            .map(|&omega| {
                let omega = omega.abs();
                if omega * beta < 1e-10 {
                    0.5 * beta * (-denominator).exp()
                } else {
                    (ln_sinh(0.5 * beta * omega) - denominator).exp() / omega
                }
            })
            .sum::<f64>()
            / 16.0
    }

    /// Second-order free-energy correction at `temperature`, including `ΔE0`.
    pub fn free_energy(&self, temperature: f64) -> f64 {
        let beta = 1.0 / temperature;
        let s: Vec<f64> = self
            .frequencies
            .iter()
            .map(|w| 0.5 / (0.5 * beta * w).tanh())
            .collect();
        let sunset = self.triples().fold(0.0, |acc, (i, j, k, f)| {
            acc + f * f * self.sunset_integral(i, j, k, beta)
        });
        self.loop_term(&s) + self.dumbbell_term(&s) - sunset / 12.0
    }

    /// Multiplicative correction of a weight measured from the corrected ground.
    pub fn weight_factor(&self, temperature: f64) -> f64 {
        (-(self.free_energy(temperature) - self.ground_shift) / temperature).exp()
    }

    /// Applies the correction to a grid of states at the microcanonical
    /// temperature `1 / (d ln N / dE)` of every node.
    pub fn correct_grid(&self, states: &mut [f64], step: f64, mode: StatesMode) {
        let size = states.len();
        if size < 3 {
            return;
        }
        let number: Vec<f64> = match mode {
            StatesMode::Density => states
                .iter()
                .scan(0.0, |total, v| {
                    *total += v * step;
                    Some(*total)
                })
                .collect(),
            StatesMode::Number | StatesMode::NoStates => states.to_vec(),
        };
        let window = size.div_ceil(100).max(1);
        for k in 0..size {
            let (lo, hi) = (k.saturating_sub(window), (k + window).min(size - 1));
            if number[lo] <= 0.0 || number[hi] <= 0.0 || hi == lo {
                continue;
            }
            let beta = (number[hi] / number[lo]).ln() / (step * (hi - lo) as f64);
            if !(beta > 0.0) || !beta.is_finite() {
                continue;
            }
            states[k] *= self.weight_factor(1.0 / beta);
        }
    }
}

fn modes_of<const N: usize>(
    entry: &ForceConstantInput,
    size: usize,
) -> Result<[usize; N], GraphError> {
    let modes: [usize; N] = entry
        .modes
        .as_slice()
        .try_into()
        .map_err(|_| GraphError::ModeCount {
            expected: N,
            modes: entry.modes.clone(),
        })?;
    if let Some(&index) = modes.iter().find(|&&m| m >= size) {
        return Err(GraphError::ModeIndex { index, size });
    }
    Ok(modes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn constant(modes: &[usize], value: f64) -> ForceConstantInput {
        ForceConstantInput {
            modes: modes.to_vec(),
            constant: value,
        }
    }

    #[test]
    fn quartic_loop_has_first_order_ground_shift() {
        let input = GraphInput {
            cubic: Vec::new(),
            quartic: vec![constant(&[0, 0, 0, 0], 32.0)],
        };
        let graph = GraphExpansion::new(vec![1000.0], &input).unwrap();
        assert_relative_eq!(graph.ground_shift(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn cubic_diagrams_match_second_order_zero_point_energy() {
        // Single mode: ΔE0 = -(1/32) f²/ω - (1/48) f²/(3ω) = -(11/288) f²/ω.
        let input = GraphInput {
            cubic: vec![constant(&[0, 0, 0], 60.0)],
            quartic: Vec::new(),
        };
        let graph = GraphExpansion::new(vec![500.0], &input).unwrap();
        assert_relative_eq!(graph.ground_shift(), -11.0 / 288.0 * 3600.0 / 500.0, max_relative = 1e-12);
    }

    #[test]
    fn free_energy_tends_to_ground_shift_when_cold() {
        let input = GraphInput {
            cubic: vec![constant(&[0, 1, 1], 40.0), constant(&[0, 0, 0], -25.0)],
            quartic: vec![constant(&[0, 0, 1, 1], 12.0)],
        };
        let graph = GraphExpansion::new(vec![800.0, 300.0], &input).unwrap();
        assert_relative_eq!(graph.free_energy(5.0), graph.ground_shift(), max_relative = 1e-8);
        assert_relative_eq!(graph.weight_factor(5.0), 1.0, epsilon = 1e-8);
    }

    #[test]
    fn sunset_reaches_classical_limit_when_hot() {
        // Classical: -(β/2)⟨V3²⟩ = -(1/12) f² T² / ω³ for one mode with f_000 = f.
        let input = GraphInput {
            cubic: vec![constant(&[0, 0, 0], 3.0)],
            quartic: Vec::new(),
        };
        let graph = GraphExpansion::new(vec![1.0], &input).unwrap();
        let t = 1.0e4;
        let sunset = graph.sunset_integral(0, 0, 0, 1.0 / t) * 9.0 / 12.0;
        assert_relative_eq!(sunset, 9.0 * t * t / 12.0, max_relative = 1e-6);
    }

    #[test]
    fn out_of_range_mode_is_reported() {
        let input = GraphInput {
            cubic: vec![constant(&[0, 0, 2], 1.0)],
            quartic: Vec::new(),
        };
        assert_eq!(
            GraphExpansion::new(vec![1.0, 2.0], &input).unwrap_err(),
            GraphError::ModeIndex { index: 2, size: 2 }
        );
    }

    #[test]
    fn wrong_index_count_is_reported() {
        let input = GraphInput {
            cubic: Vec::new(),
            quartic: vec![constant(&[0, 0, 1], 0.5)],
        };
        assert_eq!(
            GraphExpansion::new(vec![1.0, 2.0], &input).unwrap_err(),
            GraphError::ModeCount {
                expected: 4,
                modes: vec![0, 0, 1]
            }
        );
    }

    #[test]
    fn grid_correction_leaves_harmonic_grid_alone_without_constants() {
        let graph = GraphExpansion::new(vec![100.0], &GraphInput::default()).unwrap();
        let mut states: Vec<f64> = (0..50).map(|k| 1.0 + k as f64).collect();
        let original = states.clone();
        graph.correct_grid(&mut states, 10.0, StatesMode::Number);
        assert_eq!(states, original);
    }
}
