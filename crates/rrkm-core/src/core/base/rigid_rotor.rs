use serde::Deserialize;
use std::f64::consts::PI;
use tracing::{debug, instrument};

use super::{Core, CoreKind, LAPLACE_SPAN_MIN};
use crate::core::io::block::KeywordBlock;
use crate::core::math::NumericError;
use crate::core::math::gamma::gamma;
use crate::core::math::tabulated::TabulatedFunction;
use crate::core::mode::StatesMode;
use crate::engine::config::ModelConfig;
use crate::engine::error::ModelError;

const ENUMERATION_LIMIT: usize = 2_000_000;
const TAIL_NODES: usize = 64;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RigidRotorInput {
    #[serde(default)]
    rotational_constants: Vec<f64>,
    #[serde(default = "unit")]
    symmetry: f64,
    #[serde(default = "unit")]
    electronic_degeneracy: f64,
    #[serde(default)]
    frequencies: Vec<f64>,
    #[serde(default)]
    degeneracies: Vec<usize>,
    #[serde(default)]
    anharmonicities: Vec<Vec<f64>>,
    #[serde(default)]
    rovibrational_couplings: Vec<Vec<f64>>,
}

fn unit() -> f64 {
    1.0
}

/// Coupled vibrational manifold enumerated level by level.
///
/// `E(v) = Σ ω_i (v_i + d_i/2) + Σ_{i≤j} x_ij (v_i + d_i/2)(v_j + d_j/2)`, and the
/// rotational constants of level `v` are `B_k - Σ_i α_ik v_i`.
#[derive(Debug, Clone, PartialEq)]
pub struct Anharmonic {
    frequencies: Vec<f64>,
    degeneracies: Vec<usize>,
    anharmonicities: Vec<Vec<f64>>,
    couplings: Vec<Vec<f64>>,
}

impl Anharmonic {
    fn raw_energy(&self, quanta: &[usize]) -> f64 {
        let shifted: Vec<f64> = quanta
            .iter()
            .zip(&self.degeneracies)
            .map(|(&v, &d)| v as f64 + 0.5 * d as f64)
            .collect();
        let mut energy: f64 = self
            .frequencies
            .iter()
            .zip(&shifted)
            .map(|(w, s)| w * s)
            .sum();
        for i in 0..shifted.len() {
            for j in i..shifted.len() {
                energy += self.anharmonicities[i][j] * shifted[i] * shifted[j];
            }
        }
        energy
    }

    pub fn zero_point_energy(&self) -> f64 {
        self.raw_energy(&vec![0; self.frequencies.len()])
    }

    fn degeneracy(&self, quanta: &[usize]) -> f64 {
        quanta
            .iter()
            .zip(&self.degeneracies)
            .map(|(&v, &d)| binomial(v + d - 1, d - 1))
            .product()
    }

    fn constants(&self, base: &[f64], quanta: &[usize]) -> Vec<f64> {
        base.iter()
            .enumerate()
            .map(|(k, b)| {
                b - quanta
                    .iter()
                    .zip(&self.couplings)
                    .map(|(&v, row)| row.get(k).copied().unwrap_or(0.0) * v as f64)
                    .sum::<f64>()
            })
            .collect()
    }

    /// Every level up to `ceiling` above the vibrational ground, as `(energy, quanta)`.
    ///
    /// Along each mode the ladder stops where the energy turns over.
    fn enumerate(&self, ceiling: f64) -> Result<Vec<(f64, Vec<usize>)>, NumericError> {
        let zero = self.zero_point_energy();
        let mut quanta = vec![0; self.frequencies.len()];
        let mut levels = Vec::new();
        self.descend(0, &mut quanta, zero, ceiling, &mut levels)?;
        Ok(levels)
    }

    fn descend(
        &self,
        mode: usize,
        quanta: &mut [usize],
        zero: f64,
        ceiling: f64,
        levels: &mut Vec<(f64, Vec<usize>)>,
    ) -> Result<(), NumericError> {
        if mode == quanta.len() {
            if levels.len() >= ENUMERATION_LIMIT {
                return Err(NumericError::IllConditioned(format!(
                    "more than {} vibrational levels below {}",
                    ENUMERATION_LIMIT, ceiling
                )));
            }
            levels.push((self.raw_energy(quanta) - zero, quanta.to_vec()));
            return Ok(());
        }
        let mut previous = f64::NEG_INFINITY;
        loop {
            let energy = self.raw_energy(quanta) - zero;
            if energy > ceiling || energy <= previous {
                break;
            }
            self.descend(mode + 1, quanta, zero, ceiling, levels)?;
            previous = energy;
            quanta[mode] += 1;
        }
        quanta[mode] = 0;
        Ok(())
    }
}

fn binomial(n: usize, k: usize) -> f64 {
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

/// Classical prefactor `f` of `N = f E^{d/2} / Γ(d/2 + 1)` for `d` rotational degrees of freedom.
fn rotational_factor(constants: &[f64]) -> f64 {
    match constants {
        [] => 1.0,
        [b] => 1.0 / b,
        _ => (PI / constants.iter().product::<f64>()).sqrt(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Level {
    energy: f64,
    weight: f64,
}

/// External rotation with an optional anharmonic vibrational manifold.
#[derive(Debug, Clone)]
pub struct RigidRotor {
    rotational_constants: Vec<f64>,
    dimension: usize,
    prefactor: f64,
    ground: f64,
    levels: Vec<Level>,
    cumulative: Vec<f64>,
    enumeration_max: f64,
    tail: Option<TabulatedFunction>,
}

impl RigidRotor {
    /// Closed-form rigid rotor; `constants` is empty, `[B]` or `[A, B, C]`.
    pub fn new(constants: Vec<f64>, symmetry: f64, electronic_degeneracy: f64) -> Self {
        let dimension = rotational_dimension(&constants);
        Self {
            prefactor: rotational_factor(&constants) * electronic_degeneracy / symmetry,
            rotational_constants: constants,
            dimension,
            ground: 0.0,
            levels: Vec::new(),
            cumulative: Vec::new(),
            enumeration_max: f64::INFINITY,
            tail: None,
        }
    }

    /// Rigid rotor carrying an enumerated vibrational manifold up to `ceiling`.
    #[instrument(skip_all, name = "rigid_rotor_enumeration", fields(modes = vibrations.frequencies.len()))]
    pub fn with_vibrations(
        constants: Vec<f64>,
        symmetry: f64,
        electronic_degeneracy: f64,
        vibrations: &Anharmonic,
        ceiling: f64,
        band: f64,
    ) -> Result<Self, NumericError> {
        let mut rotor = Self::new(constants, symmetry, electronic_degeneracy);
        let scale = electronic_degeneracy / symmetry;

        let mut levels: Vec<Level> = vibrations
            .enumerate(ceiling)?
            .into_iter()
            .filter_map(|(energy, quanta)| {
                let constants = vibrations.constants(&rotor.rotational_constants, &quanta);
                constants.iter().all(|b| *b > 0.0).then(|| Level {
                    energy,
                    weight: vibrations.degeneracy(&quanta) * rotational_factor(&constants) * scale,
                })
            })
            .collect();
        levels.sort_by(|a, b| a.energy.total_cmp(&b.energy));
        if levels.is_empty() {
            return Err(NumericError::IllConditioned(
                "no vibrational level has positive rotational constants".to_string(),
            ));
        }

        rotor.cumulative = levels
            .iter()
            .scan(0.0, |sum, level| {
                *sum += level.weight;
                Some(*sum)
            })
            .collect();
        rotor.ground = vibrations.zero_point_energy();
        rotor.levels = levels;
        rotor.enumeration_max = ceiling;

        let nodes: Vec<f64> = (1..=TAIL_NODES)
            .map(|j| ceiling * j as f64 / TAIL_NODES as f64)
            .collect();
        let values: Vec<f64> = nodes.iter().map(|&e| rotor.direct_number(e)).collect();
        rotor.tail = Some(TabulatedFunction::power_law(nodes, values, band)?);
        debug!(
            levels = rotor.levels.len(),
            zero_point = rotor.ground,
            "Enumerated anharmonic vibrational levels."
        );
        Ok(rotor)
    }

    pub fn rotational_constants(&self) -> &[f64] {
        &self.rotational_constants
    }

    /// Zero-point energy of the enumerated manifold; zero for a bare rotor.
    pub fn ground(&self) -> f64 {
        self.ground
    }

    pub fn is_discrete(&self) -> bool {
        self.dimension == 0
    }

    pub fn level_size(&self) -> usize {
        self.levels.len()
    }

    fn half_dimension(&self) -> f64 {
        0.5 * self.dimension as f64
    }

    fn direct_number(&self, energy: f64) -> f64 {
        let count = self.levels.partition_point(|l| l.energy <= energy);
        if self.dimension == 0 {
            return if count == 0 { 0.0 } else { self.cumulative[count - 1] };
        }
        let p = self.half_dimension();
        self.levels[..count]
            .iter()
            .map(|l| l.weight * (energy - l.energy).powf(p))
            .sum::<f64>()
            / gamma(p + 1.0)
    }

    fn direct_density(&self, energy: f64) -> f64 {
        let count = self.levels.partition_point(|l| l.energy <= energy);
        let p = self.half_dimension();
        self.levels[..count]
            .iter()
            .map(|l| l.weight * (energy - l.energy).powf(p - 1.0))
            .sum::<f64>()
            / gamma(p)
    }

    pub fn number(&self, energy: f64) -> Result<f64, NumericError> {
        if self.levels.is_empty() {
            let p = self.half_dimension();
            return Ok(self.prefactor * energy.powf(p) / gamma(p + 1.0));
        }
        match &self.tail {
            Some(tail) if energy > self.enumeration_max => tail.value(energy),
            _ => Ok(self.direct_number(energy)),
        }
    }

    pub fn density(&self, energy: f64) -> Result<f64, NumericError> {
        if self.dimension == 0 {
            return Err(NumericError::IllConditioned(
                "a discrete spectrum has no density of states".to_string(),
            ));
        }
        if self.levels.is_empty() {
            let p = self.half_dimension();
            return Ok(self.prefactor * energy.powf(p - 1.0) / gamma(p));
        }
        match &self.tail {
            Some(tail) if energy > self.enumeration_max => tail.derivative(energy),
            _ => Ok(self.direct_density(energy)),
        }
    }

    /// Canonical weight; an enumerated manifold must reach `25 T` above its ground.
    pub fn weight(&self, temperature: f64) -> Result<f64, NumericError> {
        let rotation = temperature.powf(self.half_dimension());
        if self.levels.is_empty() {
            return Ok(self.prefactor * rotation);
        }
        if self.enumeration_max < LAPLACE_SPAN_MIN * temperature {
            return Err(NumericError::OutOfRange {
                x: temperature,
                min: 0.0,
                max: self.enumeration_max / LAPLACE_SPAN_MIN,
            });
        }
        Ok(rotation
            * self
                .levels
                .iter()
                .map(|l| l.weight * (-l.energy / temperature).exp())
                .sum::<f64>())
    }
}

fn rotational_dimension(constants: &[f64]) -> usize {
    match constants.len() {
        0 => 0,
        1 => 2,
        _ => 3,
    }
}

/// Expands lower-triangular or full square rows into a symmetric matrix.
fn square_matrix(
    block: &KeywordBlock,
    rows: &[Vec<f64>],
    n: usize,
) -> Result<Vec<Vec<f64>>, ModelError> {
    if rows.len() != n {
        return Err(ModelError::input(
            block.path(),
            format!("'anharmonicities' needs {} rows, got {}", n, rows.len()),
        ));
    }
    let triangular = rows.iter().enumerate().all(|(i, row)| row.len() == i + 1);
    let full = rows.iter().all(|row| row.len() == n);
    if !triangular && !full {
        return Err(ModelError::input(
            block.path(),
            "'anharmonicities' must be lower-triangular or square",
        ));
    }
    let mut matrix = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let value = rows[i][j];
            if full && (rows[j][i] - value).abs() > 1e-10 * value.abs().max(1.0) {
                return Err(ModelError::input(
                    block.path(),
                    format!("'anharmonicities' is not symmetric at ({}, {})", i, j),
                ));
            }
            matrix[i][j] = value;
            matrix[j][i] = value;
        }
    }
    Ok(matrix)
}

pub fn build(
    block: &KeywordBlock,
    mode: StatesMode,
    config: &ModelConfig,
) -> Result<Core, ModelError> {
    let input: RigidRotorInput = block.parse()?;
    let path = block.path();

    if !matches!(input.rotational_constants.len(), 0 | 1 | 3) {
        return Err(ModelError::input(
            path,
            format!(
                "'rotational-constants' takes 0, 1 or 3 values, got {}",
                input.rotational_constants.len()
            ),
        ));
    }
    if let Some(b) = input.rotational_constants.iter().find(|b| !(**b > 0.0)) {
        return Err(ModelError::out_of_range(
            path,
            "rotational-constants",
            format!("must be positive, got {}", b),
        ));
    }
    if !(input.symmetry > 0.0) {
        return Err(ModelError::out_of_range(
            path,
            "symmetry",
            format!("must be positive, got {}", input.symmetry),
        ));
    }
    if !(input.electronic_degeneracy > 0.0) {
        return Err(ModelError::out_of_range(
            path,
            "electronic-degeneracy",
            format!("must be positive, got {}", input.electronic_degeneracy),
        ));
    }

    if input.frequencies.is_empty() {
        if !input.anharmonicities.is_empty()
            || !input.degeneracies.is_empty()
            || !input.rovibrational_couplings.is_empty()
        {
            return Err(ModelError::MissingKeyword {
                block: path.to_string(),
                keyword: "frequencies",
            });
        }
        return Ok(Core::new(
            mode,
            CoreKind::RigidRotor(RigidRotor::new(
                input.rotational_constants,
                input.symmetry,
                input.electronic_degeneracy,
            )),
        ));
    }

    let n = input.frequencies.len();
    if let Some(w) = input.frequencies.iter().find(|w| !(**w > 0.0)) {
        return Err(ModelError::out_of_range(
            path,
            "frequencies",
            format!("must be positive, got {}", w),
        ));
    }
    let degeneracies = if input.degeneracies.is_empty() {
        vec![1; n]
    } else {
        input.degeneracies
    };
    if degeneracies.len() != n || degeneracies.contains(&0) {
        return Err(ModelError::input(
            path,
            format!("'degeneracies' needs {} positive entries", n),
        ));
    }
    let anharmonicities = if input.anharmonicities.is_empty() {
        vec![vec![0.0; n]; n]
    } else {
        square_matrix(block, &input.anharmonicities, n)?
    };
    let couplings = if input.rovibrational_couplings.is_empty() {
        vec![vec![0.0; input.rotational_constants.len()]; n]
    } else {
        input.rovibrational_couplings
    };
    if couplings.len() != n
        || couplings
            .iter()
            .any(|row| row.len() != input.rotational_constants.len())
    {
        return Err(ModelError::input(
            path,
            format!(
                "'rovibrational-couplings' needs {} rows of {} values",
                n,
                input.rotational_constants.len()
            ),
        ));
    }

    let vibrations = Anharmonic {
        frequencies: input.frequencies,
        degeneracies,
        anharmonicities,
        couplings,
    };
    let rotor = RigidRotor::with_vibrations(
        input.rotational_constants,
        input.symmetry,
        input.electronic_degeneracy,
        &vibrations,
        config.interpolation_energy_max,
        config.extrapolation_band,
    )
    .map_err(|e| ModelError::numeric(path, config.interpolation_energy_max, e))?;
    Ok(Core::new(mode, CoreKind::RigidRotor(rotor)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::block::block_from_str;
    use crate::engine::config::test_config;
    use approx::assert_relative_eq;

    fn core(content: &str, ceiling: f64) -> Core {
        let block = block_from_str("core", content);
        build(&block, StatesMode::Number, &test_config(1.0, ceiling)).unwrap()
    }

    #[test]
    fn bare_core_is_a_unit_step_scaled_by_degeneracy() {
        let core = core("electronic-degeneracy = 2.0\nsymmetry = 2.0", 100.0);
        assert!(core.is_discrete());
        assert_eq!(core.number(0.0).unwrap(), 1.0);
        assert_eq!(core.number(50.0).unwrap(), 1.0);
        assert_eq!(core.number(-1.0).unwrap(), 0.0);
        assert_eq!(core.weight(300.0).unwrap(), 1.0);
    }

    #[test]
    fn nonlinear_rotor_is_closed_form() {
        let core = core("rotational-constants = [1.0, 2.0, 3.0]\nsymmetry = 2.0", 100.0);
        let t: f64 = 50.0;
        let expected = (PI * t.powi(3) / 6.0).sqrt() / 2.0;
        assert_relative_eq!(core.weight(t).unwrap(), expected, max_relative = 1e-12);
        let e: f64 = 10.0;
        let number = (PI / 6.0).sqrt() * e.powf(1.5) / gamma(2.5) / 2.0;
        assert_relative_eq!(core.number(e).unwrap(), number, max_relative = 1e-12);
    }

    #[test]
    fn anharmonic_oscillator_counts_levels_as_a_staircase() {
        // E(v) - E(0) = 99 v - v².
        let core = core("frequencies = [100.0]\nanharmonicities = [[-1.0]]", 1000.0);
        assert_eq!(core.number(250.0).unwrap(), 3.0);
        assert_relative_eq!(core.ground(), 50.0 - 0.25, max_relative = 1e-12);
    }

    #[test]
    fn ladder_stops_at_turnover() {
        // E(v) - E(0) = 90 v - 10 v² peaks at v = 4.5.
        let core = core("frequencies = [100.0]\nanharmonicities = [[-10.0]]", 1000.0);
        assert_eq!(core.number(999.0).unwrap(), 5.0);
    }

    #[test]
    fn linear_rotor_sums_vibrational_manifolds() {
        let core = core("rotational-constants = [2.0]\nfrequencies = [100.0]", 1000.0);
        assert_relative_eq!(core.number(250.0).unwrap(), 225.0, max_relative = 1e-12);
    }

    #[test]
    fn degenerate_mode_multiplies_level_counts() {
        let core = core("frequencies = [100.0]\ndegeneracies = [2]", 1000.0);
        assert_eq!(core.number(250.0).unwrap(), 6.0);
    }

    #[test]
    fn enumerated_weight_matches_harmonic_partition_function() {
        let core = core("frequencies = [100.0]", 3000.0);
        let expected = 1.0 / (1.0 - (-1.0_f64).exp());
        assert_relative_eq!(core.weight(100.0).unwrap(), expected, max_relative = 1e-10);
    }

    #[test]
    fn tail_continues_beyond_enumeration_ceiling() {
        let core = core("rotational-constants = [2.0]\nfrequencies = [100.0]", 500.0);
        assert_relative_eq!(core.number(520.0).unwrap(), 810.0, max_relative = 2e-2);
    }

    #[test]
    fn rovibrational_coupling_changes_level_weights() {
        // B_v = 2 - 0.5 v, so the v = 1 manifold carries 1/1.5 per unit energy.
        let core = core(
            "rotational-constants = [2.0]\nfrequencies = [100.0]\nrovibrational-couplings = [[0.5]]",
            1000.0,
        );
        let expected = 150.0 / 2.0 + 50.0 / 1.5;
        assert_relative_eq!(core.number(150.0).unwrap(), expected, max_relative = 1e-12);
    }

    #[test]
    fn triangular_and_square_anharmonicities_agree() {
        let triangular = core(
            "frequencies = [100.0, 150.0]\nanharmonicities = [[-1.0], [-2.0, -1.5]]",
            1000.0,
        );
        let square = core(
            "frequencies = [100.0, 150.0]\nanharmonicities = [[-1.0, -2.0], [-2.0, -1.5]]",
            1000.0,
        );
        for e in [0.0, 120.0, 333.0, 777.0] {
            assert_eq!(triangular.number(e).unwrap(), square.number(e).unwrap());
        }
        assert_eq!(triangular.ground(), square.ground());
    }

    #[test]
    fn anharmonicities_without_frequencies_are_rejected() {
        let block = block_from_str("core", "anharmonicities = [[-1.0]]");
        let result = build(&block, StatesMode::Number, &test_config(1.0, 100.0));
        assert!(matches!(result, Err(ModelError::MissingKeyword { keyword: "frequencies", .. })));
    }

    #[test]
    fn two_rotational_constants_are_rejected() {
        let block = block_from_str("core", "rotational-constants = [1.0, 2.0]");
        let result = build(&block, StatesMode::Number, &test_config(1.0, 100.0));
        assert!(matches!(result, Err(ModelError::Input { .. })));
    }

    #[test]
    fn weight_beyond_the_enumerated_manifold_is_out_of_range() {
        // Levels up to 1000 hold only 89% of the harmonic weight at T = 500.
        let core = core("frequencies = [100.0]\nanharmonicities = [[0.0]]", 1000.0);
        assert!(matches!(
            core.weight(500.0),
            Err(NumericError::OutOfRange { max, .. }) if max == 40.0
        ));
        let expected = 1.0 / (1.0 - (-2.5_f64).exp());
        assert_relative_eq!(core.weight(40.0).unwrap(), expected, max_relative = 1e-9);
    }
}
