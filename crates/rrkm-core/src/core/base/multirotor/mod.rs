//! Coupled internal rotations.
//!
//! Quantum levels come from a plane-wave diagonalization split by symmetry
//! sectors. The reported count is the classical phase-space integral times a
//! quantum correction factor `qf = N_q / N_cl`, where `N_q` is a monotone
//! interpolation of the level staircase. The count is therefore exact at the
//! level clusters, never below the staircase in between, and classical far
//! above the levels.

mod classical;
mod hamiltonian;

use itertools::Itertools;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::Deserialize;
use std::f64::consts::PI;
use tracing::{debug, info, instrument, warn};

use super::{Core, CoreKind, laplace_weight};
use crate::core::io::block::KeywordBlock;
use crate::core::math::NumericError;
use crate::core::math::fourier::{FourierSeries, MultiIndex, RealTerm};
use crate::core::math::gamma::gamma;
use crate::core::math::spline::MonotoneCubic;
use crate::core::math::tabulated::TabulatedFunction;
use crate::core::mode::StatesMode;
use crate::core::rotor::free::default_symmetry;
use crate::core::rotor::internal_rotation::{InternalRotation, RotationSampling};
use crate::engine::config::ModelConfig;
use crate::engine::error::ModelError;
use classical::{ExternalRotation, PhaseSpaceGrid};
use hamiltonian::PlaneWaveProblem;

const CLASSICAL_NODES: usize = 512;
const MANIFOLD_LIMIT: usize = 10_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct MultiRotorInput {
    internal_rotations: Vec<RotationInput>,
    #[serde(default = "unit")]
    external_symmetry: f64,
    potential: TorusInput,
    #[serde(default)]
    frequencies: Vec<TorusInput>,
    mobility: Vec<MobilityInput>,
    external_rotation_factor: Option<TorusInput>,
    level_energy_max: Option<f64>,
    full_quantum: Option<bool>,
    external_rotation: Option<bool>,
}

fn unit() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RotationInput {
    group: Vec<usize>,
    axis: [usize; 2],
    #[serde(default = "default_symmetry")]
    symmetry: u32,
    #[serde(default)]
    sampling: RotationSampling,
}

/// A function on the torus as the sum of a constant, real terms and samples
/// on the sampling grid; at least one part must be present.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct TorusInput {
    constant: Option<f64>,
    #[serde(default)]
    terms: Vec<TermInput>,
    samples: Option<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct TermInput {
    harmonics: Vec<i32>,
    #[serde(default)]
    cos: f64,
    #[serde(default)]
    sin: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct MobilityInput {
    element: [usize; 2],
    constant: Option<f64>,
    #[serde(default)]
    terms: Vec<TermInput>,
    samples: Option<Vec<f64>>,
}

impl TorusInput {
    fn series(
        self,
        block: &str,
        name: &str,
        grid: &MultiIndex,
        bounds: &[usize],
        tolerance: f64,
    ) -> Result<FourierSeries, ModelError> {
        let dim = grid.rank();
        if self.constant.is_none() && self.terms.is_empty() && self.samples.is_none() {
            return Err(ModelError::input(
                block,
                format!("'{}' needs a constant, terms or samples", name),
            ));
        }
        let invalid = |e: NumericError| ModelError::input(block, format!("'{}': {}", name, e));
        let mut series = match &self.samples {
            Some(samples) => FourierSeries::from_samples(grid, samples).map_err(invalid)?,
            None => FourierSeries::constant(dim, 0.0),
        };
        if !self.terms.is_empty() {
            let terms: Vec<RealTerm> = self
                .terms
                .into_iter()
                .map(|t| RealTerm {
                    harmonics: t.harmonics,
                    cos: t.cos,
                    sin: t.sin,
                })
                .collect();
            series = series.add(&FourierSeries::from_real_terms(dim, &terms).map_err(invalid)?);
        }
        if let Some(constant) = self.constant {
            series = series.add(&FourierSeries::constant(dim, constant));
        }
        Ok(series.truncated(bounds).pruned(tolerance))
    }
}

/// One eigenstate of a sector Hamiltonian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantumLevel {
    /// Energy relative to the potential minimum once stored in a [`MultiRotor`].
    pub energy: f64,
    /// `⟨ψ| sqrt(det I_ext,eff) |ψ⟩`, or one without external rotation.
    pub external_factor: f64,
}

/// Torus description of a coupled rotor system, in reduced angles `ψ_i = σ_i φ_i`.
#[derive(Debug, Clone)]
pub struct TorusModel {
    pub rotations: Vec<InternalRotation>,
    pub potential: FourierSeries,
    pub frequencies: Vec<FourierSeries>,
    /// Symmetric inverse inertia tensor `G_ij`.
    pub mobility: Vec<Vec<FourierSeries>>,
    pub external_factor: Option<FourierSeries>,
    pub external_symmetry: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultiRotorOptions {
    pub level_energy_max: f64,
    pub full_quantum: bool,
    pub external_rotation: bool,
}

#[derive(Debug, Clone)]
pub struct MultiRotor {
    rotations: Vec<InternalRotation>,
    external_rotation: bool,
    potential_minimum: f64,
    ground: f64,
    levels: Vec<QuantumLevel>,
    classical: TabulatedFunction,
    correction: QuantumCorrection,
}

impl MultiRotor {
    #[instrument(skip_all, name = "multirotor_setup", fields(rotors = model.rotations.len()))]
    pub fn new(
        model: TorusModel,
        options: MultiRotorOptions,
        config: &ModelConfig,
    ) -> Result<Self, NumericError> {
        let symmetries: Vec<u32> = model.rotations.iter().map(|r| r.symmetry()).collect();
        let sampling: Vec<RotationSampling> =
            model.rotations.iter().map(|r| *r.sampling()).collect();
        let grid = MultiIndex::new(sampling.iter().map(|s| s.grid_size).collect())?;
        let ceiling = options.level_energy_max;

        let manifolds =
            vibrational_manifolds(&model.frequencies, &grid, ceiling, options.full_quantum)?;
        let potentials: Vec<FourierSeries> = manifolds
            .iter()
            .map(|quanta| {
                model
                    .frequencies
                    .iter()
                    .zip(quanta)
                    .fold(model.potential.clone(), |acc, (w, &n)| {
                        acc.add(&w.clone().scaled(n as f64 + 0.5))
                    })
            })
            .collect();
        let grid_potentials: Vec<Vec<f64>> =
            potentials.iter().map(|v| v.on_grid(&grid)).collect();
        let minimum = grid_potentials[0].iter().copied().fold(f64::INFINITY, f64::min);
        let maximum = grid_potentials
            .iter()
            .flatten()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);

        let external = if options.external_rotation {
            match &model.external_factor {
                Some(factor) => Some(factor),
                None => {
                    return Err(NumericError::IllConditioned(
                        "external rotation requested without an external rotation factor"
                            .to_string(),
                    ));
                }
            }
        } else {
            None
        };

        let cutoff = ceiling + (maximum - minimum);
        let bounds: Vec<i32> = model
            .mobility
            .iter()
            .enumerate()
            .zip(&sampling)
            .zip(&symmetries)
            .map(|(((i, row), s), &sigma)| {
                let g = row[i].constant_term();
                let needed = (2.0 * cutoff / g).sqrt() / sigma as f64;
                let size = (needed.ceil() as usize).clamp(s.quantum_size_min, s.quantum_size_max);
                if (needed.ceil() as usize) > s.quantum_size_max {
                    warn!(
                        rotor = i,
                        needed = needed.ceil(),
                        cap = s.quantum_size_max,
                        "Multi-rotor basis capped; high levels will be missing."
                    );
                }
                (size as u32 * sigma) as i32
            })
            .collect();

        let problem = PlaneWaveProblem {
            symmetries: &symmetries,
            mobility: &model.mobility,
            external,
            bounds: &bounds,
        };
        let sectors = MultiIndex::new(symmetries.iter().map(|&s| s as usize).collect())?;
        let work: Vec<(usize, Vec<usize>)> = (0..potentials.len())
            .cartesian_product(0..sectors.len())
            .map(|(manifold, sector)| (manifold, sectors.to_multi(sector)))
            .collect();
        debug!(
            manifolds = potentials.len(),
            sectors = sectors.len(),
            bounds = ?bounds,
            "Diagonalizing multi-rotor sectors."
        );

        #[cfg(not(feature = "parallel"))]
        let iterator = work.iter();

        #[cfg(feature = "parallel")]
        let iterator = work.par_iter();

        let blocks: Vec<Vec<QuantumLevel>> = iterator
            .map(|(manifold, residues)| problem.solve(&potentials[*manifold], residues))
            .collect();

        let mut levels: Vec<QuantumLevel> = blocks
            .into_iter()
            .flatten()
            .map(|l| QuantumLevel {
                energy: l.energy - minimum,
                ..l
            })
            .filter(|l| l.energy <= ceiling)
            .collect();
        levels.sort_by(|a, b| a.energy.total_cmp(&b.energy));
        let Some(first) = levels.first() else {
            return Err(NumericError::IllConditioned(format!(
                "no multi-rotor level below {}",
                ceiling
            )));
        };
        let ground = first.energy;

        let phase_space = PhaseSpaceGrid::new(
            &grid,
            &symmetries,
            &grid_potentials
                .iter()
                .map(|g| g.iter().map(|v| v - minimum).collect())
                .collect::<Vec<Vec<f64>>>(),
            &model.mobility,
            external.map(|factor| ExternalRotation {
                factor,
                symmetry: model.external_symmetry,
            }),
        )?;
        let energy_max = config.interpolation_energy_max + ground + config.energy_step;
        let classical = phase_space.tabulate(energy_max, CLASSICAL_NODES, config.extrapolation_band)?;

        let symmetry_product: f64 = symmetries.iter().map(|&s| s as f64).product();
        let correction = QuantumCorrection::new(
            &levels,
            &classical,
            symmetry_product,
            external.map(|_| model.external_symmetry),
            0.5 * config.energy_step,
            config.extrapolation_band,
        )?;

        info!(
            levels = levels.len(),
            ground,
            "Multi-rotor set up."
        );
        Ok(Self {
            rotations: model.rotations,
            external_rotation: external.is_some(),
            potential_minimum: minimum,
            ground,
            levels,
            classical,
            correction,
        })
    }

    pub fn rotations(&self) -> &[InternalRotation] {
        &self.rotations
    }

    pub fn has_external_rotation(&self) -> bool {
        self.external_rotation
    }

    /// Minimum of the ground-manifold potential on the sampling grid.
    pub fn potential_minimum(&self) -> f64 {
        self.potential_minimum
    }

    /// Lowest quantum level above the potential minimum.
    pub fn ground(&self) -> f64 {
        self.ground
    }

    pub fn level_size(&self) -> usize {
        self.levels.len()
    }

    /// Level `i` relative to the potential minimum.
    pub fn level_energy(&self, i: usize) -> f64 {
        self.levels[i].energy
    }

    pub fn classical_number(&self, energy: f64) -> Result<f64, NumericError> {
        if energy <= 0.0 {
            return Ok(0.0);
        }
        self.classical.value(energy)
    }

    /// Quantum correction factor at `energy` above the potential minimum.
    pub fn correction_factor(&self, energy: f64) -> Result<f64, NumericError> {
        self.correction.factor(energy, &self.classical)
    }

    /// Corrected count at `energy` above [`MultiRotor::ground`].
    pub fn number(&self, energy: f64) -> Result<f64, NumericError> {
        self.correction.number(energy + self.ground, &self.classical)
    }

    pub fn density(&self, energy: f64) -> Result<f64, NumericError> {
        self.correction.density(energy + self.ground, &self.classical)
    }

    pub fn weight(&self, temperature: f64) -> Result<f64, NumericError> {
        let limit = self.classical.upper_limit().min(self.correction.upper_limit()) - self.ground;
        laplace_weight(|e| self.number(e), temperature, limit)
    }
}

/// Occupation vectors of the vibrational manifolds treated explicitly.
fn vibrational_manifolds(
    frequencies: &[FourierSeries],
    grid: &MultiIndex,
    ceiling: f64,
    full_quantum: bool,
) -> Result<Vec<Vec<usize>>, NumericError> {
    let minima = frequencies
        .iter()
        .map(|w| {
            let minimum = w.on_grid(grid).into_iter().fold(f64::INFINITY, f64::min);
            if minimum > 0.0 {
                Ok(minimum)
            } else {
                Err(NumericError::IllConditioned(format!(
                    "vibrational frequency {} is not positive on the grid",
                    minimum
                )))
            }
        })
        .collect::<Result<Vec<f64>, NumericError>>()?;

    let mut manifolds = vec![vec![0; frequencies.len()]];
    if !full_quantum {
        return Ok(manifolds);
    }
    let mut index = 0;
    while index < manifolds.len() {
        let base = manifolds[index].clone();
        let last = base.iter().rposition(|&n| n > 0).unwrap_or(0);
        for mode in last..minima.len() {
            let mut next = base.clone();
            next[mode] += 1;
            let energy: f64 = next.iter().zip(&minima).map(|(&n, w)| n as f64 * w).sum();
            if energy <= ceiling {
                if manifolds.len() >= MANIFOLD_LIMIT {
                    return Err(NumericError::IllConditioned(format!(
                        "more than {} vibrational manifolds below {}",
                        MANIFOLD_LIMIT, ceiling
                    )));
                }
                manifolds.push(next);
            }
        }
        index += 1;
    }
    Ok(manifolds)
}

/// `qf = N_q / N_cl` with the quantum count interpolated through the levels.
///
/// Levels closer than the merge tolerance form one node placed at the lowest
/// of them and carrying the count of the whole cluster, so the interpolated
/// count never drops below the staircase. Without external rotation `N_q`
/// counts the levels; with it every level contributes the rigid-top count of
/// its averaged external factor. Both are divided by the product of the
/// symmetry numbers. Above the highest node `qf` follows a power law whose
/// exponent keeps the count's slope continuous.
#[derive(Debug, Clone)]
struct QuantumCorrection {
    quantum: MonotoneCubic,
    top: f64,
    top_factor: f64,
    exponent: f64,
    limit: f64,
}

impl QuantumCorrection {
    fn new(
        levels: &[QuantumLevel],
        classical: &TabulatedFunction,
        symmetry_product: f64,
        external_symmetry: Option<f64>,
        merge: f64,
        band: f64,
    ) -> Result<Self, NumericError> {
        let mut clusters: Vec<(f64, usize)> = Vec::new();
        for (i, level) in levels.iter().enumerate() {
            match clusters.last_mut() {
                Some((anchor, through)) if level.energy - *anchor <= merge => *through = i + 1,
                _ => clusters.push((level.energy, i + 1)),
            }
        }
        if clusters.len() < 2 {
            return Err(NumericError::IllConditioned(format!(
                "{} quantum levels are too few to tabulate the correction factor",
                levels.len()
            )));
        }

        let rigid_top = 8.0 * PI * PI / ((2.0 * PI).powf(1.5) * gamma(2.5));
        let (nodes, counts): (Vec<f64>, Vec<f64>) = clusters
            .iter()
            .map(|&(anchor, through)| {
                let count = match external_symmetry {
                    None => through as f64,
                    Some(sigma) => levels
                        .iter()
                        .take_while(|l| l.energy < anchor)
                        .map(|l| rigid_top / sigma * l.external_factor * (anchor - l.energy).powf(1.5))
                        .sum(),
                };
                (anchor, count / symmetry_product)
            })
            .unzip();
        let quantum = MonotoneCubic::new(nodes, counts)?;

        let top = quantum.x_max();
        let top_count = quantum.value(top);
        let top_classical = classical.value(top)?;
        if !(top_count > 0.0 && top_classical > 0.0) {
            return Err(NumericError::IllConditioned(format!(
                "non-positive correction factor at {} (quantum {}, classical {})",
                top, top_count, top_classical
            )));
        }
        let exponent = top
            * (quantum.derivative(top) / top_count - classical.derivative(top)? / top_classical);
        let limit = (top * band)
            .max(2.0 * top - quantum.x_min())
            .min(classical.upper_limit());

        Ok(Self {
            quantum,
            top,
            top_factor: top_count / top_classical,
            exponent,
            limit,
        })
    }

    fn upper_limit(&self) -> f64 {
        self.limit
    }

    fn check(&self, energy: f64) -> Result<(), NumericError> {
        if energy > self.limit {
            return Err(NumericError::OutOfRange {
                x: energy,
                min: 0.0,
                max: self.limit,
            });
        }
        Ok(())
    }

    fn tail(&self, energy: f64) -> f64 {
        self.top_factor * (energy / self.top).powf(self.exponent)
    }

    fn number(&self, energy: f64, classical: &TabulatedFunction) -> Result<f64, NumericError> {
        self.check(energy)?;
        if energy < self.quantum.x_min() {
            return Ok(0.0);
        }
        if energy <= self.top {
            return Ok(self.quantum.value(energy));
        }
        Ok(classical.value(energy)? * self.tail(energy))
    }

    fn density(&self, energy: f64, classical: &TabulatedFunction) -> Result<f64, NumericError> {
        self.check(energy)?;
        if energy < self.quantum.x_min() {
            return Ok(0.0);
        }
        if energy <= self.top {
            return Ok(self.quantum.derivative(energy));
        }
        let value = classical.value(energy)?;
        let slope = classical.derivative(energy)?;
        Ok(self.tail(energy) * (slope + value * self.exponent / energy))
    }

    fn factor(&self, energy: f64, classical: &TabulatedFunction) -> Result<f64, NumericError> {
        let value = classical.value(energy)?;
        if !(value > 0.0) {
            return Err(NumericError::OutOfRange {
                x: energy,
                min: 0.0,
                max: self.limit,
            });
        }
        if energy > self.top {
            self.check(energy)?;
            return Ok(self.tail(energy));
        }
        Ok(self.number(energy, classical)? / value)
    }
}

pub fn build(
    block: &KeywordBlock,
    mode: StatesMode,
    config: &ModelConfig,
) -> Result<Core, ModelError> {
    let input: MultiRotorInput = block.parse()?;
    let path = block.path();
    if input.internal_rotations.is_empty() {
        return Err(ModelError::MissingKeyword {
            block: path.to_string(),
            keyword: "internal-rotations",
        });
    }
    if !(input.external_symmetry > 0.0) {
        return Err(ModelError::out_of_range(
            path,
            "external-symmetry",
            format!("must be positive, got {}", input.external_symmetry),
        ));
    }

    let rotations = input
        .internal_rotations
        .into_iter()
        .enumerate()
        .map(|(i, r)| {
            InternalRotation::new(
                &format!("{}.internal-rotations[{}]", path, i),
                r.group,
                r.axis,
                r.symmetry,
                r.sampling,
            )
        })
        .collect::<Result<Vec<_>, _>>()?;
    let n = rotations.len();
    let grid = MultiIndex::new(rotations.iter().map(|r| r.sampling().grid_size).collect())
        .map_err(|e| ModelError::input(path, e.to_string()))?;
    let potential_bounds: Vec<usize> = rotations
        .iter()
        .map(|r| r.sampling().potential_fourier_size)
        .collect();
    let mass_bounds: Vec<usize> = rotations
        .iter()
        .map(|r| r.sampling().mass_fourier_size)
        .collect();
    let controls = &config.multirotor;

    let potential = input.potential.series(
        path,
        "potential",
        &grid,
        &potential_bounds,
        controls.potential_tolerance,
    )?;
    let frequencies = input
        .frequencies
        .into_iter()
        .enumerate()
        .map(|(v, f)| {
            f.series(
                path,
                &format!("frequencies[{}]", v),
                &grid,
                &potential_bounds,
                controls.potential_tolerance,
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut mobility: Vec<Vec<Option<FourierSeries>>> = vec![vec![None; n]; n];
    for element in input.mobility {
        let [i, j] = element.element;
        if i >= n || j >= n {
            return Err(ModelError::input(
                path,
                format!("mobility element {:?} is outside {} rotors", element.element, n),
            ));
        }
        let series = TorusInput {
            constant: element.constant,
            terms: element.terms,
            samples: element.samples,
        }
        .series(
            path,
            "mobility",
            &grid,
            &mass_bounds,
            controls.mass_tolerance,
        )?;
        mobility[i][j] = Some(series.clone());
        mobility[j][i] = Some(series);
    }
    let mobility = mobility
        .into_iter()
        .enumerate()
        .map(|(i, row)| {
            row.into_iter()
                .enumerate()
                .map(|(j, g)| match g {
                    Some(g) => Ok(g),
                    None if i == j => Err(ModelError::input(
                        path,
                        format!("mobility element [{}, {}] is required", i, i),
                    )),
                    None => Ok(FourierSeries::constant(n, 0.0)),
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;

    let external_rotation = input.external_rotation.unwrap_or(controls.external_rotation);
    let external_factor = match input.external_rotation_factor {
        Some(factor) if external_rotation => Some(factor.series(
            path,
            "external-rotation-factor",
            &grid,
            &mass_bounds,
            controls.mass_tolerance,
        )?),
        Some(_) => {
            debug!(path, "External rotation disabled; ignoring its factor.");
            None
        }
        None if external_rotation => {
            return Err(ModelError::MissingKeyword {
                block: path.to_string(),
                keyword: "external-rotation-factor",
            });
        }
        None => None,
    };

    let level_energy_max = input
        .level_energy_max
        .unwrap_or_else(|| config.multirotor_level_max());
    if !(level_energy_max > 0.0) {
        return Err(ModelError::out_of_range(
            path,
            "level-energy-max",
            format!("must be positive, got {}", level_energy_max),
        ));
    }
    let options = MultiRotorOptions {
        level_energy_max,
        full_quantum: input.full_quantum.unwrap_or(controls.full_quantum),
        external_rotation,
    };
    let model = TorusModel {
        rotations,
        potential,
        frequencies,
        mobility,
        external_factor,
        external_symmetry: input.external_symmetry,
    };
    let rotor = MultiRotor::new(model, options, config)
        .map_err(|e| ModelError::numeric(path, level_energy_max, e))?;
    Ok(Core::new(mode, CoreKind::MultiRotor(Box::new(rotor))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::block::block_from_str;
    use crate::core::rotor::HinderedRotor;
    use crate::engine::config::test_config;
    use approx::assert_relative_eq;

    fn one_rotor(extra: &str) -> String {
        format!(
            r#"
            type = "multi-rotor"
            level-energy-max = 110.0
            potential = {{ constant = 0.0 }}
            mobility = [{{ element = [0, 0], constant = 2.0 }}]
            {}
            [[internal-rotations]]
            group = [3, 4, 5]
            axis = [1, 2]
            "#,
            extra
        )
    }

    fn multirotor(content: &str) -> MultiRotor {
        let block = block_from_str("core", content);
        match build(&block, StatesMode::Number, &test_config(1.0, 500.0))
            .unwrap()
            .kind()
        {
            CoreKind::MultiRotor(rotor) => (**rotor).clone(),
            other => panic!("unexpected core {:?}", other),
        }
    }

    #[test]
    fn free_rotor_levels_are_square_integers() {
        let rotor = multirotor(&one_rotor(""));
        assert_eq!(rotor.level_size(), 21);
        assert_relative_eq!(rotor.ground(), 0.0, epsilon = 1e-10);
        assert_relative_eq!(rotor.level_energy(20), 100.0, epsilon = 1e-8);
    }

    #[test]
    fn corrected_count_reproduces_staircase_at_levels() {
        let rotor = multirotor(&one_rotor(""));
        for (k, count) in [(1.0, 3.0), (2.0, 5.0), (7.0, 15.0), (10.0, 21.0)] {
            let energy: f64 = k * k;
            assert_relative_eq!(rotor.number(energy).unwrap(), count, max_relative = 1e-8);
        }
    }

    #[test]
    fn corrected_count_approaches_classical_far_above_levels() {
        let rotor = multirotor(&one_rotor(""));
        let staircase = 41.0;
        let ratio = rotor.number(400.0).unwrap() / staircase;
        assert!((ratio - 1.0).abs() < 0.05, "ratio {}", ratio);
        let classical = rotor.classical_number(400.0).unwrap();
        assert!(classical < staircase);
    }

    #[test]
    fn symmetry_number_divides_the_count() {
        let rotor = multirotor(&one_rotor("").replace("axis = [1, 2]", "axis = [1, 2]\nsymmetry = 2"));
        // Levels m² for every m, shared between two sectors.
        assert_relative_eq!(rotor.number(4.0).unwrap(), 2.5, max_relative = 1e-8);
    }

    #[test]
    fn two_uncoupled_rotors_count_lattice_points() {
        let rotor = multirotor(
            r#"
            level-energy-max = 30.0
            potential = { constant = 0.0 }
            mobility = [
                { element = [0, 0], constant = 2.0 },
                { element = [1, 1], constant = 2.0 },
            ]
            [[internal-rotations]]
            group = [3]
            axis = [1, 2]
            sampling = { grid-size = 8 }
            [[internal-rotations]]
            group = [6]
            axis = [4, 5]
            sampling = { grid-size = 8 }
            "#,
        );
        // Integer pairs with m₁² + m₂² ≤ 25.
        assert_relative_eq!(rotor.number(25.0).unwrap(), 81.0, max_relative = 1e-8);
    }

    #[test]
    fn single_hindered_rotor_matches_one_dimensional_solver() {
        let rotor = multirotor(
            r#"
            level-energy-max = 100.0
            potential = { constant = 50.0, terms = [{ harmonics = [1], cos = -50.0 }] }
            mobility = [{ element = [0, 0], constant = 2.0 }]
            [[internal-rotations]]
            group = [3]
            axis = [1, 2]
            "#,
        );
        let mut map = std::collections::BTreeMap::new();
        map.insert(0, 50.0);
        map.insert(1, -50.0);
        let config = test_config(1.0, 500.0);
        let reference =
            HinderedRotor::new(1.0, 1, FourierSeries::from_signed_map(&map), &config).unwrap();
        for i in 0..5 {
            assert_relative_eq!(
                rotor.level_energy(i) - rotor.ground(),
                reference.energy_level(i),
                epsilon = 1e-6
            );
        }
    }

    #[test]
    fn external_rotation_factor_scales_the_count() {
        let with_factor = |value: f64| {
            multirotor(&one_rotor(&format!(
                "external-rotation = true\nexternal-rotation-factor = {{ constant = {} }}",
                value
            )))
        };
        let single = with_factor(1.0);
        let double = with_factor(2.0);
        assert!(single.has_external_rotation());
        let e = 60.0;
        assert_relative_eq!(
            double.number(e).unwrap(),
            2.0 * single.number(e).unwrap(),
            max_relative = 1e-8
        );
    }

    #[test]
    fn missing_diagonal_mobility_is_rejected() {
        let block = block_from_str(
            "core",
            r#"
            potential = { constant = 0.0 }
            mobility = [{ element = [0, 1], constant = 0.1 }]
            [[internal-rotations]]
            group = [3]
            axis = [1, 2]
            [[internal-rotations]]
            group = [6]
            axis = [4, 5]
            "#,
        );
        let result = build(&block, StatesMode::Number, &test_config(1.0, 100.0));
        assert!(matches!(result, Err(ModelError::Input { .. })));
    }

    #[test]
    fn samples_must_cover_the_product_grid() {
        let block = block_from_str(
            "core",
            r#"
            potential = { samples = [0.0, 1.0, 2.0] }
            mobility = [{ element = [0, 0], constant = 2.0 }]
            [[internal-rotations]]
            group = [3]
            axis = [1, 2]
            "#,
        );
        let result = build(&block, StatesMode::Number, &test_config(1.0, 100.0));
        assert!(matches!(result, Err(ModelError::Input { .. })));
    }

    #[test]
    fn full_quantum_adds_vibrational_manifolds() {
        let manifolds = vibrational_manifolds(
            &[FourierSeries::constant(1, 30.0), FourierSeries::constant(1, 45.0)],
            &MultiIndex::new(vec![4]).unwrap(),
            100.0,
            true,
        )
        .unwrap();
        // n₁·30 + n₂·45 ≤ 100.
        assert_eq!(manifolds.len(), 7);
        assert!(manifolds.contains(&vec![3, 0]));
        assert!(manifolds.contains(&vec![1, 1]));
        assert!(!manifolds.contains(&vec![0, 3]));
    }

    #[test]
    fn hindered_count_is_monotone_and_bounds_the_staircase() {
        let block = block_from_str(
            "core",
            r#"
            type = "multi-rotor"
            level-energy-max = 200.0
            potential = { constant = 30.0, terms = [{ harmonics = [1], cos = -30.0 }] }
            mobility = [{ element = [0, 0], constant = 2.0 }]
            [[internal-rotations]]
            group = [3]
            axis = [1, 2]
            "#,
        );
        let rotor = match build(&block, StatesMode::Number, &test_config(0.5, 500.0))
            .unwrap()
            .kind()
        {
            CoreKind::MultiRotor(rotor) => (**rotor).clone(),
            other => panic!("unexpected core {:?}", other),
        };
        let ground = rotor.ground();
        let staircase = |e: f64| {
            (0..rotor.level_size())
                .filter(|&i| rotor.level_energy(i) - ground <= e)
                .count() as f64
        };
        let top = rotor.level_energy(rotor.level_size() - 1) - ground;

        let mut previous = rotor.number(0.0).unwrap();
        assert!(previous >= 1.0);
        for k in 1..=4800 {
            let e = k as f64 * 0.05;
            let number = rotor.number(e).unwrap();
            assert!(number >= previous - 1e-9, "count decreases at {}", e);
            assert!(rotor.density(e).unwrap() >= -1e-9, "negative density at {}", e);
            if e <= top {
                assert!(staircase(e) <= number + 1e-9, "staircase above count at {}", e);
            }
            previous = number;
        }
        assert!(rotor.correction_factor(100.0 + ground).unwrap() > 0.0);
    }
}
