//! Rigid-rotor harmonic-oscillator species.
//!
//! The states grid is built by successive discrete convolutions on the shared
//! energy grid: the base core, every harmonic ladder (Beyer-Swinehart), every
//! rotor ladder, the electronic levels, the graph-expansion correction and
//! finally the tunneling density. The weight is evaluated in product form.

use serde::Deserialize;
use tracing::{debug, info, instrument};

use super::graph::{GraphExpansion, GraphInput};
use super::grid::StatesGrid;
use super::{Species, SpeciesKind};
use crate::core::base::Core;
use crate::core::io::block::KeywordBlock;
use crate::core::math::NumericError;
use crate::core::math::tabulated::TabulatedFunction;
use crate::core::mode::StatesMode;
use crate::core::rotor::{Rotor, convolute_ladder};
use crate::core::tunnel::Tunnel;
use crate::engine::config::ModelConfig;
use crate::engine::error::ModelError;
use crate::engine::factory;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RrhoInput {
    zero_energy: Option<f64>,
    electronic_energy: Option<f64>,
    #[serde(default = "unit")]
    symmetry_factor: f64,
    #[serde(default)]
    frequencies: Vec<f64>,
    #[serde(default)]
    frequency_degeneracies: Vec<usize>,
    #[serde(default)]
    electronic_levels: Vec<(f64, u32)>,
    #[serde(default)]
    infrared_intensities: Vec<f64>,
    core: Option<toml::Table>,
    #[serde(default)]
    rotors: Vec<toml::Table>,
    tunnel: Option<toml::Table>,
    graph: Option<GraphInput>,
}

fn unit() -> f64 {
    1.0
}

/// One harmonic oscillator entry with its degeneracy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Oscillator {
    pub frequency: f64,
    pub degeneracy: usize,
}

/// Mean occupation number of an infrared-active oscillator over the grid.
#[derive(Debug, Clone)]
struct Emission {
    intensity: f64,
    occupation: TabulatedFunction,
}

#[derive(Debug, Clone)]
pub struct Rrho {
    core: Option<Core>,
    oscillators: Vec<Oscillator>,
    rotors: Vec<Rotor>,
    /// `(energy above the lowest level, degeneracy)`.
    electronic: Vec<(f64, u32)>,
    tunnel: Option<Tunnel>,
    graph: Option<GraphExpansion>,
    symmetry_factor: f64,
    grid: Option<StatesGrid>,
    emissions: Vec<Emission>,
}

/// Parts of an RRHO species before the grid is assembled.
#[derive(Debug, Clone)]
pub struct RrhoParts {
    pub core: Option<Core>,
    pub oscillators: Vec<Oscillator>,
    pub rotors: Vec<Rotor>,
    pub electronic: Vec<(f64, u32)>,
    pub tunnel: Option<Tunnel>,
    pub graph: Option<GraphExpansion>,
    pub symmetry_factor: f64,
    pub infrared_intensities: Vec<f64>,
}

impl Rrho {
    /// Assembles the species; `mode` decides whether a states grid is built.
    #[instrument(skip_all, name = "rrho_grid", fields(%mode, oscillators = parts.oscillators.len()))]
    pub fn new(
        parts: RrhoParts,
        mode: StatesMode,
        config: &ModelConfig,
    ) -> Result<Self, NumericError> {
        let mut rrho = Self {
            core: parts.core,
            oscillators: parts.oscillators,
            rotors: parts.rotors,
            electronic: parts.electronic,
            tunnel: parts.tunnel,
            graph: parts.graph,
            symmetry_factor: parts.symmetry_factor,
            grid: None,
            emissions: Vec::new(),
        };
        if mode.has_states() {
            let values = rrho.convolute_grid(mode, config)?;
            let discrete = rrho.is_discrete();
            let grid = StatesGrid::new(
                mode,
                config.energy_step,
                values,
                discrete,
                config.extrapolation_band,
            )?;
            rrho.emissions = rrho.emission_table(&grid, &parts.infrared_intensities, config)?;
            debug!(
                nodes = grid.values().len(),
                discrete,
                tail_exponent = grid.tail_exponent(),
                "RRHO states grid assembled."
            );
            rrho.grid = Some(grid);
        }
        Ok(rrho)
    }

    fn convolute_grid(
        &self,
        mode: StatesMode,
        config: &ModelConfig,
    ) -> Result<Vec<f64>, NumericError> {
        let step = config.energy_step;
        let extension = self
            .tunnel
            .as_ref()
            .map_or(0, |t| (-t.cutoff() / step).ceil() as usize);
        let size = config.grid_size() + extension;

        let mut states = match &self.core {
            Some(core) => core.fill_grid(step, size)?,
            None => unit_grid(mode, step, size),
        };

        for oscillator in &self.oscillators {
            let bin = (oscillator.frequency / step).round() as usize;
            if bin == 0 {
                return Err(NumericError::IllConditioned(format!(
                    "frequency {} is below half the energy step {}",
                    oscillator.frequency, step
                )));
            }
            for _ in 0..oscillator.degeneracy {
                for k in bin..size {
                    states[k] += states[k - bin];
                }
            }
        }

        for rotor in &self.rotors {
            rotor.convolute(&mut states, step);
        }

        if self.electronic.len() > 1 || self.electronic.first().is_some_and(|l| l.1 != 1) {
            let mut bins: Vec<(usize, f64)> = Vec::new();
            for &(energy, degeneracy) in &self.electronic {
                let bin = (energy / step).round() as usize;
                match bins.last_mut() {
                    Some((last, weight)) if *last == bin => *weight += degeneracy as f64,
                    _ => bins.push((bin, degeneracy as f64)),
                }
            }
            convolute_ladder(&mut states, &bins);
        }

        if let Some(graph) = &self.graph {
            graph.correct_grid(&mut states, step, mode);
        }

        if let Some(tunnel) = &self.tunnel {
            tunnel.convolute(&mut states, step)?;
        }

        if self.symmetry_factor != 1.0 {
            for value in &mut states {
                *value /= self.symmetry_factor;
            }
        }
        Ok(states)
    }

    /// Occupation numbers `⟨n_i⟩(E) = Σ_{n≥1} G(E - n ω_i) / G(E)` on the grid.
    fn emission_table(
        &self,
        grid: &StatesGrid,
        intensities: &[f64],
        config: &ModelConfig,
    ) -> Result<Vec<Emission>, NumericError> {
        let step = grid.step();
        let values = grid.values();
        let energies: Vec<f64> = (0..values.len()).map(|k| step * k as f64).collect();
        self.oscillators
            .iter()
            .zip(intensities)
            .map(|(oscillator, &intensity)| {
                let bin = ((oscillator.frequency / step).round() as usize).max(1);
                let occupation: Vec<f64> = (0..values.len())
                    .map(|k| {
                        if values[k] <= 0.0 {
                            return 0.0;
                        }
                        (1..=k / bin).map(|n| values[k - n * bin]).sum::<f64>() / values[k]
                    })
                    .collect();
                Ok(Emission {
                    intensity: intensity * oscillator.degeneracy as f64,
                    occupation: TabulatedFunction::linear(
                        energies.clone(),
                        occupation,
                        config.extrapolation_band,
                    )?,
                })
            })
            .collect()
    }

    /// Whether the spectrum is a set of levels rather than a continuum.
    pub fn is_discrete(&self) -> bool {
        self.tunnel.is_none() && self.core.as_ref().is_none_or(|c| c.is_discrete())
    }

    pub fn core(&self) -> Option<&Core> {
        self.core.as_ref()
    }

    pub fn oscillators(&self) -> &[Oscillator] {
        &self.oscillators
    }

    pub fn rotors(&self) -> &[Rotor] {
        &self.rotors
    }

    pub fn tunnel(&self) -> Option<&Tunnel> {
        self.tunnel.as_ref()
    }

    pub fn graph(&self) -> Option<&GraphExpansion> {
        self.graph.as_ref()
    }

    pub fn grid(&self) -> Option<&StatesGrid> {
        self.grid.as_ref()
    }

    /// Energy of the lowest state above the bottom of the potential.
    pub fn zero_point_energy(&self) -> f64 {
        self.core.as_ref().map_or(0.0, |c| c.ground())
            + self
                .oscillators
                .iter()
                .map(|o| 0.5 * o.frequency * o.degeneracy as f64)
                .sum::<f64>()
            + self.rotors.iter().map(|r| r.ground()).sum::<f64>()
            + self.graph.as_ref().map_or(0.0, |g| g.ground_shift())
    }

    /// States at `energy` above the ground (the tunneling cutoff when present).
    pub fn states(&self, energy: f64) -> Result<f64, NumericError> {
        match &self.grid {
            Some(grid) => grid.value(energy),
            None => Err(NumericError::IllConditioned(
                "no states grid was built".to_string(),
            )),
        }
    }

    /// Product-form weight relative to the barrier top, without tunneling.
    fn bare_weight(&self, temperature: f64) -> Result<f64, NumericError> {
        let mut weight = match &self.core {
            Some(core) => core.weight(temperature)?,
            None => 1.0,
        };
        for oscillator in &self.oscillators {
            let factor = -(-oscillator.frequency / temperature).exp_m1();
            weight /= factor.powi(oscillator.degeneracy as i32);
        }
        for rotor in &self.rotors {
            weight *= rotor.weight(temperature)?;
        }
        weight *= self
            .electronic
            .iter()
            .map(|&(e, g)| g as f64 * (-e / temperature).exp())
            .sum::<f64>();
        if let Some(graph) = &self.graph {
            weight *= graph.weight_factor(temperature);
        }
        Ok(weight / self.symmetry_factor)
    }

    /// Weight relative to the ground, which a tunnel lowers to its cutoff.
    pub fn weight(&self, temperature: f64) -> Result<f64, NumericError> {
        let weight = self.bare_weight(temperature)?;
        match &self.tunnel {
            Some(tunnel) => Ok(weight * tunnel.shifted_weight(temperature, tunnel.cutoff())?),
            None => Ok(weight),
        }
    }

    /// Weight relative to the barrier top, tunneling included.
    pub fn tunnel_weight(&self, temperature: f64) -> Result<f64, NumericError> {
        let weight = self.bare_weight(temperature)?;
        match &self.tunnel {
            Some(tunnel) => Ok(weight * tunnel.weight(temperature)?),
            None => Ok(weight),
        }
    }

    pub fn oscillator_size(&self) -> usize {
        self.emissions.len()
    }

    pub fn oscillator_frequency(&self, index: usize) -> Option<f64> {
        (index < self.emissions.len()).then(|| self.oscillators[index].frequency)
    }

    /// Emission rate `A_i g_i ⟨n_i⟩(E)`, `None` for an unknown oscillator.
    pub fn infrared_intensity(
        &self,
        energy: f64,
        index: usize,
    ) -> Result<Option<f64>, NumericError> {
        let Some(emission) = self.emissions.get(index) else {
            return Ok(None);
        };
        if energy <= 0.0 {
            return Ok(Some(0.0));
        }
        Ok(Some(emission.intensity * emission.occupation.value(energy)?.max(0.0)))
    }
}

fn unit_grid(mode: StatesMode, step: f64, size: usize) -> Vec<f64> {
    match mode {
        StatesMode::Density => {
            let mut grid = vec![0.0; size];
            if let Some(first) = grid.first_mut() {
                *first = 1.0 / step;
            }
            grid
        }
        StatesMode::Number | StatesMode::NoStates => vec![1.0; size],
    }
}

/// Parses an RRHO block into its parts and its ground energy.
pub(crate) fn parse_parts(
    block: &KeywordBlock,
    mode: StatesMode,
    config: &ModelConfig,
) -> Result<(RrhoParts, GroundSpec), ModelError> {
    let input: RrhoInput = block.parse()?;
    let path = block.path();

    let ground = match (input.zero_energy, input.electronic_energy) {
        (Some(e), None) => GroundSpec::Zero(e),
        (None, Some(e)) => GroundSpec::Electronic(e),
        (Some(_), Some(_)) => {
            return Err(ModelError::input(
                path,
                "'zero-energy' and 'electronic-energy' are mutually exclusive",
            ));
        }
        (None, None) => {
            return Err(ModelError::MissingKeyword {
                block: path.to_string(),
                keyword: "zero-energy",
            });
        }
    };

    if !(input.symmetry_factor > 0.0) {
        return Err(ModelError::out_of_range(
            path,
            "symmetry-factor",
            format!("must be positive, got {}", input.symmetry_factor),
        ));
    }
    if let Some(w) = input.frequencies.iter().find(|w| !(**w > 0.0)) {
        return Err(ModelError::out_of_range(
            path,
            "frequencies",
            format!("must be positive, got {}", w),
        ));
    }
    let n = input.frequencies.len();
    let degeneracies = if input.frequency_degeneracies.is_empty() {
        vec![1; n]
    } else {
        input.frequency_degeneracies
    };
    if degeneracies.len() != n || degeneracies.contains(&0) {
        return Err(ModelError::input(
            path,
            format!("'frequency-degeneracies' needs {} positive entries", n),
        ));
    }
    let oscillators: Vec<Oscillator> = input
        .frequencies
        .iter()
        .zip(&degeneracies)
        .map(|(&frequency, &degeneracy)| Oscillator {
            frequency,
            degeneracy,
        })
        .collect();

    if !input.infrared_intensities.is_empty()
        && (input.infrared_intensities.len() != n
            || input.infrared_intensities.iter().any(|a| !(*a >= 0.0)))
    {
        return Err(ModelError::input(
            path,
            format!("'infrared-intensities' needs {} non-negative entries", n),
        ));
    }

    let electronic = if input.electronic_levels.is_empty() {
        vec![(0.0, 1)]
    } else {
        input.electronic_levels
    };
    if let Some((e, g)) = electronic.iter().find(|(e, g)| !(*e >= 0.0) || *g == 0) {
        return Err(ModelError::out_of_range(
            path,
            "electronic-levels",
            format!(
                "level ({}, {}) needs a non-negative energy and a positive degeneracy",
                e, g
            ),
        ));
    }
    let mut electronic = electronic;
    electronic.sort_by(|a, b| a.0.total_cmp(&b.0));

    let core = input
        .core
        .map(|table| factory::build_core(&block.child("core", table), mode, config))
        .transpose()?;
    let rotors = input
        .rotors
        .into_iter()
        .enumerate()
        .map(|(i, table)| {
            factory::build_rotor(&block.child(&format!("rotors[{}]", i), table), config)
        })
        .collect::<Result<Vec<_>, _>>()?;
    let tunnel = input
        .tunnel
        .map(|table| factory::build_tunnel(&block.child("tunnel", table), config))
        .transpose()?;

    let graph = input
        .graph
        .map(|graph| {
            let modes = oscillators
                .iter()
                .flat_map(|o| std::iter::repeat_n(o.frequency, o.degeneracy))
                .collect();
            GraphExpansion::new(modes, &graph)
                .map_err(|e| ModelError::input(&format!("{}.graph", path), e.to_string()))
        })
        .transpose()?;

    Ok((
        RrhoParts {
            core,
            oscillators,
            rotors,
            electronic,
            tunnel,
            graph,
            symmetry_factor: input.symmetry_factor,
            infrared_intensities: input.infrared_intensities,
        },
        ground,
    ))
}

/// How the ground of a species is given.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum GroundSpec {
    /// Absolute energy of the lowest state (or barrier top).
    Zero(f64),
    /// Bottom of the potential; the zero-point energy is added.
    Electronic(f64),
}

pub fn build(
    block: &KeywordBlock,
    name: &str,
    mode: StatesMode,
    config: &ModelConfig,
) -> Result<Species, ModelError> {
    let (parts, ground) = parse_parts(block, mode, config)?;
    let rrho = Rrho::new(parts, mode, config).map_err(|e| ModelError::numeric(name, 0.0, e))?;

    let real_ground = match ground {
        GroundSpec::Zero(e) => e,
        GroundSpec::Electronic(e) => e + rrho.zero_point_energy(),
    };
    let ground = real_ground + rrho.tunnel().map_or(0.0, |t| t.cutoff());
    info!(
        species = name,
        ground,
        real_ground,
        oscillators = rrho.oscillators().len(),
        rotors = rrho.rotors().len(),
        tunnel = rrho.tunnel().is_some(),
        "Built RRHO species."
    );
    Ok(
        Species::new(name, mode, ground, SpeciesKind::Rrho(Box::new(rrho)))
            .with_real_ground(real_ground),
    )
}
