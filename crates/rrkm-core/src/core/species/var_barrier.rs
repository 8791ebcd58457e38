//! Two-transition-state barrier built from an outer and several inner RRHO states.

use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use super::grid::StatesGrid;
use super::{Species, SpeciesKind, rrho};
use crate::core::io::block::KeywordBlock;
use crate::core::math::NumericError;
use crate::core::mode::StatesMode;
use crate::core::tunnel::Tunnel;
use crate::engine::config::ModelConfig;
use crate::engine::error::ModelError;
use crate::engine::factory;

/// How the inner and outer transition states are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TwoStateMethod {
    /// The smallest count over all transition states limits the flux.
    #[default]
    Statistical,
    /// The smallest inner count is blended with the outer count.
    Dynamical,
}

/// Combination of the inner and outer counts for [`TwoStateMethod::Dynamical`].
pub trait BlendLaw: fmt::Debug + Send + Sync {
    fn blend(&self, inner: f64, outer: f64) -> f64;
}

/// `1/N = 1/N_inner + 1/N_outer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HarmonicBlend;

impl BlendLaw for HarmonicBlend {
    fn blend(&self, inner: f64, outer: f64) -> f64 {
        if inner <= 0.0 || outer <= 0.0 {
            return 0.0;
        }
        inner * outer / (inner + outer)
    }
}

/// Transition state limiting the flux at a given energy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Inner(usize),
    Outer,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct VarBarrierInput {
    #[serde(default)]
    method: TwoStateMethod,
    outer: toml::Table,
    inner: Vec<toml::Table>,
    tunnel: Option<toml::Table>,
}

#[derive(Debug, Clone)]
pub struct VarBarrier {
    outer: Species,
    inner: Vec<Species>,
    method: TwoStateMethod,
    blend: Arc<dyn BlendLaw>,
    tunnel: Option<Tunnel>,
    /// Absolute barrier top used when the members were sampled.
    top: f64,
    grid: StatesGrid,
}

impl VarBarrier {
    /// Samples the combined count on the grid above the highest member ground.
    pub fn new(
        outer: Species,
        inner: Vec<Species>,
        method: TwoStateMethod,
        blend: Arc<dyn BlendLaw>,
        tunnel: Option<Tunnel>,
        config: &ModelConfig,
    ) -> Result<Self, ModelError> {
        if inner.is_empty() {
            return Err(ModelError::Logic(
                "a variational barrier needs at least one inner transition state".to_string(),
            ));
        }
        if let Some(member) = std::iter::once(&outer)
            .chain(&inner)
            .find(|m| m.mode() != StatesMode::Number)
        {
            return Err(ModelError::ModeMismatch {
                block: member.name().to_string(),
                expected: StatesMode::Number,
                found: member.mode(),
            });
        }

        let top = std::iter::once(&outer)
            .chain(&inner)
            .map(Species::ground)
            .fold(f64::NEG_INFINITY, f64::max);
        let step = config.energy_step;
        let extension = tunnel
            .as_ref()
            .map_or(0, |t| (-t.cutoff() / step).ceil() as usize);
        let size = config.grid_size() + extension;

        let mut values = (0..size)
            .map(|k| combined(&outer, &inner, top + step * k as f64, method, blend.as_ref()))
            .collect::<Result<Vec<f64>, ModelError>>()?;
        if let Some(tunnel) = &tunnel {
            tunnel
                .convolute(&mut values, step)
                .map_err(|e| ModelError::numeric("variational barrier", top, e))?;
        }
        let discrete = tunnel.is_none() && std::iter::once(&outer).chain(&inner).all(is_discrete);
        let grid = StatesGrid::new(
            StatesMode::Number,
            step,
            values,
            discrete,
            config.extrapolation_band,
        )
        .map_err(|e| ModelError::numeric("variational barrier", top, e))?;
        debug!(
            inner = inner.len(),
            ?method,
            discrete,
            nodes = grid.values().len(),
            "Variational barrier grid assembled."
        );
        Ok(Self {
            outer,
            inner,
            method,
            blend,
            tunnel,
            top,
            grid,
        })
    }

    pub fn outer(&self) -> &Species {
        &self.outer
    }

    pub fn inner(&self) -> &[Species] {
        &self.inner
    }

    pub fn method(&self) -> TwoStateMethod {
        self.method
    }

    pub fn tunnel(&self) -> Option<&Tunnel> {
        self.tunnel.as_ref()
    }

    pub fn grid(&self) -> &StatesGrid {
        &self.grid
    }

    pub fn blend_law(&self) -> &dyn BlendLaw {
        self.blend.as_ref()
    }

    /// Combined member count at `energy` above the barrier top, read from the
    /// members directly instead of the grid and without tunneling.
    pub fn direct_states(&self, energy: f64) -> Result<f64, ModelError> {
        combined(
            &self.outer,
            &self.inner,
            self.top + energy,
            self.method,
            self.blend.as_ref(),
        )
    }

    /// Transition state with the smallest count at `energy` above the barrier top.
    ///
    /// Ties go to the inner states in order, then to the outer one.
    pub fn rate_limiting_branch(&self, energy: f64) -> Result<Branch, ModelError> {
        let counts = member_counts(&self.outer, &self.inner, self.top + energy)?;
        let (index, _) = minimum(&counts);
        Ok(if index < self.inner.len() {
            Branch::Inner(index)
        } else {
            Branch::Outer
        })
    }

    /// Count at `energy` above the ground.
    pub fn states(&self, energy: f64) -> Result<f64, NumericError> {
        self.grid.value(energy)
    }

    pub fn weight(&self, temperature: f64) -> Result<f64, NumericError> {
        self.grid.weight(temperature)
    }
}

/// Member counts at the absolute `energy`, inner first.
fn member_counts(outer: &Species, inner: &[Species], energy: f64) -> Result<Vec<f64>, ModelError> {
    inner
        .iter()
        .chain(std::iter::once(outer))
        .map(|m| m.states(energy))
        .collect()
}

fn combined(
    outer: &Species,
    inner: &[Species],
    energy: f64,
    method: TwoStateMethod,
    blend: &dyn BlendLaw,
) -> Result<f64, ModelError> {
    let counts = member_counts(outer, inner, energy)?;
    Ok(match method {
        TwoStateMethod::Statistical => minimum(&counts).1,
        TwoStateMethod::Dynamical => {
            let (inner_counts, outer_count) = counts.split_at(inner.len());
            blend.blend(minimum(inner_counts).1, outer_count[0])
        }
    })
}

/// First position holding the smallest value.
fn minimum(counts: &[f64]) -> (usize, f64) {
    counts
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::INFINITY), |best, (i, n)| if n < best.1 { (i, n) } else { best })
}

fn is_discrete(species: &Species) -> bool {
    match species.kind() {
        SpeciesKind::Rrho(rrho) => rrho.is_discrete(),
        SpeciesKind::Atomic(_) => true,
        _ => false,
    }
}

pub fn build(
    block: &KeywordBlock,
    name: &str,
    mode: StatesMode,
    config: &ModelConfig,
) -> Result<Species, ModelError> {
    if mode != StatesMode::Number {
        return Err(ModelError::ModeMismatch {
            block: block.path().to_string(),
            expected: StatesMode::Number,
            found: mode,
        });
    }
    let input: VarBarrierInput = block.parse()?;
    if input.inner.is_empty() {
        return Err(ModelError::input(
            block.path(),
            "'inner' needs at least one transition state",
        ));
    }

    let member = |child: &str, table: toml::Table| -> Result<Species, ModelError> {
        let mut child_block = block.child(child, table);
        child_block.expect_mode(mode)?;
        rrho::build(&child_block, &format!("{}.{}", name, child), mode, config)
    };
    let outer = member("outer", input.outer)?;
    let inner = input
        .inner
        .into_iter()
        .enumerate()
        .map(|(i, table)| member(&format!("inner[{}]", i), table))
        .collect::<Result<Vec<_>, _>>()?;
    let tunnel = input
        .tunnel
        .map(|table| factory::build_tunnel(&block.child("tunnel", table), config))
        .transpose()?;

    let barrier = VarBarrier::new(
        outer,
        inner,
        input.method,
        Arc::new(HarmonicBlend),
        tunnel,
        config,
    )?;
    let real_ground = barrier.top;
    let ground = real_ground + barrier.tunnel().map_or(0.0, |t| t.cutoff());
    info!(
        species = name,
        ground,
        inner = barrier.inner().len(),
        method = ?barrier.method(),
        "Built variational barrier."
    );
    Ok(
        Species::new(name, mode, ground, SpeciesKind::VarBarrier(Box::new(barrier)))
            .with_real_ground(real_ground),
    )
}
