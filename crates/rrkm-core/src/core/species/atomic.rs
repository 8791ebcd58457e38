use serde::Deserialize;

use super::{Species, SpeciesKind};
use crate::core::io::block::KeywordBlock;
use crate::core::mode::StatesMode;
use crate::engine::config::ModelConfig;
use crate::engine::error::ModelError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct AtomicInput {
    #[serde(default)]
    zero_energy: f64,
    #[serde(default = "ground_level")]
    electronic_levels: Vec<(f64, u32)>,
}

fn ground_level() -> Vec<(f64, u32)> {
    vec![(0.0, 1)]
}

/// A species with electronic levels only, such as an atomic fragment.
#[derive(Debug, Clone)]
pub struct AtomicSpecies {
    /// `(energy above the lowest level, degeneracy)`, sorted by energy.
    levels: Vec<(f64, u32)>,
}

impl AtomicSpecies {
    pub fn new(mut levels: Vec<(f64, u32)>) -> Self {
        levels.sort_by(|a, b| a.0.total_cmp(&b.0));
        let lowest = levels.first().map_or(0.0, |l| l.0);
        for level in &mut levels {
            level.0 -= lowest;
        }
        Self { levels }
    }

    pub fn levels(&self) -> &[(f64, u32)] {
        &self.levels
    }

    /// Staircase count of levels at or below `energy`.
    pub fn states(&self, energy: f64) -> f64 {
        self.levels
            .iter()
            .take_while(|(e, _)| *e <= energy)
            .map(|&(_, g)| g as f64)
            .sum()
    }

    pub fn weight(&self, temperature: f64) -> f64 {
        self.levels
            .iter()
            .map(|&(e, g)| g as f64 * (-e / temperature).exp())
            .sum()
    }
}

pub fn build(
    block: &KeywordBlock,
    name: &str,
    mode: StatesMode,
    _config: &ModelConfig,
) -> Result<Species, ModelError> {
    if mode == StatesMode::Density {
        return Err(ModelError::ModeMismatch {
            block: block.path().to_string(),
            expected: StatesMode::Number,
            found: mode,
        });
    }
    let input: AtomicInput = block.parse()?;
    if input.electronic_levels.is_empty() {
        return Err(ModelError::input(block.path(), "'electronic-levels' is empty"));
    }
    if let Some((e, g)) = input
        .electronic_levels
        .iter()
        .find(|(e, g)| !e.is_finite() || *g == 0)
    {
        return Err(ModelError::out_of_range(
            block.path(),
            "electronic-levels",
            format!("level ({}, {}) needs a finite energy and a positive degeneracy", e, g),
        ));
    }
    Ok(Species::new(
        name,
        mode,
        input.zero_energy,
        SpeciesKind::Atomic(AtomicSpecies::new(input.electronic_levels)),
    ))
}
