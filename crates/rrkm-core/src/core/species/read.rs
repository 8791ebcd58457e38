use serde::Deserialize;
use std::path::PathBuf;
use tracing::debug;

use super::{Species, SpeciesKind};
use crate::core::base::laplace_weight;
use crate::core::io::block::KeywordBlock;
use crate::core::io::table::companion_table;
use crate::core::math::NumericError;
use crate::core::math::tabulated::TabulatedFunction;
use crate::core::mode::StatesMode;
use crate::engine::config::ModelConfig;
use crate::engine::error::ModelError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ReadInput {
    zero_energy: f64,
    table: Option<Vec<(f64, f64)>>,
    table_file: Option<PathBuf>,
}

/// Densities or numbers of states read from a table of energies above the ground.
#[derive(Debug, Clone)]
pub struct ReadSpecies {
    mode: StatesMode,
    table: TabulatedFunction,
}

impl ReadSpecies {
    pub fn new(
        mode: StatesMode,
        energies: Vec<f64>,
        values: Vec<f64>,
        band: f64,
    ) -> Result<Self, NumericError> {
        if let Some(bad) = values.iter().find(|v| **v < 0.0) {
            return Err(NumericError::InvalidTable(format!(
                "states must not be negative, found {}",
                bad
            )));
        }
        Ok(Self {
            mode,
            table: TabulatedFunction::power_law(energies, values, band)?,
        })
    }

    pub fn table(&self) -> &TabulatedFunction {
        &self.table
    }

    pub fn states(&self, energy: f64) -> Result<f64, NumericError> {
        if energy < 0.0 || (energy == 0.0 && self.table.x_min() > 0.0) {
            return Ok(0.0);
        }
        Ok(self.table.value(energy)?.max(0.0))
    }

    /// Laplace transform of the tabulated states; a density is integrated once more.
    pub fn weight(&self, temperature: f64) -> Result<f64, NumericError> {
        let transform = laplace_weight(|e| self.states(e), temperature, self.table.upper_limit())?;
        Ok(match self.mode {
            StatesMode::Density => transform * temperature,
            StatesMode::Number | StatesMode::NoStates => transform,
        })
    }
}

pub fn build(
    block: &KeywordBlock,
    name: &str,
    mode: StatesMode,
    config: &ModelConfig,
) -> Result<Species, ModelError> {
    if mode == StatesMode::NoStates {
        return Err(ModelError::input(
            block.path(),
            "a tabulated species needs a density or number mode",
        ));
    }
    let input: ReadInput = block.parse()?;
    let (energies, values) = companion_table(block, input.table, input.table_file)?;
    let rows = energies.len();
    let read = ReadSpecies::new(mode, energies, values, config.extrapolation_band)
        .map_err(|e| ModelError::input(block.path(), e.to_string()))?;
    debug!(path = block.path(), rows, %mode, "Read species states table.");
    Ok(Species::new(
        name,
        mode,
        input.zero_energy,
        SpeciesKind::Read(read),
    ))
}
