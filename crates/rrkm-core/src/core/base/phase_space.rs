use serde::Deserialize;

use super::{Core, CoreKind};
use crate::core::io::block::KeywordBlock;
use crate::core::math::gamma::gamma;
use crate::core::mode::StatesMode;
use crate::engine::config::ModelConfig;
use crate::engine::error::ModelError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PhaseSpaceInput {
    states_factor: f64,
    power: f64,
}

/// Phase-space-theory transitional modes: `N(E) = f E^p`.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSpaceTheory {
    factor: f64,
    power: f64,
}

impl PhaseSpaceTheory {
    pub fn new(factor: f64, power: f64) -> Self {
        Self { factor, power }
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn power(&self) -> f64 {
        self.power
    }

    pub fn number(&self, energy: f64) -> f64 {
        self.factor * energy.powf(self.power)
    }

    pub fn density(&self, energy: f64) -> f64 {
        self.factor * self.power * energy.powf(self.power - 1.0)
    }

    /// `f Γ(p+1) T^p`.
    pub fn weight(&self, temperature: f64) -> f64 {
        self.factor * gamma(self.power + 1.0) * temperature.powf(self.power)
    }
}

pub fn build(
    block: &KeywordBlock,
    mode: StatesMode,
    _config: &ModelConfig,
) -> Result<Core, ModelError> {
    let input: PhaseSpaceInput = block.parse()?;
    if !(input.states_factor > 0.0) {
        return Err(ModelError::out_of_range(
            block.path(),
            "states-factor",
            format!("must be positive, got {}", input.states_factor),
        ));
    }
    if !(input.power > 0.0) {
        return Err(ModelError::out_of_range(
            block.path(),
            "power",
            format!("must be positive, got {}", input.power),
        ));
    }
    Ok(Core::new(
        mode,
        CoreKind::PhaseSpaceTheory(PhaseSpaceTheory::new(input.states_factor, input.power)),
    ))
}
