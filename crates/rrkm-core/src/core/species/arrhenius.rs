use serde::Deserialize;

use super::{Species, SpeciesKind};
use crate::core::io::block::KeywordBlock;
use crate::core::math::gamma::gamma;
use crate::core::mode::StatesMode;
use crate::engine::config::ModelConfig;
use crate::engine::error::ModelError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ArrheniusInput {
    activation_energy: f64,
    factor: f64,
    #[serde(default)]
    power: f64,
}

/// Barrier given by an Arrhenius form: `q(T) = A T^n` above the activation energy.
///
/// The matching count is the inverse Laplace transform `N(E) = A E^n / Γ(n+1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Arrhenius {
    factor: f64,
    power: f64,
}

impl Arrhenius {
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
        if energy < 0.0 {
            return 0.0;
        }
        self.factor * energy.powf(self.power) / gamma(self.power + 1.0)
    }

    pub fn density(&self, energy: f64) -> f64 {
        if energy <= 0.0 {
            return 0.0;
        }
        self.factor * energy.powf(self.power - 1.0) / gamma(self.power)
    }

    pub fn states(&self, mode: StatesMode, energy: f64) -> f64 {
        match mode {
            StatesMode::Density => self.density(energy),
            StatesMode::Number | StatesMode::NoStates => self.number(energy),
        }
    }

    pub fn weight(&self, temperature: f64) -> f64 {
        self.factor * temperature.powf(self.power)
    }
}

pub fn build(
    block: &KeywordBlock,
    name: &str,
    mode: StatesMode,
    _config: &ModelConfig,
) -> Result<Species, ModelError> {
    let input: ArrheniusInput = block.parse()?;
    let path = block.path();
    if !(input.factor > 0.0) {
        return Err(ModelError::out_of_range(
            path,
            "factor",
            format!("must be positive, got {}", input.factor),
        ));
    }
    let valid = match mode {
        StatesMode::Density => input.power > 0.0,
        StatesMode::Number | StatesMode::NoStates => input.power >= 0.0,
    };
    if !valid {
        return Err(ModelError::out_of_range(
            path,
            "power",
            format!(
                "must be positive in density mode and non-negative otherwise, got {}",
                input.power
            ),
        ));
    }
    Ok(Species::new(
        name,
        mode,
        input.activation_energy,
        SpeciesKind::Arrhenius(Arrhenius::new(input.factor, input.power)),
    ))
}
