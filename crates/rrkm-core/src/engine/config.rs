use serde::Deserialize;
use thiserror::Error;

use crate::core::math::roots::RootSearch;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Which estimate a one-dimensional rotor reports as its canonical weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RotorWeightMethod {
    #[default]
    Quantum,
    Classical,
    PathIntegral,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RotorControls {
    /// Highest level kept, relative to the rotor ground. `None` follows the interpolation ceiling.
    pub level_energy_max: Option<f64>,
    pub ham_size_min: usize,
    pub ham_size_max: usize,
    pub grid_size: usize,
    /// Minimum `E_top / T` of the level ladder for the quantum weight to be trusted.
    pub thermal_power_max: f64,
    pub weight_method: RotorWeightMethod,
}

impl Default for RotorControls {
    fn default() -> Self {
        Self {
            level_energy_max: None,
            ham_size_min: 11,
            ham_size_max: 401,
            grid_size: 360,
            thermal_power_max: 20.0,
            weight_method: RotorWeightMethod::Quantum,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TunnelControls {
    pub action_max: f64,
    pub weight_tolerance: f64,
    pub action_grid_size: usize,
}

impl Default for TunnelControls {
    fn default() -> Self {
        Self {
            action_max: 100.0,
            weight_tolerance: 1e-10,
            action_grid_size: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultiRotorControls {
    /// Quantum levels are computed up to this energy above the potential minimum.
    /// `None` follows the interpolation ceiling.
    pub level_energy_max: Option<f64>,
    pub mass_tolerance: f64,
    pub potential_tolerance: f64,
    pub full_quantum: bool,
    pub external_rotation: bool,
}

impl Default for MultiRotorControls {
    fn default() -> Self {
        Self {
            level_energy_max: None,
            mass_tolerance: 1e-8,
            potential_tolerance: 1e-8,
            full_quantum: false,
            external_rotation: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RootSearchControls {
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for RootSearchControls {
    fn default() -> Self {
        Self {
            tolerance: 1e-12,
            max_iterations: 200,
        }
    }
}

/// Immutable numerical settings threaded through every model constructor.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub energy_step: f64,
    pub interpolation_energy_max: f64,
    pub energy_limit: Option<f64>,
    pub extrapolation_band: f64,
    pub rotor: RotorControls,
    pub tunnel: TunnelControls,
    pub multirotor: MultiRotorControls,
    pub root_search: RootSearchControls,
}

impl ModelConfig {
    /// Number of points of the shared energy grid `0, δ, ..., floor(E_max/δ) δ`.
    pub fn grid_size(&self) -> usize {
        (self.interpolation_energy_max / self.energy_step + 1e-9).floor() as usize + 1
    }

    pub fn rotor_level_max(&self) -> f64 {
        self.rotor
            .level_energy_max
            .unwrap_or(self.interpolation_energy_max)
    }

    pub fn multirotor_level_max(&self) -> f64 {
        self.multirotor
            .level_energy_max
            .unwrap_or(self.interpolation_energy_max)
    }

    pub fn root_search(&self) -> RootSearch {
        RootSearch {
            tolerance: self.root_search.tolerance,
            max_iterations: self.root_search.max_iterations,
        }
    }
}

#[derive(Default)]
pub struct ModelConfigBuilder {
    energy_step: Option<f64>,
    interpolation_energy_max: Option<f64>,
    energy_limit: Option<f64>,
    extrapolation_band: Option<f64>,
    rotor: Option<RotorControls>,
    tunnel: Option<TunnelControls>,
    multirotor: Option<MultiRotorControls>,
    root_search: Option<RootSearchControls>,
}

impl ModelConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn energy_step(mut self, step: f64) -> Self {
        self.energy_step = Some(step);
        self
    }
    pub fn interpolation_energy_max(mut self, energy: f64) -> Self {
        self.interpolation_energy_max = Some(energy);
        self
    }
    pub fn energy_limit(mut self, energy: f64) -> Self {
        self.energy_limit = Some(energy);
        self
    }
    pub fn extrapolation_band(mut self, band: f64) -> Self {
        self.extrapolation_band = Some(band);
        self
    }
    pub fn rotor(mut self, controls: RotorControls) -> Self {
        self.rotor = Some(controls);
        self
    }
    pub fn tunnel(mut self, controls: TunnelControls) -> Self {
        self.tunnel = Some(controls);
        self
    }
    pub fn multirotor(mut self, controls: MultiRotorControls) -> Self {
        self.multirotor = Some(controls);
        self
    }
    pub fn root_search(mut self, controls: RootSearchControls) -> Self {
        self.root_search = Some(controls);
        self
    }

    pub fn build(self) -> Result<ModelConfig, ConfigError> {
        let energy_step = self
            .energy_step
            .ok_or(ConfigError::MissingParameter("energy_step"))?;
        let interpolation_energy_max = self
            .interpolation_energy_max
            .ok_or(ConfigError::MissingParameter("interpolation_energy_max"))?;

        if !(energy_step > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "energy_step",
                reason: format!("must be positive, got {}", energy_step),
            });
        }
        if !(interpolation_energy_max > energy_step) {
            return Err(ConfigError::InvalidParameter {
                name: "interpolation_energy_max",
                reason: format!(
                    "must exceed the energy step {}, got {}",
                    energy_step, interpolation_energy_max
                ),
            });
        }

        let extrapolation_band = self.extrapolation_band.unwrap_or(10.0);
        if !(extrapolation_band >= 1.0) {
            return Err(ConfigError::InvalidParameter {
                name: "extrapolation_band",
                reason: format!("must be at least 1, got {}", extrapolation_band),
            });
        }

        let rotor = self.rotor.unwrap_or_default();
        if rotor.ham_size_min == 0 || rotor.ham_size_min > rotor.ham_size_max {
            return Err(ConfigError::InvalidParameter {
                name: "rotor.ham_size_min",
                reason: format!(
                    "must be positive and not exceed ham_size_max ({} > {})",
                    rotor.ham_size_min, rotor.ham_size_max
                ),
            });
        }
        if rotor.grid_size < 8 {
            return Err(ConfigError::InvalidParameter {
                name: "rotor.grid_size",
                reason: format!("at least 8 points are needed, got {}", rotor.grid_size),
            });
        }

        let tunnel = self.tunnel.unwrap_or_default();
        if tunnel.action_grid_size < 4 {
            return Err(ConfigError::InvalidParameter {
                name: "tunnel.action_grid_size",
                reason: format!("at least 4 points are needed, got {}", tunnel.action_grid_size),
            });
        }

        let root_search = self.root_search.unwrap_or_default();
        if root_search.max_iterations == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "root_search.max_iterations",
                reason: "must be positive".to_string(),
            });
        }

        Ok(ModelConfig {
            energy_step,
            interpolation_energy_max,
            energy_limit: self.energy_limit,
            extrapolation_band,
            rotor,
            tunnel,
            multirotor: self.multirotor.unwrap_or_default(),
            root_search,
        })
    }
}

#[cfg(test)]
pub(crate) fn test_config(step: f64, max: f64) -> ModelConfig {
    ModelConfigBuilder::new()
        .energy_step(step)
        .interpolation_energy_max(max)
        .build()
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_energy_step() {
        let result = ModelConfigBuilder::new()
            .interpolation_energy_max(1000.0)
            .build();
        assert_eq!(result, Err(ConfigError::MissingParameter("energy_step")));
    }

    #[test]
    fn builder_requires_interpolation_ceiling() {
        let result = ModelConfigBuilder::new().energy_step(1.0).build();
        assert_eq!(
            result,
            Err(ConfigError::MissingParameter("interpolation_energy_max"))
        );
    }

    #[test]
    fn builder_applies_defaults() {
        let config = test_config(10.0, 1000.0);
        assert_eq!(config.extrapolation_band, 10.0);
        assert_eq!(config.rotor, RotorControls::default());
        assert_eq!(config.grid_size(), 101);
        assert_eq!(config.rotor_level_max(), 1000.0);
    }

    #[test]
    fn builder_rejects_non_positive_step() {
        let result = ModelConfigBuilder::new()
            .energy_step(0.0)
            .interpolation_energy_max(10.0)
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidParameter { name: "energy_step", .. })
        ));
    }

    #[test]
    fn builder_rejects_inverted_hamiltonian_sizes() {
        let rotor = RotorControls {
            ham_size_min: 50,
            ham_size_max: 10,
            ..RotorControls::default()
        };
        let result = ModelConfigBuilder::new()
            .energy_step(1.0)
            .interpolation_energy_max(100.0)
            .rotor(rotor)
            .build();
        assert!(result.is_err());
    }
}
