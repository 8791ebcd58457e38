//! Semiclassical tunneling through a one-dimensional barrier.
//!
//! Every energy handled here is measured from the barrier top. The transmission
//! factor is `1 / (1 + exp(S(E)))` where `S` is the barrier-penetration action;
//! it is exactly one half where the action vanishes. The closed-form and
//! fitted variants put that point at the barrier top; a read tunnel puts it
//! wherever its table crosses zero.

pub mod eckart;
pub mod harmonic;
pub mod quartic;
pub mod read;

use std::f64::consts::PI;

use crate::core::math::NumericError;
use crate::core::math::hyperbolic::{logistic_complement, softplus};
use crate::core::math::quadrature::simpson;
use crate::engine::config::ModelConfig;
use crate::engine::error::ModelError;
use eckart::EckartAction;
use quartic::QuarticAction;
use read::ReadAction;

const MAX_WEIGHT_POINTS: usize = 1_000_000;
const SATURATION_STEPS_MAX: usize = 100_000;

#[derive(Debug, Clone)]
pub enum ActionModel {
    Harmonic,
    Eckart(EckartAction),
    Quartic(QuarticAction),
    Read(ReadAction),
}

#[derive(Debug, Clone)]
pub struct Tunnel {
    cutoff: f64,
    frequency: f64,
    action_max: f64,
    weight_tolerance: f64,
    model: ActionModel,
}

impl Tunnel {
    /// Assembles a tunnel after validating the settings shared by all variants.
    ///
    /// `cutoff_depth` is the positive distance of the cutoff below the barrier top.
    pub(crate) fn assemble(
        block: &str,
        frequency: f64,
        cutoff_depth: f64,
        config: &ModelConfig,
        model: ActionModel,
    ) -> Result<Self, ModelError> {
        if !(frequency > 0.0) {
            return Err(ModelError::out_of_range(
                block,
                "imaginary-frequency",
                format!("must be positive, got {}", frequency),
            ));
        }
        if !(cutoff_depth >= 0.0) {
            return Err(ModelError::out_of_range(
                block,
                "cutoff-energy",
                format!("must not be negative, got {}", cutoff_depth),
            ));
        }
        Ok(Self {
            cutoff: -cutoff_depth,
            frequency,
            action_max: config.tunnel.action_max,
            weight_tolerance: config.tunnel.weight_tolerance,
            model,
        })
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn model(&self) -> &ActionModel {
        &self.model
    }

    /// Barrier-penetration action (`order = 0`) or its energy derivative (`order = 1`).
    pub fn action(&self, energy: f64, order: usize) -> Result<f64, NumericError> {
        if order > 1 {
            return Err(NumericError::UnsupportedDerivative(order));
        }
        match &self.model {
            ActionModel::Harmonic => Ok(harmonic::action(self.frequency, energy, order)),
            ActionModel::Eckart(model) => Ok(model.action(energy, order)),
            ActionModel::Quartic(model) => model.action(energy, order),
            ActionModel::Read(model) => model.action(energy, order),
        }
    }

    /// Transmission probability at `energy`.
    pub fn factor(&self, energy: f64) -> Result<f64, NumericError> {
        if energy < self.cutoff {
            return Ok(0.0);
        }
        let action = self.action(energy, 0)?;
        if action > self.action_max {
            return Ok(0.0);
        }
        Ok(logistic_complement(action))
    }

    /// Energy derivative of [`Tunnel::factor`]; never negative.
    pub fn density(&self, energy: f64) -> Result<f64, NumericError> {
        if energy < self.cutoff {
            return Ok(0.0);
        }
        let action = self.action(energy, 0)?;
        if action > self.action_max {
            return Ok(0.0);
        }
        let factor = logistic_complement(action);
        let derivative = self.action(energy, 1)?;
        Ok((-derivative * factor * (1.0 - factor)).max(0.0))
    }

    /// Energy above which the factor is one to within the weight tolerance.
    fn saturation_energy(&self) -> Result<f64, NumericError> {
        let threshold = self.weight_tolerance.ln();
        let step = self.frequency / (2.0 * PI);
        let mut energy = 0.0_f64.max(self.cutoff);
        for _ in 0..SATURATION_STEPS_MAX {
            if self.action(energy, 0)? < threshold {
                return Ok(energy);
            }
            energy += step;
        }
        Err(NumericError::IllConditioned(format!(
            "tunneling factor does not saturate below {}",
            energy
        )))
    }

    /// Thermal transmission coefficient relative to the barrier top.
    ///
    /// Equals one in the classical limit.
    pub fn weight(&self, temperature: f64) -> Result<f64, NumericError> {
        self.shifted_weight(temperature, 0.0)
    }

    /// `weight(T) * exp(shift / T)`, evaluated without forming either factor.
    ///
    /// With `shift` equal to the cutoff this is the weight referenced to the
    /// lowest tunneling energy, which stays finite at low temperature.
    pub fn shifted_weight(&self, temperature: f64, shift: f64) -> Result<f64, NumericError> {
        if !(temperature > 0.0) {
            return Err(NumericError::OutOfRange {
                x: temperature,
                min: 0.0,
                max: f64::INFINITY,
            });
        }
        let upper = self.saturation_energy()?;
        let step = temperature.min(self.frequency / (2.0 * PI)) / 8.0;
        let intervals = (((upper - self.cutoff) / step).ceil() as usize).clamp(2, MAX_WEIGHT_POINTS);
        let step = (upper - self.cutoff) / intervals as f64;

        let values = (0..=intervals)
            .map(|i| {
                let energy = self.cutoff + step * i as f64;
                let action = self.action(energy, 0)?;
                if action > self.action_max {
                    return Ok(0.0);
                }
                Ok((-(energy - shift) / temperature - softplus(action)).exp() / temperature)
            })
            .collect::<Result<Vec<f64>, NumericError>>()?;

        Ok(simpson(&values, step) + (-(upper - shift) / temperature).exp())
    }

    /// Folds the tunneling density into a grid of states.
    ///
    /// On entry `states[i]` is the count at `i * step` above the barrier top; on
    /// exit `states[k]` is the tunneling-corrected count at `cutoff + k * step`.
    pub fn convolute(&self, states: &mut [f64], step: f64) -> Result<(), NumericError> {
        let n = states.len();
        if n == 0 {
            return Ok(());
        }
        let boundaries = (0..=n)
            .map(|j| self.factor(self.cutoff + step * j as f64))
            .collect::<Result<Vec<f64>, NumericError>>()?;
        let weights: Vec<f64> = boundaries.windows(2).map(|w| w[1] - w[0]).collect();
        let Some(last) = weights.iter().rposition(|&w| w.abs() > f64::EPSILON * 1e-2) else {
            states.fill(0.0);
            return Ok(());
        };

        let base = states.to_vec();
        for (k, slot) in states.iter_mut().enumerate() {
            *slot = (0..=k.min(last)).map(|j| base[k - j] * weights[j]).sum();
        }
        Ok(())
    }
}
