use serde::Deserialize;
use std::f64::consts::PI;

use super::{InternalRotation, Rotor};
use crate::core::io::block::KeywordBlock;
use crate::engine::config::ModelConfig;
use crate::engine::error::ModelError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct FreeRotorInput {
    rotational_constant: f64,
    #[serde(default = "default_symmetry")]
    symmetry: u32,
    group: Option<Vec<usize>>,
    axis: Option<[usize; 2]>,
}

pub(crate) fn default_symmetry() -> u32 {
    1
}

/// Free internal rotor with levels `b n²`, `b = B/σ²`, doubly degenerate above zero.
#[derive(Debug, Clone)]
pub struct FreeRotor {
    rotational_constant: f64,
    symmetry: u32,
    level_size: usize,
    descriptor: Option<InternalRotation>,
}

impl FreeRotor {
    pub fn new(rotational_constant: f64, symmetry: u32, config: &ModelConfig) -> Self {
        let b = rotational_constant / (symmetry as f64).powi(2);
        let ceiling = config.rotor_level_max();
        let mut n = (ceiling / b).sqrt().floor() as usize;
        while b * ((n + 1) as f64).powi(2) <= ceiling {
            n += 1;
        }
        while n > 0 && b * (n as f64).powi(2) > ceiling {
            n -= 1;
        }
        Self {
            rotational_constant,
            symmetry,
            level_size: n + 1,
            descriptor: None,
        }
    }

    pub fn rotational_constant(&self) -> f64 {
        self.rotational_constant
    }

    pub fn symmetry(&self) -> u32 {
        self.symmetry
    }

    pub fn descriptor(&self) -> Option<&InternalRotation> {
        self.descriptor.as_ref()
    }

    fn reduced_constant(&self) -> f64 {
        self.rotational_constant / (self.symmetry as f64).powi(2)
    }

    pub fn energy_level(&self, i: usize) -> f64 {
        self.reduced_constant() * (i as f64).powi(2)
    }

    pub fn level_size(&self) -> usize {
        self.level_size
    }

    pub fn level_degeneracy(&self, i: usize) -> usize {
        if i == 0 { 1 } else { 2 }
    }

    /// Theta-function sum `Σ_n exp(-b n²/T)` over all integers.
    ///
    /// At high temperature the Poisson-transformed series converges faster.
    pub fn weight(&self, temperature: f64) -> f64 {
        let x = self.reduced_constant() / temperature;
        if x < 1.0 {
            let dual = PI * PI / x;
            let tail: f64 = (1..)
                .map(|k: i32| (-dual * (k as f64).powi(2)).exp())
                .take_while(|term| *term > 1e-17)
                .sum();
            (PI / x).sqrt() * (1.0 + 2.0 * tail)
        } else {
            let tail: f64 = (1..)
                .map(|n: i32| (-x * (n as f64).powi(2)).exp())
                .take_while(|term| *term > 1e-17)
                .sum();
            1.0 + 2.0 * tail
        }
    }
}

pub fn build(block: &KeywordBlock, config: &ModelConfig) -> Result<Rotor, ModelError> {
    let input: FreeRotorInput = block.parse()?;
    if !(input.rotational_constant > 0.0) {
        return Err(ModelError::out_of_range(
            block.path(),
            "rotational-constant",
            format!("must be positive, got {}", input.rotational_constant),
        ));
    }
    let descriptor =
        InternalRotation::from_parts(block.path(), input.group, input.axis, input.symmetry)?;
    let mut rotor = FreeRotor::new(input.rotational_constant, input.symmetry, config);
    rotor.descriptor = descriptor;
    Ok(Rotor::Free(rotor))
}
