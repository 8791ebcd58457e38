use serde::Deserialize;
use std::f64::consts::PI;

use super::{ActionModel, Tunnel};
use crate::core::io::block::KeywordBlock;
use crate::engine::config::ModelConfig;
use crate::engine::error::ModelError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct HarmonicInput {
    imaginary_frequency: f64,
    cutoff_energy: f64,
}

/// Parabolic-barrier action `S = -2πE/ω`.
pub fn action(frequency: f64, energy: f64, order: usize) -> f64 {
    if order == 0 {
        -2.0 * PI * energy / frequency
    } else {
        -2.0 * PI / frequency
    }
}

pub fn build(block: &KeywordBlock, config: &ModelConfig) -> Result<Tunnel, ModelError> {
    let input: HarmonicInput = block.parse()?;
    Tunnel::assemble(
        block.path(),
        input.imaginary_frequency,
        input.cutoff_energy,
        config,
        ActionModel::Harmonic,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::block::block_from_str;
    use crate::engine::config::test_config;

    #[test]
    fn builds_from_keyword_block() {
        let block = block_from_str(
            "barrier.tunnel",
            "type = \"harmonic\"\nimaginary-frequency = 1200.0\ncutoff-energy = 2500.0",
        );
        let tunnel = build(&block, &test_config(1.0, 100.0)).unwrap();
        assert_eq!(tunnel.cutoff(), -2500.0);
        assert_eq!(tunnel.frequency(), 1200.0);
    }

    #[test]
    fn action_is_linear_in_energy() {
        assert_eq!(action(2.0 * PI, 3.0, 0), -3.0);
        assert_eq!(action(2.0 * PI, 3.0, 1), -1.0);
    }

    #[test]
    fn missing_frequency_is_an_input_error() {
        let block = block_from_str("tunnel", "cutoff-energy = 10.0");
        assert!(build(&block, &test_config(1.0, 100.0)).is_err());
    }
}
