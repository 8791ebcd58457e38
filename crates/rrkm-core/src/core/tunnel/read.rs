use serde::Deserialize;
use std::path::PathBuf;

use super::{ActionModel, Tunnel};
use crate::core::io::block::KeywordBlock;
use crate::core::io::table::companion_table;
use crate::core::math::NumericError;
use crate::core::math::tabulated::TabulatedFunction;
use crate::engine::config::ModelConfig;
use crate::engine::error::ModelError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ReadInput {
    imaginary_frequency: f64,
    cutoff_energy: f64,
    table: Option<Vec<(f64, f64)>>,
    table_file: Option<PathBuf>,
}

/// Action tabulated against energy relative to the barrier top.
#[derive(Debug, Clone)]
pub struct ReadAction {
    table: TabulatedFunction,
}

impl ReadAction {
    pub fn action(&self, energy: f64, order: usize) -> Result<f64, NumericError> {
        if order == 0 {
            self.table.value(energy)
        } else {
            self.table.derivative(energy)
        }
    }
}

pub fn build(block: &KeywordBlock, config: &ModelConfig) -> Result<Tunnel, ModelError> {
    let input: ReadInput = block.parse()?;
    let (energies, actions) = companion_table(block, input.table, input.table_file)?;
    let table = TabulatedFunction::linear(energies, actions, config.extrapolation_band)
        .map_err(|e| ModelError::input(block.path(), e.to_string()))?;
    if table.x_min() > -input.cutoff_energy {
        return Err(ModelError::out_of_range(
            block.path(),
            "cutoff-energy",
            format!(
                "the action table starts at {} and does not reach the cutoff {}",
                table.x_min(),
                -input.cutoff_energy
            ),
        ));
    }
    Tunnel::assemble(
        block.path(),
        input.imaginary_frequency,
        input.cutoff_energy,
        config,
        ActionModel::Read(ReadAction { table }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::block::block_from_str;
    use crate::engine::config::test_config;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn parabolic_rows() -> String {
        (0..=20)
            .map(|i| {
                let e = -2000.0 + 200.0 * i as f64;
                format!("[{:.1}, {:.10}]", e, -2.0 * PI * e / 1000.0)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    #[test]
    fn tabulated_parabolic_action_reproduces_harmonic_tunnel() {
        let content = format!(
            "imaginary-frequency = 1000.0\ncutoff-energy = 1500.0\ntable = [{}]",
            parabolic_rows()
        );
        let tunnel = build(&block_from_str("tunnel", &content), &test_config(1.0, 100.0)).unwrap();
        assert_relative_eq!(tunnel.factor(0.0).unwrap(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(
            tunnel.action(-700.0, 0).unwrap(),
            2.0 * PI * 0.7,
            max_relative = 1e-9
        );
        assert_relative_eq!(
            tunnel.action(3000.0, 1).unwrap(),
            -2.0 * PI / 1000.0,
            max_relative = 1e-9
        );
    }

    #[test]
    fn reads_action_from_companion_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "-1000.0, 6.0").unwrap();
        writeln!(file, "0.0, 0.0").unwrap();
        writeln!(file, "1000.0, -6.0").unwrap();
        let content = format!(
            "imaginary-frequency = 1000.0\ncutoff-energy = 500.0\ntable-file = \"{}\"",
            file.path().display()
        );
        let tunnel = build(&block_from_str("tunnel", &content), &test_config(1.0, 100.0)).unwrap();
        assert_relative_eq!(tunnel.action(-500.0, 0).unwrap(), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn table_must_cover_cutoff() {
        let content = format!(
            "imaginary-frequency = 1000.0\ncutoff-energy = 5000.0\ntable = [{}]",
            parabolic_rows()
        );
        let result = build(&block_from_str("tunnel", &content), &test_config(1.0, 100.0));
        assert!(matches!(result, Err(ModelError::OutOfRange { .. })));
    }

    #[test]
    fn factor_rises_monotonically_from_cutoff_past_the_table() {
        // A steepening action, S = -2πE/ω - 1e-7 E³.
        let rows = (0..=40)
            .map(|i| {
                let e = -2000.0 + 100.0 * i as f64;
                format!("[{:.1}, {:.10}]", e, -2.0 * PI * e / 1000.0 - 1e-7 * e * e * e)
            })
            .collect::<Vec<_>>()
            .join(", ");
        let content = format!(
            "imaginary-frequency = 1000.0\ncutoff-energy = 1500.0\ntable = [{}]",
            rows
        );
        let tunnel = build(&block_from_str("tunnel", &content), &test_config(1.0, 100.0)).unwrap();
        let mut previous = 0.0;
        for i in 0..=220 {
            let energy = -1500.0 + 25.0 * i as f64;
            let factor = tunnel.factor(energy).unwrap();
            assert!(factor + 1e-15 >= previous, "factor decreases at {}", energy);
            assert!(tunnel.density(energy).unwrap() >= 0.0, "negative density at {}", energy);
            previous = factor;
        }
        assert_relative_eq!(tunnel.factor(0.0).unwrap(), 0.5, epsilon = 1e-12);
    }
}
