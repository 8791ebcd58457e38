use serde::Deserialize;
use std::path::PathBuf;
use tracing::debug;

use super::{Core, CoreKind, laplace_weight};
use crate::core::io::block::KeywordBlock;
use crate::core::io::table::companion_table;
use crate::core::math::NumericError;
use crate::core::math::tabulated::TabulatedFunction;
use crate::core::mode::StatesMode;
use crate::engine::config::ModelConfig;
use crate::engine::error::ModelError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RotdInput {
    table: Option<Vec<(f64, f64)>>,
    table_file: Option<PathBuf>,
}

/// Transitional-mode number of states read from a variational calculation.
#[derive(Debug, Clone)]
pub struct Rotd {
    table: TabulatedFunction,
}

impl Rotd {
    /// Wraps `(energy, number)` pairs; energies and numbers must be positive
    /// where the power-law extrapolation reaches.
    pub fn new(energies: Vec<f64>, numbers: Vec<f64>, band: f64) -> Result<Self, NumericError> {
        if let Some(bad) = numbers.iter().find(|n| **n < 0.0) {
            return Err(NumericError::InvalidTable(format!(
                "numbers of states must not be negative, found {}",
                bad
            )));
        }
        Ok(Self {
            table: TabulatedFunction::power_law(energies, numbers, band)?,
        })
    }

    pub fn table(&self) -> &TabulatedFunction {
        &self.table
    }

    pub fn number(&self, energy: f64) -> Result<f64, NumericError> {
        if energy <= 0.0 {
            return Ok(0.0);
        }
        Ok(self.table.value(energy)?.max(0.0))
    }

    pub fn density(&self, energy: f64) -> Result<f64, NumericError> {
        if energy <= 0.0 {
            return Ok(0.0);
        }
        Ok(self.table.derivative(energy)?.max(0.0))
    }

    pub fn weight(&self, temperature: f64) -> Result<f64, NumericError> {
        laplace_weight(|e| self.number(e), temperature, self.table.upper_limit())
    }
}

pub fn build(
    block: &KeywordBlock,
    mode: StatesMode,
    config: &ModelConfig,
) -> Result<Core, ModelError> {
    let input: RotdInput = block.parse()?;
    let (energies, numbers) = companion_table(block, input.table, input.table_file)?;
    let rows = energies.len();
    let rotd = Rotd::new(energies, numbers, config.extrapolation_band)
        .map_err(|e| ModelError::input(block.path(), e.to_string()))?;
    debug!(path = block.path(), rows, "Read transitional-mode states table.");
    Ok(Core::new(mode, CoreKind::Rotd(rotd)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::block::block_from_str;
    use crate::engine::config::test_config;
    use approx::assert_relative_eq;
    use std::io::Write;
    use tempfile::TempDir;

    fn quadratic_rotd() -> Rotd {
        let energies: Vec<f64> = (1..=50).map(|i| i as f64 * 10.0).collect();
        let numbers: Vec<f64> = energies.iter().map(|e| 0.01 * e * e).collect();
        Rotd::new(energies, numbers, 10.0).unwrap()
    }

    #[test]
    fn reproduces_table_and_follows_power_law_beyond() {
        let rotd = quadratic_rotd();
        assert_relative_eq!(rotd.number(200.0).unwrap(), 400.0, max_relative = 1e-10);
        let slope = rotd.table().upper_slope();
        assert_relative_eq!(slope, 2.0, max_relative = 0.15);
        let expected = 2500.0 * (1000.0_f64 / 500.0).powf(slope);
        assert_relative_eq!(rotd.number(1000.0).unwrap(), expected, max_relative = 1e-10);
    }

    #[test]
    fn weight_matches_quadratic_laplace_transform() {
        // N = 0.01 E² gives q = 0.02 T².
        let rotd = quadratic_rotd();
        assert_relative_eq!(rotd.weight(20.0).unwrap(), 8.0, max_relative = 3e-2);
    }

    #[test]
    fn query_beyond_band_is_an_error() {
        let rotd = quadratic_rotd();
        assert!(rotd.number(1e5).is_err());
    }

    #[test]
    fn build_reads_companion_file_relative_to_base_dir() {
        let dir = TempDir::new().unwrap();
        let mut file = std::fs::File::create(dir.path().join("rotd.csv")).unwrap();
        writeln!(file, "# energy, number").unwrap();
        for i in 1..=10 {
            writeln!(file, "{}, {}", i as f64, (i * i) as f64).unwrap();
        }
        let block = block_from_str("barrier.core", "type = \"rotd\"\ntable-file = \"rotd.csv\"")
            .with_base_dir(dir.path());
        let core = build(&block, StatesMode::Number, &test_config(1.0, 10.0)).unwrap();
        assert_relative_eq!(core.number(5.0).unwrap(), 25.0, max_relative = 1e-10);
    }

    #[test]
    fn build_rejects_negative_counts() {
        let block = block_from_str("core", "table = [[1.0, 1.0], [2.0, -3.0]]");
        let result = build(&block, StatesMode::Number, &test_config(1.0, 10.0));
        assert!(matches!(result, Err(ModelError::Input { .. })));
    }
}
