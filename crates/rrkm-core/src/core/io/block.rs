use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

use crate::core::mode::StatesMode;
use crate::engine::error::ModelError;

/// One keyword table plus the dotted path used in diagnostics.
#[derive(Debug, Clone)]
pub struct KeywordBlock {
    path: String,
    table: toml::Table,
    base_dir: Option<PathBuf>,
}

impl KeywordBlock {
    pub fn new(path: impl Into<String>, table: toml::Table) -> Self {
        Self {
            path: path.into(),
            table,
            base_dir: None,
        }
    }

    /// Directory against which relative companion-file paths are resolved.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn from_value(path: impl Into<String>, value: toml::Value) -> Result<Self, ModelError> {
        let path = path.into();
        match value {
            toml::Value::Table(table) => Ok(Self::new(path, table)),
            other => Err(ModelError::input(
                &path,
                format!("expected a table, found {}", other.type_str()),
            )),
        }
    }

    /// A nested block inheriting the base directory.
    pub fn child(&self, name: &str, table: toml::Table) -> KeywordBlock {
        KeywordBlock {
            path: format!("{}.{}", self.path, name),
            table,
            base_dir: self.base_dir.clone(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn table(&self) -> &toml::Table {
        &self.table
    }

    /// The `type` discriminant selecting a variant inside a model family.
    pub fn kind(&self) -> Result<&str, ModelError> {
        match self.table.get("type") {
            Some(toml::Value::String(name)) => Ok(name),
            Some(other) => Err(ModelError::input(
                &self.path,
                format!("'type' must be a string, found {}", other.type_str()),
            )),
            None => Err(ModelError::MissingKeyword {
                block: self.path.clone(),
                keyword: "type",
            }),
        }
    }

    /// Removes an optional string key, returning its value.
    pub fn take_string(&mut self, key: &str) -> Result<Option<String>, ModelError> {
        match self.table.remove(key) {
            None => Ok(None),
            Some(toml::Value::String(value)) => Ok(Some(value)),
            Some(other) => Err(ModelError::input(
                &self.path,
                format!("'{}' must be a string, found {}", key, other.type_str()),
            )),
        }
    }

    /// Removes an optional `mode` key, returning the parsed counting mode.
    pub fn take_mode(&mut self) -> Result<Option<StatesMode>, ModelError> {
        let path = self.path.clone();
        self.take_string("mode")?
            .map(|name| name.parse().map_err(|message: String| ModelError::input(&path, message)))
            .transpose()
    }

    /// Rejects an explicit `mode` that differs from the mode imposed by the parent.
    pub fn expect_mode(&mut self, expected: StatesMode) -> Result<(), ModelError> {
        match self.take_mode()? {
            Some(found) if found != expected => Err(ModelError::ModeMismatch {
                block: self.path.clone(),
                expected,
                found,
            }),
            _ => Ok(()),
        }
    }

    /// Deserializes the block (without its `type` key) into a typed input struct.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ModelError> {
        let mut table = self.table.clone();
        table.remove("type");
        toml::Value::Table(table)
            .try_into::<T>()
            .map_err(|e| ModelError::input(&self.path, e.to_string()))
    }

    pub fn resolve(&self, file: &Path) -> PathBuf {
        match &self.base_dir {
            Some(dir) if file.is_relative() => dir.join(file),
            _ => file.to_path_buf(),
        }
    }
}

#[cfg(test)]
pub(crate) fn block_from_str(path: &str, content: &str) -> KeywordBlock {
    let table: toml::Table = toml::from_str(content).unwrap();
    KeywordBlock::new(path, table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "kebab-case", deny_unknown_fields)]
    struct Sample {
        imaginary_frequency: f64,
    }

    #[test]
    fn parse_ignores_type_discriminant() {
        let block = block_from_str("tunnel", "type = \"harmonic\"\nimaginary-frequency = 1000.0");
        assert_eq!(block.kind().unwrap(), "harmonic");
        let sample: Sample = block.parse().unwrap();
        assert_eq!(sample.imaginary_frequency, 1000.0);
    }

    #[test]
    fn parse_rejects_unknown_keys_with_block_path() {
        let block = block_from_str("well.tunnel", "imaginary-frequency = 1.0\nbogus = 2");
        let err = block.parse::<Sample>().unwrap_err();
        assert!(matches!(err, ModelError::Input { ref block, .. } if block == "well.tunnel"));
    }

    #[test]
    fn missing_type_is_reported() {
        let block = block_from_str("core", "factor = 1.0");
        assert!(matches!(block.kind(), Err(ModelError::MissingKeyword { keyword: "type", .. })));
    }

    #[test]
    fn conflicting_mode_is_a_mode_mismatch() {
        let mut block = block_from_str("union.member", "mode = \"number\"");
        let err = block.expect_mode(StatesMode::Density).unwrap_err();
        assert!(matches!(err, ModelError::ModeMismatch { .. }));
    }

    #[test]
    fn child_paths_are_dotted() {
        let block = block_from_str("well", "");
        let child = block.child("core", toml::Table::new());
        assert_eq!(child.path(), "well.core");
    }
}
