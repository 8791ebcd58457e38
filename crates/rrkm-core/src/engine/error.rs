use thiserror::Error;

use super::config::ConfigError;
use crate::core::math::NumericError;
use crate::core::mode::StatesMode;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Invalid input in '{block}': {message}")]
    Input { block: String, message: String },

    #[error("Missing required keyword '{keyword}' in '{block}'")]
    MissingKeyword { block: String, keyword: &'static str },

    #[error("Value of '{keyword}' in '{block}' is out of range: {reason}")]
    OutOfRange {
        block: String,
        keyword: &'static str,
        reason: String,
    },

    #[error("Unknown {family} type '{name}' in '{block}'")]
    UnknownVariant {
        block: String,
        family: &'static str,
        name: String,
    },

    #[error("Mode mismatch in '{block}': expected {expected}, found {found}")]
    ModeMismatch {
        block: String,
        expected: StatesMode,
        found: StatesMode,
    },

    #[error("Internal logic error: {0}")]
    Logic(String),

    #[error("Numeric failure in '{model}' at argument {argument}: {source}")]
    Numeric {
        model: String,
        argument: f64,
        source: NumericError,
    },

    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },

    #[error("CSV parsing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },

    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },
}

impl ModelError {
    pub fn input(block: &str, message: impl Into<String>) -> Self {
        ModelError::Input {
            block: block.to_string(),
            message: message.into(),
        }
    }

    pub fn out_of_range(block: &str, keyword: &'static str, reason: impl Into<String>) -> Self {
        ModelError::OutOfRange {
            block: block.to_string(),
            keyword,
            reason: reason.into(),
        }
    }

    pub fn numeric(model: &str, argument: f64, source: NumericError) -> Self {
        ModelError::Numeric {
            model: model.to_string(),
            argument,
            source,
        }
    }
}
