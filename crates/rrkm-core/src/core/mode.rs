use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// What a model's `states` query returns.
///
/// The mode is fixed when a model is constructed and is uniform across every
/// sub-object of a composite model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatesMode {
    /// Energy derivative of the cumulative count.
    Density,
    /// Cumulative number of states.
    Number,
    /// Only the canonical weight is available.
    NoStates,
}

impl StatesMode {
    pub fn has_states(self) -> bool {
        !matches!(self, StatesMode::NoStates)
    }
}

impl fmt::Display for StatesMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatesMode::Density => "density",
            StatesMode::Number => "number",
            StatesMode::NoStates => "no-states",
        };
        f.write_str(name)
    }
}

impl FromStr for StatesMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "density" => Ok(StatesMode::Density),
            "number" => Ok(StatesMode::Number),
            "no-states" => Ok(StatesMode::NoStates),
            other => Err(format!("unknown states mode '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays_every_mode() {
        for mode in [StatesMode::Density, StatesMode::Number, StatesMode::NoStates] {
            let parsed: StatesMode = mode.to_string().parse().unwrap();
            assert_eq!(parsed, mode);
        }
    }

    #[test]
    fn rejects_unknown_mode_name() {
        assert!("sum".parse::<StatesMode>().is_err());
    }

    #[test]
    fn only_no_states_lacks_states() {
        assert!(StatesMode::Density.has_states());
        assert!(StatesMode::Number.has_states());
        assert!(!StatesMode::NoStates.has_states());
    }
}
