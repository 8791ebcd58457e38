//! Discriminant-to-constructor tables for every model family.
//!
//! Each family keeps a static `phf` map from the `type` keyword to the
//! variant's `build` function. Blocks carrying a `mode` key are checked
//! against the mode imposed by their parent before dispatch.

use phf::{Map, phf_map};
use tracing::trace;

use super::config::ModelConfig;
use super::error::ModelError;
use crate::core::base::{self, Core};
use crate::core::io::block::KeywordBlock;
use crate::core::mode::StatesMode;
use crate::core::rotor::{self, Rotor};
use crate::core::species::{self, Species};
use crate::core::tunnel::{self, Tunnel};

type TunnelBuilder = fn(&KeywordBlock, &ModelConfig) -> Result<Tunnel, ModelError>;
type RotorBuilder = fn(&KeywordBlock, &ModelConfig) -> Result<Rotor, ModelError>;
type CoreBuilder = fn(&KeywordBlock, StatesMode, &ModelConfig) -> Result<Core, ModelError>;
type SpeciesBuilder =
    fn(&KeywordBlock, &str, StatesMode, &ModelConfig) -> Result<Species, ModelError>;

static TUNNELS: Map<&'static str, TunnelBuilder> = phf_map! {
    "harmonic" => tunnel::harmonic::build,
    "eckart" => tunnel::eckart::build,
    "quartic" => tunnel::quartic::build,
    "read" => tunnel::read::build,
};

static ROTORS: Map<&'static str, RotorBuilder> = phf_map! {
    "free" => rotor::free::build,
    "hindered" => rotor::hindered::build,
    "umbrella" => rotor::umbrella::build,
};

static CORES: Map<&'static str, CoreBuilder> = phf_map! {
    "rigid-rotor" => base::rigid_rotor::build,
    "phase-space-theory" => base::phase_space::build,
    "rotd" => base::rotd::build,
    "multi-rotor" => base::multirotor::build,
};

static SPECIES: Map<&'static str, SpeciesBuilder> = phf_map! {
    "rrho" => species::rrho::build,
    "read" => species::read::build,
    "union" => species::union::build,
    "variational" => species::var_barrier::build,
    "atomic" => species::atomic::build,
    "arrhenius" => species::arrhenius::build,
};

fn lookup<T: Copy>(
    map: &Map<&'static str, T>,
    block: &KeywordBlock,
    family: &'static str,
) -> Result<T, ModelError> {
    let name = block.kind()?;
    trace!(path = block.path(), family, variant = name, "Dispatching model block.");
    map.get(name)
        .copied()
        .ok_or_else(|| ModelError::UnknownVariant {
            block: block.path().to_string(),
            family,
            name: name.to_string(),
        })
}

/// Variant names accepted for `family`, sorted.
pub fn variant_names(family: &str) -> Vec<&'static str> {
    let mut names: Vec<&'static str> = match family {
        "tunnel" => TUNNELS.keys().copied().collect(),
        "rotor" => ROTORS.keys().copied().collect(),
        "core" => CORES.keys().copied().collect(),
        "species" => SPECIES.keys().copied().collect(),
        _ => Vec::new(),
    };
    names.sort_unstable();
    names
}

pub fn build_tunnel(block: &KeywordBlock, config: &ModelConfig) -> Result<Tunnel, ModelError> {
    lookup(&TUNNELS, block, "tunnel")?(block, config)
}

pub fn build_rotor(block: &KeywordBlock, config: &ModelConfig) -> Result<Rotor, ModelError> {
    lookup(&ROTORS, block, "rotor")?(block, config)
}

pub fn build_core(
    block: &KeywordBlock,
    mode: StatesMode,
    config: &ModelConfig,
) -> Result<Core, ModelError> {
    let mut block = block.clone();
    block.expect_mode(mode)?;
    lookup(&CORES, &block, "core")?(&block, mode, config)
}

pub fn build_species(
    block: &KeywordBlock,
    name: &str,
    mode: StatesMode,
    config: &ModelConfig,
) -> Result<Species, ModelError> {
    let mut block = block.clone();
    block.expect_mode(mode)?;
    lookup(&SPECIES, &block, "species")?(&block, name, mode, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::block::block_from_str;
    use crate::engine::config::test_config;

    #[test]
    fn unknown_variant_names_the_family() {
        let block = block_from_str("well.W.tunnel", "type = \"wkb\"");
        let err = build_tunnel(&block, &test_config(1.0, 100.0)).unwrap_err();
        assert!(matches!(
            err,
            ModelError::UnknownVariant { family: "tunnel", ref name, .. } if name == "wkb"
        ));
    }

    #[test]
    fn species_dispatch_strips_a_matching_mode() {
        let block = block_from_str(
            "well.W",
            "type = \"atomic\"\nmode = \"number\"\nzero-energy = 2.0",
        );
        let species = build_species(&block, "W", StatesMode::Number, &test_config(1.0, 10.0))
            .unwrap();
        assert_eq!(species.ground(), 2.0);
        assert_eq!(species.mode(), StatesMode::Number);
    }

    #[test]
    fn core_in_another_mode_is_rejected() {
        let block = block_from_str(
            "well.W.core",
            "type = \"phase-space-theory\"\nmode = \"density\"",
        );
        let err = build_core(&block, StatesMode::Number, &test_config(1.0, 10.0)).unwrap_err();
        assert!(matches!(err, ModelError::ModeMismatch { .. }));
    }

    #[test]
    fn variant_tables_are_complete() {
        assert_eq!(variant_names("tunnel"), ["eckart", "harmonic", "quartic", "read"]);
        assert_eq!(variant_names("rotor"), ["free", "hindered", "umbrella"]);
        assert_eq!(
            variant_names("core"),
            ["multi-rotor", "phase-space-theory", "rigid-rotor", "rotd"]
        );
        assert_eq!(variant_names("species").len(), 6);
        assert!(variant_names("escape").is_empty());
    }
}
