use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::core::io::block::KeywordBlock;
use crate::core::mode::StatesMode;
use crate::engine::config::{
    ModelConfig, ModelConfigBuilder, MultiRotorControls, RootSearchControls, RotorControls,
    RotorWeightMethod, TunnelControls,
};
use crate::engine::error::ModelError;
use crate::engine::factory;
use crate::engine::registry::ModelRegistry;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialRotorConfig {
    level_energy_max: Option<f64>,
    ham_size_min: Option<usize>,
    ham_size_max: Option<usize>,
    grid_size: Option<usize>,
    thermal_power_max: Option<f64>,
    weight_method: Option<RotorWeightMethod>,
}

impl From<PartialRotorConfig> for RotorControls {
    fn from(p: PartialRotorConfig) -> Self {
        let d = RotorControls::default();
        Self {
            level_energy_max: p.level_energy_max.or(d.level_energy_max),
            ham_size_min: p.ham_size_min.unwrap_or(d.ham_size_min),
            ham_size_max: p.ham_size_max.unwrap_or(d.ham_size_max),
            grid_size: p.grid_size.unwrap_or(d.grid_size),
            thermal_power_max: p.thermal_power_max.unwrap_or(d.thermal_power_max),
            weight_method: p.weight_method.unwrap_or(d.weight_method),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialTunnelConfig {
    action_max: Option<f64>,
    weight_tolerance: Option<f64>,
    action_grid_size: Option<usize>,
}

impl From<PartialTunnelConfig> for TunnelControls {
    fn from(p: PartialTunnelConfig) -> Self {
        let d = TunnelControls::default();
        Self {
            action_max: p.action_max.unwrap_or(d.action_max),
            weight_tolerance: p.weight_tolerance.unwrap_or(d.weight_tolerance),
            action_grid_size: p.action_grid_size.unwrap_or(d.action_grid_size),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialMultiRotorConfig {
    level_energy_max: Option<f64>,
    mass_tolerance: Option<f64>,
    potential_tolerance: Option<f64>,
    full_quantum: Option<bool>,
    external_rotation: Option<bool>,
}

impl From<PartialMultiRotorConfig> for MultiRotorControls {
    fn from(p: PartialMultiRotorConfig) -> Self {
        let d = MultiRotorControls::default();
        Self {
            level_energy_max: p.level_energy_max.or(d.level_energy_max),
            mass_tolerance: p.mass_tolerance.unwrap_or(d.mass_tolerance),
            potential_tolerance: p.potential_tolerance.unwrap_or(d.potential_tolerance),
            full_quantum: p.full_quantum.unwrap_or(d.full_quantum),
            external_rotation: p.external_rotation.unwrap_or(d.external_rotation),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialRootSearchConfig {
    tolerance: Option<f64>,
    max_iterations: Option<usize>,
}

impl From<PartialRootSearchConfig> for RootSearchControls {
    fn from(p: PartialRootSearchConfig) -> Self {
        let d = RootSearchControls::default();
        Self {
            tolerance: p.tolerance.unwrap_or(d.tolerance),
            max_iterations: p.max_iterations.unwrap_or(d.max_iterations),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialModelConfig {
    energy_step: Option<f64>,
    interpolation_energy_max: Option<f64>,
    energy_limit: Option<f64>,
    extrapolation_band: Option<f64>,
    rotor: Option<PartialRotorConfig>,
    tunnel: Option<PartialTunnelConfig>,
    multirotor: Option<PartialMultiRotorConfig>,
    root_search: Option<PartialRootSearchConfig>,
}

impl PartialModelConfig {
    fn into_builder(self) -> ModelConfigBuilder {
        let mut builder = ModelConfigBuilder::new();
        if let Some(step) = self.energy_step {
            builder = builder.energy_step(step);
        }
        if let Some(max) = self.interpolation_energy_max {
            builder = builder.interpolation_energy_max(max);
        }
        if let Some(limit) = self.energy_limit {
            builder = builder.energy_limit(limit);
        }
        if let Some(band) = self.extrapolation_band {
            builder = builder.extrapolation_band(band);
        }
        if let Some(rotor) = self.rotor {
            builder = builder.rotor(rotor.into());
        }
        if let Some(tunnel) = self.tunnel {
            builder = builder.tunnel(tunnel.into());
        }
        if let Some(multirotor) = self.multirotor {
            builder = builder.multirotor(multirotor.into());
        }
        if let Some(root_search) = self.root_search {
            builder = builder.root_search(root_search.into());
        }
        builder
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ModelDocument {
    reference: Option<String>,
    #[serde(default)]
    config: PartialModelConfig,
    #[serde(default)]
    well: Vec<toml::Table>,
    #[serde(default)]
    bimolecular: Vec<toml::Table>,
    #[serde(default)]
    barrier: Vec<toml::Table>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct BimolecularInput {
    ground_energy: Option<f64>,
    #[serde(default)]
    dummy: bool,
    #[serde(default)]
    fragment: Vec<toml::Table>,
}

/// A fully built kinetic model.
#[derive(Debug)]
pub struct Model {
    pub config: ModelConfig,
    pub registry: ModelRegistry,
}

/// Reads a model document, resolving companion files next to it.
pub fn load_model(path: &Path) -> Result<Model, ModelError> {
    let content = fs::read_to_string(path).map_err(|e| ModelError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    load_model_str(&content, &path.display().to_string(), base_dir)
}

/// Builds a model from document text; `origin` names the source in diagnostics.
#[instrument(skip_all, name = "load_model", fields(origin = %origin))]
pub fn load_model_str(content: &str, origin: &str, base_dir: &Path) -> Result<Model, ModelError> {
    let document: ModelDocument = toml::from_str(content).map_err(|e| ModelError::Toml {
        path: origin.to_string(),
        source: e,
    })?;
    let config = document.config.into_builder().build()?;
    debug!(
        energy_step = config.energy_step,
        grid_size = config.grid_size(),
        "Model configuration resolved."
    );

    let mut registry = ModelRegistry::new();
    registry.set_energy_limit(config.energy_limit);

    for (i, table) in document.well.into_iter().enumerate() {
        let block = KeywordBlock::new(format!("well[{}]", i), table).with_base_dir(base_dir);
        let species = build_entry(block, StatesMode::Density, &config)?;
        registry.add_well(species)?;
    }

    for (i, table) in document.bimolecular.into_iter().enumerate() {
        let mut block =
            KeywordBlock::new(format!("bimolecular[{}]", i), table).with_base_dir(base_dir);
        let name = entry_name(&mut block)?;
        let input: BimolecularInput = block.parse()?;
        if input.dummy != input.fragment.is_empty() {
            return Err(ModelError::input(
                block.path(),
                "a dummy product has no fragments and a regular one needs at least one",
            ));
        }
        let fragments = input
            .fragment
            .into_iter()
            .enumerate()
            .map(|(j, table)| {
                build_entry(
                    block.child(&format!("fragment[{}]", j), table),
                    StatesMode::NoStates,
                    &config,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        registry.add_bimolecular(&name, fragments, input.ground_energy)?;
    }

    for (i, mut table) in document.barrier.into_iter().enumerate() {
        let path = format!("barrier[{}]", i);
        let connects = take_connects(&mut table, &path)?;
        let block = KeywordBlock::new(path.clone(), table).with_base_dir(base_dir);
        let species = build_entry(block, StatesMode::Number, &config)?;
        let wells = (
            registry.well_index(&connects[0]),
            registry.well_index(&connects[1]),
        );
        match wells {
            (Some(a), Some(b)) => {
                registry.add_inner_barrier(species, (a, b))?;
            }
            (Some(well), None) | (None, Some(well)) => {
                let other = if wells.0.is_some() { &connects[1] } else { &connects[0] };
                let product = registry.bimolecular_index(other).ok_or_else(|| {
                    ModelError::input(&path, format!("'{}' is neither a well nor a product", other))
                })?;
                registry.add_outer_barrier(species, well, product)?;
            }
            (None, None) => {
                return Err(ModelError::input(
                    &path,
                    "a barrier must connect at least one well",
                ));
            }
        }
    }

    if let Some(reference) = &document.reference {
        registry.shift_to(reference)?;
    }
    info!(
        wells = registry.wells().len(),
        bimolecular = registry.bimolecular_products().len(),
        inner_barriers = registry.inner_barriers().len(),
        outer_barriers = registry.outer_barriers().len(),
        "Kinetic model loaded."
    );
    Ok(Model { config, registry })
}

fn entry_name(block: &mut KeywordBlock) -> Result<String, ModelError> {
    block.take_string("name")?.ok_or_else(|| ModelError::MissingKeyword {
        block: block.path().to_string(),
        keyword: "name",
    })
}

/// Builds a named species block whose mode defaults to `mode`.
fn build_entry(
    mut block: KeywordBlock,
    mode: StatesMode,
    config: &ModelConfig,
) -> Result<crate::core::species::Species, ModelError> {
    let name = entry_name(&mut block)?;
    let mode = block.take_mode()?.unwrap_or(mode);
    factory::build_species(&block, &name, mode, config)
}

fn take_connects(table: &mut toml::Table, path: &str) -> Result<[String; 2], ModelError> {
    let value = table.remove("connects").ok_or_else(|| ModelError::MissingKeyword {
        block: path.to_string(),
        keyword: "connects",
    })?;
    let names: Vec<String> = value
        .try_into()
        .map_err(|e: toml::de::Error| ModelError::input(path, e.to_string()))?;
    <[String; 2]>::try_from(names).map_err(|names| {
        ModelError::input(
            path,
            format!("'connects' needs exactly two names, got {}", names.len()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;
    use tempfile::TempDir;

    const MODEL: &str = r#"
        reference = "W1"

        [config]
        energy-step = 1.0
        interpolation-energy-max = 200.0
        [config.rotor]
        grid-size = 64

        [[well]]
        name = "W1"
        type = "rrho"
        mode = "number"
        zero-energy = -30.0
        frequencies = [10.0]

        [[well]]
        name = "W2"
        type = "atomic"
        mode = "number"
        zero-energy = -20.0

        [[bimolecular]]
        name = "P"
        ground-energy = 5.0
        [[bimolecular.fragment]]
        name = "O"
        type = "atomic"
        electronic-levels = [[0.0, 5], [2.0, 3]]

        [[barrier]]
        name = "B12"
        connects = ["W1", "W2"]
        type = "rrho"
        zero-energy = 0.0
        frequencies = [20.0]

        [[barrier]]
        name = "B2P"
        connects = ["P", "W2"]
        type = "arrhenius"
        activation-energy = 10.0
        factor = 2.0
    "#;

    #[test]
    fn document_builds_connectivity_and_shifts_energies() {
        let model = load_model_str(MODEL, "inline", Path::new(".")).unwrap();
        let registry = &model.registry;
        assert_eq!(model.config.rotor.grid_size, 64);
        assert_eq!(registry.energy_shift(), -30.0);
        assert_eq!(registry.inner_barrier(0).unwrap().wells, (0, 1));
        let outer = registry.outer_barrier(0).unwrap();
        assert_eq!((outer.well, outer.bimolecular), (1, 0));
        assert_eq!(registry.bimolecular(0).unwrap().ground, 35.0);
        assert_eq!(registry.maximum_barrier_height(), Some(40.0));

        let w1 = registry.species(registry.find_species("W1").unwrap()).unwrap();
        assert_eq!(w1.ground(), 0.0);
        assert_eq!(w1.states(25.0).unwrap(), 3.0);
        let fragment = registry.species(registry.find_species("O").unwrap()).unwrap();
        assert_eq!(fragment.mode(), StatesMode::NoStates);
        assert_relative_eq!(
            registry.bimolecular_weight(0, 2.0).unwrap(),
            5.0 + 3.0 * (-1.0_f64).exp(),
            max_relative = 1e-12
        );
    }

    #[test]
    fn companion_files_resolve_next_to_the_document() {
        let dir = TempDir::new().unwrap();
        let mut table = fs::File::create(dir.path().join("well.csv")).unwrap();
        for i in 1..=50 {
            writeln!(table, "{}, {}", i as f64, i as f64).unwrap();
        }
        let document = r#"
            [config]
            energy-step = 1.0
            interpolation-energy-max = 50.0

            [[well]]
            name = "W"
            type = "read"
            zero-energy = 0.0
            table-file = "well.csv"
        "#;
        let path = dir.path().join("model.toml");
        fs::write(&path, document).unwrap();

        let model = load_model(&path).unwrap();
        let id = model.registry.find_species("W").unwrap();
        let well = model.registry.species(id).unwrap();
        assert_eq!(well.mode(), StatesMode::Density);
        assert_relative_eq!(well.states(10.0).unwrap(), 10.0, max_relative = 1e-9);
    }

    #[test]
    fn missing_energy_step_is_a_config_error() {
        let result = load_model_str("[config]\ninterpolation-energy-max = 10.0", "inline", Path::new("."));
        assert!(matches!(result, Err(ModelError::Config { .. })));
    }

    #[test]
    fn barrier_without_a_well_is_rejected() {
        let document = r#"
            [config]
            energy-step = 1.0
            interpolation-energy-max = 10.0
            [[bimolecular]]
            name = "P"
            dummy = true
            ground-energy = 0.0
            [[barrier]]
            name = "B"
            connects = ["P", "P"]
            type = "atomic"
            mode = "number"
        "#;
        let result = load_model_str(document, "inline", Path::new("."));
        assert!(matches!(result, Err(ModelError::Input { .. })));
    }

    #[test]
    fn unreadable_file_reports_its_path() {
        let result = load_model(Path::new("/nonexistent/model.toml"));
        assert!(matches!(result, Err(ModelError::Io { ref path, .. }) if path.contains("model.toml")));
    }
}
