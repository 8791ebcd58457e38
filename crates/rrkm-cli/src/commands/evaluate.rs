use crate::cli::{ModelArgs, StatesArgs, WeightArgs};
use crate::error::{CliError, Result};
use rrkm::core::species::Species;
use rrkm::workflows::load::{Model, load_model};
use std::io::Write;
use tracing::{debug, info};

fn open(args: &ModelArgs) -> Result<(Model, String)> {
    info!(model = %args.model.display(), "Loading model document.");
    let model = load_model(&args.model)?;
    if model.registry.find_species(&args.species).is_none() {
        return Err(CliError::Argument(format!(
            "species '{}' is not defined in '{}'",
            args.species,
            args.model.display()
        )));
    }
    Ok((model, args.species.clone()))
}

fn species<'a>(model: &'a Model, name: &str) -> Result<&'a Species> {
    model
        .registry
        .find_species(name)
        .and_then(|id| model.registry.species(id))
        .ok_or_else(|| CliError::Argument(format!("species '{}' is not defined", name)))
}

/// Energies `from, from + step, ...` up to and including `to`.
fn energy_grid(from: f64, to: f64, step: f64) -> Result<Vec<f64>> {
    if !(step > 0.0) || to < from {
        return Err(CliError::Argument(format!(
            "need step > 0 and to >= from, got step {} over [{}, {}]",
            step, from, to
        )));
    }
    let count = ((to - from) / step + 1e-9).floor() as usize + 1;
    Ok((0..count).map(|i| from + step * i as f64).collect())
}

pub fn states(args: StatesArgs) -> Result<()> {
    let energies = energy_grid(args.from, args.to, args.step)?;
    let (model, name) = open(&args.model)?;
    let species = species(&model, &name)?;
    let offset = if args.relative { species.ground() } else { 0.0 };
    debug!(
        species = name.as_str(),
        rows = energies.len(),
        offset,
        "Tabulating states."
    );

    let mut out = std::io::stdout().lock();
    writeln!(out, "# {} ({}), ground {}", name, species.mode(), species.ground())?;
    writeln!(out, "# energy\tstates")?;
    for energy in energies {
        let value = species.states(energy + offset)?;
        writeln!(out, "{}\t{:.6e}", energy, value)?;
    }
    Ok(())
}

pub fn weight(args: WeightArgs) -> Result<()> {
    if let Some(t) = args.temperatures.iter().find(|t| !(**t > 0.0)) {
        return Err(CliError::Argument(format!(
            "temperatures must be positive, got {}",
            t
        )));
    }
    let (model, name) = open(&args.model)?;
    let species = species(&model, &name)?;
    let (label, reference) = if args.tunnel {
        ("tunnel-weight", species.real_ground())
    } else {
        ("weight", species.ground())
    };
    debug!(species = name.as_str(), label, "Tabulating weights.");

    let mut out = std::io::stdout().lock();
    writeln!(out, "# {} relative to {}", name, reference)?;
    writeln!(out, "# temperature\t{}", label)?;
    for &temperature in &args.temperatures {
        let value = if args.tunnel {
            species.tunnel_weight(temperature)?
        } else {
            species.weight(temperature)?
        };
        writeln!(out, "{}\t{:.6e}", temperature, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ModelArgs;
    use std::fs;
    use tempfile::TempDir;

    fn model_file(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("model.toml");
        fs::write(
            &path,
            r#"
                [config]
                energy-step = 1.0
                interpolation-energy-max = 100.0

                [[well]]
                name = "W"
                type = "rrho"
                mode = "number"
                zero-energy = 0.0
                frequencies = [10.0]
            "#,
        )
        .unwrap();
        path
    }

    #[test]
    fn energy_grid_includes_the_end_point() {
        assert_eq!(energy_grid(0.0, 1.0, 0.25).unwrap(), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert!(energy_grid(0.0, 1.0, 0.0).is_err());
        assert!(energy_grid(2.0, 1.0, 0.5).is_err());
    }

    #[test]
    fn unknown_species_is_an_argument_error() {
        let dir = TempDir::new().unwrap();
        let args = ModelArgs {
            model: model_file(&dir),
            species: "X".to_string(),
        };
        assert!(matches!(open(&args), Err(CliError::Argument(_))));
    }

    #[test]
    fn commands_evaluate_a_loaded_species() {
        let dir = TempDir::new().unwrap();
        let model = model_file(&dir);
        let states_args = StatesArgs {
            model: ModelArgs {
                model: model.clone(),
                species: "W".to_string(),
            },
            from: 0.0,
            to: 50.0,
            step: 5.0,
            relative: false,
        };
        assert!(states(states_args).is_ok());

        let weight_args = WeightArgs {
            model: ModelArgs {
                model,
                species: "W".to_string(),
            },
            temperatures: vec![0.0],
            tunnel: false,
        };
        assert!(matches!(weight(weight_args), Err(CliError::Argument(_))));
    }
}
