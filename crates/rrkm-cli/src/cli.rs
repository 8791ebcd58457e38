use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "RRKM CLI - Evaluate densities, numbers of states and canonical weights of the species in a kinetic model document.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the level of one module, e.g. `rrkm::core::base::multirotor=trace` (repeatable)
    #[arg(long = "log-target", global = true, value_name = "TARGET=LEVEL")]
    pub log_targets: Vec<String>,

    /// Set the number of threads used by the multi-rotor solver.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Tabulate the density or number of states of one species over an energy range.
    States(StatesArgs),
    /// Tabulate the canonical weight of one species over a temperature range.
    Weight(WeightArgs),
}

/// Model document and species shared by every evaluation.
#[derive(Args, Debug)]
pub struct ModelArgs {
    /// Path to the model document in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub model: PathBuf,

    /// Name of the well, fragment or barrier to evaluate.
    #[arg(short, long, required = true, value_name = "NAME")]
    pub species: String,
}

/// Arguments for the `states` subcommand.
#[derive(Args, Debug)]
pub struct StatesArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// First energy of the table, in the model's energy unit.
    #[arg(long, default_value_t = 0.0, value_name = "ENERGY")]
    pub from: f64,

    /// Last energy of the table.
    #[arg(long, required = true, value_name = "ENERGY")]
    pub to: f64,

    /// Energy increment between rows.
    #[arg(long, required = true, value_name = "ENERGY")]
    pub step: f64,

    /// Measure energies from the species ground instead of the model reference.
    #[arg(long)]
    pub relative: bool,
}

/// Arguments for the `weight` subcommand.
#[derive(Args, Debug)]
pub struct WeightArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Temperatures (kT, in the model's energy unit), comma-separated.
    #[arg(short, long, required = true, value_delimiter = ',', value_name = "T1,T2,...")]
    pub temperatures: Vec<f64>,

    /// Report the tunneling weight measured from the barrier top.
    #[arg(long)]
    pub tunnel: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn package_metadata_names_no_authors() {
        assert!(env!("CARGO_PKG_AUTHORS").is_empty());
        assert!(env!("CARGO_PKG_REPOSITORY").is_empty());
        assert!(Cli::command().get_author().is_none());
        assert_eq!(Cli::command().get_version(), Some(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn weight_temperatures_are_comma_separated() {
        let cli = Cli::parse_from([
            "rrkm", "-vv", "weight", "-m", "model.toml", "-s", "W1", "-t", "100,200.5",
        ]);
        assert_eq!(cli.verbose, 2);
        let Commands::Weight(args) = cli.command else {
            panic!("expected the weight subcommand");
        };
        assert_eq!(args.temperatures, vec![100.0, 200.5]);
        assert_eq!(args.model.species, "W1");
        assert!(!args.tunnel);
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from([
            "rrkm", "-q", "-v", "states", "-m", "m.toml", "-s", "W", "--to", "1", "--step", "1",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn log_targets_are_repeatable_and_global() {
        let cli = Cli::parse_from([
            "rrkm",
            "--log-target",
            "rrkm::core::base::multirotor=trace",
            "states",
            "-m",
            "model.toml",
            "-s",
            "TS1",
            "--to",
            "10",
            "--step",
            "1",
            "--log-target",
            "rrkm::engine=debug",
        ]);
        assert_eq!(
            cli.log_targets,
            ["rrkm::core::base::multirotor=trace", "rrkm::engine=debug"]
        );
    }
}
