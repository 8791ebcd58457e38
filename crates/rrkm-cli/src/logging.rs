use crate::error::{CliError, Result};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, Layer, filter::LevelFilter, fmt, prelude::*};

/// Environment variable holding extra filter directives, e.g.
/// `RRKM_LOG=rrkm::core::base::multirotor=trace`.
pub const LOG_ENV: &str = "RRKM_LOG";

/// Logging choices collected from the global command-line flags.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub verbosity: u8,
    pub quiet: bool,
    pub log_file: Option<PathBuf>,
    /// `target=level` directives applied to both sinks.
    pub targets: Vec<String>,
}

fn console_level(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::ERROR;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// The log file always keeps model construction details (grid sizes, level
/// counts, solver settings) even when the console only shows warnings.
fn file_level(console: LevelFilter) -> LevelFilter {
    console.max(LevelFilter::DEBUG)
}

/// Default level, then `RRKM_LOG`, then the command-line directives.
fn build_filter(level: LevelFilter, targets: &[String]) -> Result<EnvFilter> {
    let mut filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .with_env_var(LOG_ENV)
        .from_env()
        .map_err(|e| CliError::Logger(format!("invalid {}: {}", LOG_ENV, e)))?;
    for target in targets {
        let directive = target
            .parse()
            .map_err(|e| CliError::Argument(format!("invalid log target '{}': {}", target, e)))?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}

pub fn setup_logging(options: &LogOptions) -> Result<()> {
    let console = console_level(options.verbosity, options.quiet);

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .compact()
        .with_filter(build_filter(console, &options.targets)?);

    let file_layer = match &options.log_file {
        Some(path) => {
            let file = File::create(path)?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_thread_ids(true)
                    .with_target(true)
                    .with_filter(build_filter(file_level(console), &options.targets)?),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| CliError::Logger(e.to_string()))
}
