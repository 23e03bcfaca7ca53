//! Harvestkit CLI - Command-line interface
//!
//! Inspect the configuration, print the polling schedule and run offline
//! simulations of the harvest optimizer.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use harvestkit::config::{config_file_path, ConfigFile};
use harvestkit::logging::{init_logging, LoggingGuard};

use commands::config::ConfigCommands;
use commands::simulate::SimulationParams;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "harvestkit", version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the polling interval for every hour of the day
    Schedule {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Simulate harvest rounds against synthetic entities
    Simulate {
        /// Number of synthetic entities
        #[arg(long, default_value_t = 50)]
        entities: usize,

        /// Number of harvest rounds to run
        #[arg(long, default_value_t = 24)]
        rounds: usize,

        /// Random seed; the same seed reproduces the same run
        #[arg(long, default_value_t = 1)]
        seed: u64,

        /// Local hour the simulated clock starts at
        #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(u32).range(0..24))]
        start_hour: u32,

        /// Print a JSON snapshot instead of the text report
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(cli.config.as_ref())?;
    let _guard = setup_logging(&config, cli.verbose)?;

    match cli.command {
        Commands::Schedule { json } => commands::schedule::run(&config.optimizer.cadence, json),
        Commands::Config { command } => commands::config::run(command, cli.config.as_deref()),
        Commands::Simulate {
            entities,
            rounds,
            seed,
            start_hour,
            json,
        } => {
            let params = SimulationParams {
                entities,
                rounds,
                seed,
                start_hour,
            };
            commands::simulate::run(&config.optimizer, &params, json)
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<ConfigFile, CliError> {
    let path = match path {
        Some(path) => path.clone(),
        None => match config_file_path() {
            Ok(path) => path,
            // No config directory on this platform: run on defaults.
            Err(_) => return Ok(ConfigFile::default()),
        },
    };
    Ok(ConfigFile::load_or_default(&path)?)
}

fn setup_logging(config: &ConfigFile, verbose: bool) -> Result<LoggingGuard, CliError> {
    let mut logging = config.logging.clone();
    if verbose {
        logging.filter = "harvestkit=debug,harvestkit_cli=debug".to_string();
    }
    Ok(init_logging(&logging)?)
}
