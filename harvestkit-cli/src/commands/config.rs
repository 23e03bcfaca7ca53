//! Configuration CLI commands.
//!
//! Provides `config path`, `config show` and `config init`.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use harvestkit::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Show the effective configuration (file values over defaults)
    Show,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand.
///
/// `path_override` replaces the default location when `--config` is given.
pub fn run(command: ConfigCommands, path_override: Option<&Path>) -> Result<(), CliError> {
    let path = resolve_path(path_override)?;
    match command {
        ConfigCommands::Path => run_path(&path),
        ConfigCommands::Show => run_show(&path),
        ConfigCommands::Init { force } => run_init(&path, force),
    }
}

fn resolve_path(path_override: Option<&Path>) -> Result<PathBuf, CliError> {
    match path_override {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(config_file_path()?),
    }
}

fn run_path(path: &Path) -> Result<(), CliError> {
    println!("{}", path.display());
    Ok(())
}

fn run_show(path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load_or_default(path)?;
    println!("{}", render(&config));
    Ok(())
}

fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        )));
    }

    ConfigFile::default().save_to(path)?;
    tracing::debug!(path = %path.display(), "Wrote default configuration");
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

/// Render a configuration as INI text.
fn render(config: &ConfigFile) -> String {
    let mut buf = Vec::new();
    match config.to_ini().write_to(&mut buf) {
        Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
        Err(e) => format!("(failed to render configuration: {e})"),
    }
}
