//! CLI subcommand implementations.

pub mod config;
pub mod schedule;
pub mod simulate;
