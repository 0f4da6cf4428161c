use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Leveraged-vault accounting engine — validate, simulate, and
/// generate schemas for vault scenario definitions.
#[derive(Parser)]
#[command(name = "levervault", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Output the JSON schema for scenario definitions
    Schema,

    /// Validate a scenario JSON file
    Validate {
        /// Path to the scenario JSON file
        file: PathBuf,
    },

    /// Output an example scenario JSON to stdout
    Example,

    /// Replay a scenario against a fresh vault
    Simulate {
        /// Path to the scenario JSON file
        file: PathBuf,

        /// Print verbose tick-by-tick output
        #[arg(long)]
        verbose: bool,

        /// Output the final summary as JSON to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },
}
