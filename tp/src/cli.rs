//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Replica-exchange sampling daemon
#[derive(Parser)]
#[command(
    name = "tp",
    about = "Coordinate tempered MCMC replicas with periodic state exchanges",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Run a simulation
    Run {
        /// Override the number of iterations
        #[arg(short = 'n', long)]
        iterations: Option<u64>,

        /// Override the number of replicas
        #[arg(short, long)]
        replicas: Option<u32>,

        /// Override the output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override the base seed
        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Validate the configuration and print the resolved settings
    Check,
}
