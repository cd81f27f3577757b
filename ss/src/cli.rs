//! CLI argument parsing for the store inspector

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ss")]
#[command(author, version, about = "Inspect sampling output stores", long_about = None)]
pub struct Cli {
    /// Root directory of the store
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List stored blobs
    Ls {
        /// Restrict to one subdirectory (samples, energies, works, heats, statistics)
        prefix: Option<String>,
    },

    /// Print a blob as pretty JSON
    Cat {
        /// Store-relative blob path
        #[arg(required = true)]
        path: String,
    },
}
