use clap::Parser;
use colored::*;
use eyre::{Context, Result};

use simstore::cli::{Cli, Command};
use simstore::{LocalBackend, StorageBackend};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let backend = LocalBackend::new(&cli.root);

    match cli.command {
        Command::Ls { prefix } => {
            let prefixes = match prefix {
                Some(p) => vec![p],
                None => ["samples", "energies", "works", "heats", "statistics"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            };
            for prefix in prefixes {
                for path in backend.list(&prefix).context("Failed to list store")? {
                    println!("{}", path);
                }
            }
        }
        Command::Cat { path } => {
            let bytes = backend.read(&path).context("Failed to read blob")?;
            let value: serde_json::Value =
                serde_json::from_slice(&bytes).context("Blob is not valid JSON")?;
            println!("{}", serde_json::to_string_pretty(&value)?);
            eprintln!("{} {}", "✓".green(), path.cyan());
        }
    }

    Ok(())
}
