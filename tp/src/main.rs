//! CLI entry point for coordinated replica-exchange runs

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::info;

use tempered::cli::{Cli, Command};
use tempered::config::Config;
use tempered::setup::run_simulation;

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Run {
            iterations,
            replicas,
            output,
            seed,
        } => {
            if let Some(n) = iterations {
                config.run.n_iterations = n;
            }
            if let Some(n) = replicas {
                config.ladder.n_replicas = n;
            }
            if let Some(path) = output {
                config.general.output_path = Some(path);
            }
            if let Some(seed) = seed {
                config.general.seed = Some(seed);
            }

            let summary = run_simulation(&config).await?;
            println!(
                "{} {} replicas, {} iterations -> {}",
                "✓".green(),
                summary.n_replicas,
                summary.n_iterations,
                summary.output_path.display().to_string().cyan()
            );
        }
        Command::Check => {
            config.validate()?;
            let resolved = serde_yaml::to_string(&config).context("Failed to render configuration")?;
            println!("{}", resolved);
            println!("{} configuration is valid", "✓".green());
        }
    }

    Ok(())
}
