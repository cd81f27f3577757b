//! Assembling a default in-process simulation from configuration
//!
//! One coordinator task, one task per replica, all wired over a channel
//! hub. Each ladder position targets a tempered normal with
//! `sigma = 1 / beta^2`, hotter toward the end of the ladder.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use eyre::{Context, Result};
use futures::future::join_all;
use rand::Rng;
use simstore::SimulationStorage;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::pdfs::Normal;
use crate::proposers::{ExchangeParams, PlainExchange, Proposer};
use crate::protocol::ActorId;
use crate::replica::Replica;
use crate::samplers::RandomWalkSampler;
use crate::statistics::StatsReporter;
use crate::statistics::writers::{ConsoleWriter, FileWriter, GraphiteWriter, HttpWriter, StatisticsWriter};
use crate::transport::ChannelHub;

/// What a finished run left behind
#[derive(Debug)]
pub struct RunSummary {
    pub output_path: PathBuf,
    pub n_replicas: u32,
    pub n_iterations: u64,
}

/// Generated output root for unnamed runs
fn generated_output_path() -> PathBuf {
    let uuid = Uuid::now_v7();
    PathBuf::from("runs").join(format!("run-{}", &uuid.to_string()[..6]))
}

/// Build the configured writer sinks
///
/// An unreachable sink is skipped with a warning; statistics must never
/// keep a run from starting.
async fn build_writers(config: &Config, storage: &SimulationStorage) -> Vec<Box<dyn StatisticsWriter>> {
    let mut writers: Vec<Box<dyn StatisticsWriter>> = Vec::new();

    if config.statistics.console {
        writers.push(Box::new(ConsoleWriter::new()));
    }
    if config.statistics.file {
        writers.push(Box::new(FileWriter::new(storage.clone())));
    }
    if let Some(endpoint) = &config.statistics.http_endpoint {
        writers.push(Box::new(HttpWriter::new(endpoint.clone())));
    }
    if let Some(graphite) = &config.statistics.graphite {
        match GraphiteWriter::connect(graphite.job_name.clone(), &graphite.addr).await {
            Ok(writer) => writers.push(Box::new(writer)),
            Err(e) => warn!(addr = %graphite.addr, "skipping graphite sink: {e}"),
        }
    }

    writers
}

/// Run a complete simulation and wait for every actor to finish
pub async fn run_simulation(config: &Config) -> Result<RunSummary> {
    config.validate()?;

    let output_path = config
        .general
        .output_path
        .clone()
        .unwrap_or_else(generated_output_path);
    let storage = SimulationStorage::local(&output_path);

    let base_seed = config.general.seed.unwrap_or_else(|| rand::rng().random());
    let betas = config.ladder.schedule();
    let n_replicas = config.ladder.n_replicas;
    info!(
        output = %output_path.display(),
        n_replicas,
        seed = base_seed,
        "setting up simulation"
    );

    let hub = ChannelHub::new(64);
    let coordinator_endpoint = hub.endpoint(ActorId::Coordinator).await;

    let mut replica_tasks = Vec::new();
    for (i, beta) in betas.iter().enumerate() {
        let position = (i + 1) as u32;
        let endpoint = hub.endpoint(ActorId::Replica(position)).await;

        let sigma = 1.0 / (beta * beta);
        let pdf = Arc::new(Normal::new(0.0, sigma));
        let sampling = &config.local_sampling;
        let sampler = RandomWalkSampler::new(
            pdf.clone(),
            vec![0.0; sampling.dimension],
            sampling.stepsize,
            base_seed.wrapping_add(position as u64),
        )
        .with_adaption(
            sampling.adaption_limit,
            sampling.adaption_uprate,
            sampling.adaption_downrate,
        );

        let mut proposers: BTreeMap<String, Box<dyn Proposer>> = BTreeMap::new();
        proposers.insert("re".to_string(), Box::new(PlainExchange));

        let replica = Replica::new(endpoint, pdf, Box::new(sampler), proposers, storage.clone());
        replica_tasks.push(tokio::spawn(replica.run()));
    }

    let writers = build_writers(config, &storage).await;
    let (reporter, reporter_handle) = StatsReporter::new(writers, 16);
    let reporter_task = tokio::spawn(reporter.run());

    let mut coordinator = Coordinator::new(
        coordinator_endpoint,
        n_replicas,
        config.run.clone(),
        ExchangeParams::plain(),
    )
    .with_seed(base_seed)
    .with_storage(storage.clone())
    .with_reporter(reporter_handle);

    coordinator.run().await.context("coordinated run failed")?;

    for (i, result) in join_all(replica_tasks).await.into_iter().enumerate() {
        result
            .context("replica task panicked")?
            .with_context(|| format!("replica{} failed", i + 1))?;
    }
    reporter_task.await.context("reporter task panicked")?;

    Ok(RunSummary {
        output_path,
        n_replicas,
        n_iterations: config.run.n_iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GeneralConfig, LadderConfig, StatisticsConfig};
    use crate::coordinator::CoordinatorConfig;
    use tempfile::TempDir;

    fn small_config(output: PathBuf) -> Config {
        Config {
            general: GeneralConfig {
                output_path: Some(output),
                seed: Some(1234),
            },
            run: CoordinatorConfig {
                n_iterations: 20,
                swap_interval: 5,
                status_interval: 10,
                dump_interval: 10,
                ..Default::default()
            },
            ladder: LadderConfig {
                n_replicas: 4,
                ..Default::default()
            },
            statistics: StatisticsConfig {
                console: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_run_simulation_writes_all_outputs() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("run");
        let summary = run_simulation(&small_config(output.clone())).await.unwrap();

        assert_eq!(summary.n_replicas, 4);
        assert_eq!(summary.output_path, output);

        for replica in 1..=4 {
            assert!(output.join(format!("samples/samples_{replica}_0-10.json")).exists());
            assert!(output.join(format!("samples/samples_{replica}_10-20.json")).exists());
            assert!(output.join(format!("energies/energies_{replica}_0-10.json")).exists());
        }
        assert!(output.join("statistics/statistics_10.json").exists());
        assert!(output.join("works").exists());
    }

    #[tokio::test]
    async fn test_seeded_runs_reproduce_energies() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("a");
        let second = dir.path().join("b");

        run_simulation(&small_config(first.clone())).await.unwrap();
        run_simulation(&small_config(second.clone())).await.unwrap();

        let read = |root: &PathBuf| {
            SimulationStorage::local(root.clone()).read_energies(1, 0, 10).unwrap()
        };
        assert_eq!(read(&first), read(&second));
    }
}
