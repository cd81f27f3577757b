//! Run configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::coordinator::CoordinatorConfig;

/// Main configuration for a simulation run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output location, seeding, run identity
    pub general: GeneralConfig,

    /// Global loop parameters
    pub run: CoordinatorConfig,

    /// The tempering ladder
    pub ladder: LadderConfig,

    /// Local sampler parameters
    pub local_sampling: SamplingConfig,

    /// Statistics sinks
    pub statistics: StatisticsConfig,
}

impl Config {
    /// Validate configuration before use; fails fast with clear messages
    pub fn validate(&self) -> Result<()> {
        if self.ladder.n_replicas < 2 {
            return Err(eyre::eyre!(
                "a ladder needs at least 2 replicas, got {}",
                self.ladder.n_replicas
            ));
        }
        if let Some(betas) = &self.ladder.betas
            && betas.len() != self.ladder.n_replicas as usize
        {
            return Err(eyre::eyre!(
                "ladder.betas lists {} temperatures for {} replicas",
                betas.len(),
                self.ladder.n_replicas
            ));
        }
        if self.local_sampling.stepsize <= 0.0 {
            return Err(eyre::eyre!("local_sampling.stepsize must be positive"));
        }
        if self.local_sampling.dimension == 0 {
            return Err(eyre::eyre!("local_sampling.dimension must be at least 1"));
        }
        if self.run.n_iterations == 0 {
            return Err(eyre::eyre!("run.n_iterations must be at least 1"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: ./tempered.yml
        let local_config = PathBuf::from("tempered.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/tempered/tempered.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("tempered").join("tempered.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Output location and run identity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Where samples, energies, works and statistics land; generated under
    /// `runs/` when unset
    pub output_path: Option<PathBuf>,

    /// Base seed for all random draws; an unseeded run draws one from the OS
    pub seed: Option<u64>,
}

/// The tempering ladder: how many replicas at which inverse temperatures
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LadderConfig {
    /// Number of replicas, ladder positions 1..=n
    pub n_replicas: u32,

    /// Explicit inverse temperatures, hottest last; geometric between
    /// `beta_max` and `beta_min` when unset
    pub betas: Option<Vec<f64>>,

    /// Inverse temperature of the first (coldest) replica
    pub beta_max: f64,

    /// Inverse temperature of the last (hottest) replica
    pub beta_min: f64,
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self {
            n_replicas: 4,
            betas: None,
            beta_max: 1.0,
            beta_min: 0.1,
        }
    }
}

impl LadderConfig {
    /// The ladder's inverse temperatures, explicit or geometric
    pub fn schedule(&self) -> Vec<f64> {
        if let Some(betas) = &self.betas {
            return betas.clone();
        }
        let n = self.n_replicas;
        (0..n)
            .map(|i| {
                if n == 1 {
                    self.beta_max
                } else {
                    let t = i as f64 / (n - 1) as f64;
                    self.beta_max * (self.beta_min / self.beta_max).powf(t)
                }
            })
            .collect()
    }
}

/// Parameters of the local random-walk samplers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Initial proposal stepsize
    pub stepsize: f64,

    /// Dimension of the chain state
    pub dimension: usize,

    /// Adapt the stepsize for this many initial moves
    pub adaption_limit: u64,

    /// Stepsize multiplier after an accepted move
    pub adaption_uprate: f64,

    /// Stepsize multiplier after a rejected move
    pub adaption_downrate: f64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            stepsize: 0.5,
            dimension: 1,
            adaption_limit: 0,
            adaption_uprate: 1.05,
            adaption_downrate: 0.95,
        }
    }
}

/// Which statistics sinks to attach
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsConfig {
    /// Print per-flush reports to stdout
    pub console: bool,

    /// Keep per-step JSON snapshots in the run's store
    pub file: bool,

    /// POST per-step JSON documents to this URL
    pub http_endpoint: Option<String>,

    /// Stream metrics to a graphite-style receiver
    pub graphite: Option<GraphiteConfig>,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            console: true,
            file: true,
            http_endpoint: None,
            graphite: None,
        }
    }
}

/// Graphite-style metrics receiver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphiteConfig {
    /// Metric path prefix
    pub job_name: String,

    /// host:port of the receiver
    pub addr: String,
}
