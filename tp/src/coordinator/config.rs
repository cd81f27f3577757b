//! Coordinator run parameters

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Parameters of the global iteration loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Total number of iterations to drive
    #[serde(default = "default_n_iterations")]
    pub n_iterations: u64,

    /// Run an exchange round every this many iterations
    #[serde(default = "default_swap_interval")]
    pub swap_interval: u64,

    /// Collect and flush statistics every this many iterations
    #[serde(default = "default_status_interval")]
    pub status_interval: u64,

    /// Dump traces every this many iterations
    #[serde(default = "default_dump_interval")]
    pub dump_interval: u64,

    /// Keep every n-th trace element when dumping
    #[serde(default = "default_thinning")]
    pub thinning: usize,

    /// Shift dump windows by this many samples (continued runs)
    #[serde(default)]
    pub sample_offset: u64,

    /// How long to wait for any single reply before giving up
    #[serde(default = "default_reply_timeout_secs")]
    pub reply_timeout_secs: u64,
}

fn default_n_iterations() -> u64 {
    10_000
}

fn default_swap_interval() -> u64 {
    5
}

fn default_status_interval() -> u64 {
    100
}

fn default_dump_interval() -> u64 {
    1_000
}

fn default_thinning() -> usize {
    1
}

fn default_reply_timeout_secs() -> u64 {
    30
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            n_iterations: default_n_iterations(),
            swap_interval: default_swap_interval(),
            status_interval: default_status_interval(),
            dump_interval: default_dump_interval(),
            thinning: default_thinning(),
            sample_offset: 0,
            reply_timeout_secs: default_reply_timeout_secs(),
        }
    }
}

impl CoordinatorConfig {
    /// Reply timeout as a Duration
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout_secs)
    }
}
