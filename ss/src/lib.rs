//! SimStore - file-backed storage for sampling output
//!
//! Stores the artifacts a replica-exchange run produces: per-replica sample
//! and energy traces, per-pair work/heat records, and periodic statistics
//! snapshots. Everything is a JSON blob under a fixed path scheme, so runs
//! can be inspected with nothing but `ss cat` or `jq`.
//!
//! # Layout
//!
//! ```text
//! <root>/
//! ├── samples/samples_<replica>_<start>-<end>.json
//! ├── energies/energies_<replica>_<start>-<end>.json
//! ├── works/works_<a>-<b>_<start>-<end>.json
//! ├── heats/heats_<a>-<b>_<start>-<end>.json
//! └── statistics/statistics_<step>.json
//! ```

pub mod cli;
mod store;

pub use store::{
    LocalBackend, MemoryBackend, SimulationStorage, StorageBackend, StorageError,
};
