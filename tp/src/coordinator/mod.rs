//! Coordinator actor
//!
//! The single process driving the global loop: it broadcasts local-sample
//! requests, schedules exchange rounds over disjoint adjacent pairs, runs
//! the fetch/propose/commit protocol per pair, aggregates statistics and
//! shuts the ladder down.

use thiserror::Error;

use crate::protocol::ActorId;
use crate::transport::TransportError;

mod config;
mod core;
mod pairing;

pub use config::CoordinatorConfig;
pub use core::Coordinator;
pub use pairing::{adjacent_pairs, participants};

/// Errors that abort a coordinated run
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A reply arrived from an actor we were not waiting on, or with the
    /// wrong tag; coordinator and replicas have desynchronized.
    #[error("unexpected {kind} reply from {from}")]
    UnexpectedReply { from: ActorId, kind: &'static str },

    #[error("storage error: {0}")]
    Storage(#[from] simstore::StorageError),
}
