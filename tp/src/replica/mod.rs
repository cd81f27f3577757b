//! Replica actor
//!
//! One replica per ladder position: owns its chain state and sampler,
//! processes exactly one inbound request to completion before the next,
//! and talks to the coordinator and its exchange partners only through
//! the transport.

use thiserror::Error;

use crate::transport::TransportError;

mod core;

pub use core::{BufferedPartner, Replica};

/// Errors from replica-side request processing
#[derive(Debug, Error)]
pub enum ReplicaError {
    /// No proposer tag shared between the exchange params and this replica.
    /// Fatal to the exchange attempt only; reported back to the coordinator.
    #[error("no shared proposer: requested {requested:?}, registered {registered:?}")]
    NoSharedProposer {
        requested: Vec<String>,
        registered: Vec<String>,
    },

    /// A request arrived before the state it reads was buffered. The
    /// coordinator's bookkeeping desynchronized; the run must abort.
    #[error("{request} arrived before a partner state was buffered")]
    MissingPartnerState { request: &'static str },

    /// Accept committed with nothing buffered to adopt
    #[error("commit(accept) with no buffered proposal or partner state")]
    MissingProposal,

    /// A request this replica can never handle (e.g. a coordinator-only reply)
    #[error("unexpected request: {kind} from {sender}")]
    UnexpectedRequest { kind: &'static str, sender: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("storage error: {0}")]
    Storage(#[from] simstore::StorageError),
}

impl ReplicaError {
    /// Whether the error poisons the run or just the current exchange attempt
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ReplicaError::NoSharedProposer { .. })
    }
}
