//! Local MCMC samplers
//!
//! A sampler owns its chain's current state and mutates it in place, one
//! move per [`Sampler::step`] call. The owning replica replaces the state
//! wholesale when an exchange is accepted.

use serde::{Deserialize, Serialize};

use crate::protocol::ChainState;

mod rwmc;

pub use rwmc::RandomWalkSampler;

/// What a single local move did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveStats {
    /// Whether the move was accepted
    pub accepted: bool,
    /// Step size used for the move
    pub stepsize: f64,
    /// Negative log-probability of the resulting state
    pub negative_log_prob: f64,
    /// Total moves drawn so far by this sampler
    pub total_moves: u64,
}

/// A single-chain sampler
pub trait Sampler: Send {
    /// Perform one move; returns the resulting state and its statistics
    fn step(&mut self) -> (ChainState, MoveStats);

    /// Current chain state
    fn state(&self) -> &ChainState;

    /// Replace the chain state wholesale (accepted exchange)
    fn set_state(&mut self, state: ChainState);
}
