//! Swap proposal strategies
//!
//! A proposer turns two chain states into a candidate swap: a trajectory
//! whose terminal state the initiating replica would adopt, together with
//! the generalized work (and heat) the coordinator feeds into the
//! acceptance test. The engine treats `work` opaquely, so strategies are
//! free to fold in kinetic or path-dependent terms.

use serde::{Deserialize, Serialize};

use crate::pdfs::Pdf;
use crate::protocol::ChainState;

mod re;

pub use re::PlainExchange;

/// Proposal trajectory: boundary (and optionally intermediate) states plus
/// the scalars the acceptance test needs. Produced once, consumed once.
#[derive(Debug, Clone)]
pub struct Trajectory {
    states: Vec<ChainState>,
    pub work: f64,
    pub heat: f64,
}

impl Trajectory {
    /// A trajectory needs at least its two boundary states
    pub fn new(states: Vec<ChainState>, work: f64, heat: f64) -> Self {
        debug_assert!(states.len() >= 2, "trajectory needs boundary states");
        Self { states, work, heat }
    }

    pub fn initial(&self) -> &ChainState {
        &self.states[0]
    }

    pub fn terminal(&self) -> &ChainState {
        &self.states[self.states.len() - 1]
    }

    pub fn states(&self) -> &[ChainState] {
        &self.states
    }
}

/// Parameters a proposer might need to generate its trajectory
///
/// Plain exchanges ignore these; path-based strategies read the step count
/// and timestep. One object serves forward and reverse directions via
/// [`ProposerParams::reverse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposerParams {
    /// Number of integration steps for path-based proposals
    pub n_steps: u64,
    /// Integration timestep; sign encodes direction
    pub timestep: f64,
}

impl Default for ProposerParams {
    fn default() -> Self {
        Self {
            n_steps: 0,
            timestep: 0.0,
        }
    }
}

impl ProposerParams {
    /// Flip direction so the same object drives the reverse trajectory
    pub fn reverse(&mut self) {
        self.timestep = -self.timestep;
    }
}

/// What an exchange round asks the replicas to do: which proposer tags are
/// acceptable, and their parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeParams {
    /// Requested proposer tags; a replica picks the lexicographically
    /// smallest tag it also has registered
    pub proposers: Vec<String>,
    pub proposer_params: ProposerParams,
}

impl ExchangeParams {
    pub fn plain() -> Self {
        Self {
            proposers: vec![re::PLAIN_EXCHANGE_TAG.to_string()],
            proposer_params: ProposerParams::default(),
        }
    }
}

/// Immutable view of the proposing replica's chain
///
/// Proposers read the local target and state through this; they cannot
/// mutate the chain's persistent state.
pub struct LocalChain<'a> {
    pub pdf: &'a dyn Pdf,
    pub state: &'a ChainState,
}

/// A pluggable swap proposal strategy
pub trait Proposer: Send + Sync {
    /// Produce a candidate swap given the partner's buffered state
    fn propose(
        &self,
        local: &LocalChain<'_>,
        partner_state: &ChainState,
        partner_negative_log_prob: f64,
        params: &ProposerParams,
    ) -> Trajectory;
}
