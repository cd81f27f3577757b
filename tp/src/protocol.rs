//! Request taxonomy and envelopes exchanged between the coordinator and replicas

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::proposers::ExchangeParams;
use crate::samplers::MoveStats;

/// A chain's position: a plain numeric vector
pub type ChainState = Vec<f64>;

/// Address of an actor in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActorId {
    /// The single process driving the global loop
    Coordinator,
    /// A ladder member, numbered from 1
    Replica(u32),
}

impl ActorId {
    /// Ladder index for replica ids
    pub fn replica_index(&self) -> Option<u32> {
        match self {
            ActorId::Replica(n) => Some(*n),
            ActorId::Coordinator => None,
        }
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorId::Coordinator => write!(f, "coordinator"),
            ActorId::Replica(n) => write!(f, "replica{n}"),
        }
    }
}

/// Trace window for a dump request
///
/// The replica consumes the buffered trace covering `[from, to)` and writes
/// it under the shifted window `[from + offset, to + offset)`, keeping every
/// `thinning`-th element. `offset` exists so restarted runs can continue a
/// previous run's numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpWindow {
    pub from: u64,
    pub to: u64,
    pub offset: u64,
    pub thinning: usize,
}

impl DumpWindow {
    /// Number of trace elements this window covers
    pub fn len(&self) -> usize {
        (self.to - self.from) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.to == self.from
    }

    /// The window as written to storage
    pub fn shifted(&self) -> (u64, u64) {
        (self.from + self.offset, self.to + self.offset)
    }
}

/// Everything one actor can ask of another
///
/// The sending actor's id travels on the envelope; replies go back to that
/// sender, never broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    // Coordinator -> replica
    /// Draw one local MCMC move and extend the traces
    Sample,

    /// Pull `partner`'s state into the local partner buffer
    FetchPartnerState { partner: ActorId },

    /// Evaluate a swap proposal against the buffered partner state
    ProposeExchange { partner: ActorId, params: ExchangeParams },

    /// Land the pending exchange attempt in the accept or reject branch
    CommitDecision { accept: bool },

    /// Dump the buffered sample trace to storage
    DumpSamples(DumpWindow),

    /// Dump the buffered energy trace to storage
    DumpEnergies(DumpWindow),

    /// Send accumulated local move statistics back
    ReportStats,

    /// Exit the receive loop
    Terminate,

    // Replica <-> replica
    /// Ask a peer for its current state and negative log-probability
    RequestPartnerState,

    /// A peer's reply to `RequestPartnerState`
    DeliverPartnerState {
        state: ChainState,
        negative_log_prob: f64,
    },

    // Replica -> coordinator
    /// Bare acknowledgement that the previous request completed
    Acknowledge,

    /// Generalized work and heat of the proposed swap
    ProposalEvaluated { work: f64, heat: f64 },

    /// The exchange attempt could not be evaluated; the attempt is off
    ExchangeRejected { reason: String },

    /// Accumulated `(move index, stats)` pairs since the last report
    StatsReport { stats: Vec<(u64, MoveStats)> },
}

impl Request {
    /// Short tag for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Sample => "sample",
            Request::FetchPartnerState { .. } => "fetch_partner_state",
            Request::ProposeExchange { .. } => "propose_exchange",
            Request::CommitDecision { .. } => "commit_decision",
            Request::DumpSamples(_) => "dump_samples",
            Request::DumpEnergies(_) => "dump_energies",
            Request::ReportStats => "report_stats",
            Request::Terminate => "terminate",
            Request::RequestPartnerState => "request_partner_state",
            Request::DeliverPartnerState { .. } => "deliver_partner_state",
            Request::Acknowledge => "acknowledge",
            Request::ProposalEvaluated { .. } => "proposal_evaluated",
            Request::ExchangeRejected { .. } => "exchange_rejected",
            Request::StatsReport { .. } => "stats_report",
        }
    }
}

/// One message in flight: created per send, consumed on receipt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub sender: ActorId,
    pub receiver: ActorId,
    pub payload: Request,
}

impl Envelope {
    pub fn new(sender: ActorId, receiver: ActorId, payload: Request) -> Self {
        Self {
            sender,
            receiver,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_id_display() {
        assert_eq!(ActorId::Coordinator.to_string(), "coordinator");
        assert_eq!(ActorId::Replica(3).to_string(), "replica3");
    }

    #[test]
    fn test_actor_id_ordering() {
        assert!(ActorId::Replica(1) < ActorId::Replica(2));
        assert!(ActorId::Coordinator < ActorId::Replica(1));
    }

    #[test]
    fn test_request_serialization() {
        let req = Request::DeliverPartnerState {
            state: vec![0.5, -1.0],
            negative_log_prob: 2.25,
        };

        let json = serde_json::to_string(&req).unwrap();
        let deserialized: Request = serde_json::from_str(&json).unwrap();

        match deserialized {
            Request::DeliverPartnerState {
                state,
                negative_log_prob,
            } => {
                assert_eq!(state, vec![0.5, -1.0]);
                assert_eq!(negative_log_prob, 2.25);
            }
            other => panic!("wrong variant: {}", other.kind()),
        }
    }

    #[test]
    fn test_envelope_roundtrip() {
        let env = Envelope::new(
            ActorId::Coordinator,
            ActorId::Replica(2),
            Request::CommitDecision { accept: true },
        );

        let json = serde_json::to_string(&env).unwrap();
        let back: Envelope = serde_json::from_str(&json).unwrap();

        assert_eq!(back.sender, ActorId::Coordinator);
        assert_eq!(back.receiver, ActorId::Replica(2));
        assert_eq!(back.payload.kind(), "commit_decision");
    }

    #[test]
    fn test_dump_window_shifted() {
        let w = DumpWindow {
            from: 3000,
            to: 4000,
            offset: 2,
            thinning: 2,
        };
        assert_eq!(w.shifted(), (3002, 4002));
        assert_eq!(w.len(), 1000);
        assert!(!w.is_empty());
    }
}
