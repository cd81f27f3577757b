//! Replica receive loop and request handlers

use std::collections::BTreeMap;
use std::sync::Arc;

use simstore::SimulationStorage;
use tracing::{debug, info, warn};

use super::ReplicaError;
use crate::pdfs::Pdf;
use crate::proposers::{ExchangeParams, LocalChain, Proposer};
use crate::protocol::{ActorId, ChainState, DumpWindow, Request};
use crate::samplers::{MoveStats, Sampler};
use crate::transport::Transport;

/// Partner data buffered for the exchange attempt in flight
///
/// At most one of these exists per replica at any time: written by
/// `DeliverPartnerState`, read by `ProposeExchange`, cleared by
/// `CommitDecision`. A stale entry can therefore never leak into the next
/// attempt.
#[derive(Debug, Clone)]
pub struct BufferedPartner {
    pub state: ChainState,
    pub negative_log_prob: f64,
}

/// One ladder member: a chain, its sampler, and the request handlers
pub struct Replica<T: Transport> {
    id: ActorId,
    transport: T,
    pdf: Arc<dyn Pdf>,
    sampler: Box<dyn Sampler>,
    proposers: BTreeMap<String, Box<dyn Proposer>>,
    storage: SimulationStorage,

    samples: Vec<ChainState>,
    energies: Vec<f64>,
    move_stats: Vec<(u64, MoveStats)>,
    n_samples_drawn: u64,

    buffered_partner: Option<BufferedPartner>,
    buffered_proposal: Option<ChainState>,
    /// Coordinator currently driving an exchange attempt on this replica
    current_coordinator: Option<ActorId>,
}

impl<T: Transport> Replica<T> {
    pub fn new(
        transport: T,
        pdf: Arc<dyn Pdf>,
        sampler: Box<dyn Sampler>,
        proposers: BTreeMap<String, Box<dyn Proposer>>,
        storage: SimulationStorage,
    ) -> Self {
        let id = transport.local_id();
        Self {
            id,
            transport,
            pdf,
            sampler,
            proposers,
            storage,
            samples: Vec::new(),
            energies: Vec::new(),
            move_stats: Vec::new(),
            n_samples_drawn: 0,
            buffered_partner: None,
            buffered_proposal: None,
            current_coordinator: None,
        }
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Current chain state
    pub fn state(&self) -> &ChainState {
        self.sampler.state()
    }

    /// Energy of the current chain state
    pub fn negative_log_prob(&self) -> f64 {
        self.pdf.negative_log_prob(self.sampler.state())
    }

    /// Process requests until `Terminate` arrives
    ///
    /// A fatal error tears the loop down; the coordinator notices through
    /// the closed channel on its next send.
    pub async fn run(mut self) -> Result<(), ReplicaError> {
        info!(replica = %self.id, "replica started");

        loop {
            let env = self.transport.recv().await?;
            debug!(replica = %self.id, from = %env.sender, request = env.payload.kind(), "processing request");

            match env.payload {
                Request::Sample => self.sample(),
                Request::FetchPartnerState { partner } => {
                    self.current_coordinator = Some(env.sender);
                    self.transport.send(partner, Request::RequestPartnerState).await?;
                }
                Request::RequestPartnerState => {
                    let reply = Request::DeliverPartnerState {
                        state: self.state().clone(),
                        negative_log_prob: self.negative_log_prob(),
                    };
                    self.transport.send(env.sender, reply).await?;
                }
                Request::DeliverPartnerState {
                    state,
                    negative_log_prob,
                } => {
                    self.buffered_partner = Some(BufferedPartner {
                        state,
                        negative_log_prob,
                    });
                    let coordinator = self.exchange_coordinator()?;
                    self.transport.send(coordinator, Request::Acknowledge).await?;
                }
                Request::ProposeExchange { partner, params } => {
                    self.current_coordinator = Some(env.sender);
                    match self.evaluate_proposal(partner, &params) {
                        Ok((work, heat)) => {
                            self.transport
                                .send(env.sender, Request::ProposalEvaluated { work, heat })
                                .await?;
                        }
                        Err(e) if !e.is_fatal() => {
                            warn!(replica = %self.id, "exchange attempt rejected: {e}");
                            self.transport
                                .send(env.sender, Request::ExchangeRejected { reason: e.to_string() })
                                .await?;
                        }
                        Err(e) => return Err(e),
                    }
                }
                Request::CommitDecision { accept } => {
                    self.commit(accept)?;
                    self.transport.send(env.sender, Request::Acknowledge).await?;
                }
                Request::DumpSamples(window) => self.dump_samples(&window)?,
                Request::DumpEnergies(window) => self.dump_energies(&window)?,
                Request::ReportStats => {
                    let stats = std::mem::take(&mut self.move_stats);
                    self.transport.send(env.sender, Request::StatsReport { stats }).await?;
                }
                Request::Terminate => {
                    debug!(replica = %self.id, "terminating");
                    break;
                }
                other => {
                    return Err(ReplicaError::UnexpectedRequest {
                        kind: other.kind(),
                        sender: env.sender.to_string(),
                    });
                }
            }
        }

        info!(replica = %self.id, samples_drawn = self.n_samples_drawn, "replica stopped");
        Ok(())
    }

    /// One local move; extends all three traces
    fn sample(&mut self) {
        let (state, stats) = self.sampler.step();
        self.n_samples_drawn += 1;
        self.energies.push(stats.negative_log_prob);
        self.move_stats.push((self.n_samples_drawn, stats));
        self.samples.push(state);
    }

    /// The coordinator an in-flight exchange attempt reports back to
    fn exchange_coordinator(&self) -> Result<ActorId, ReplicaError> {
        self.current_coordinator.ok_or(ReplicaError::MissingPartnerState {
            request: "deliver_partner_state",
        })
    }

    /// Requested tags intersected with registered ones, smallest tag wins
    fn pick_proposer(&self, params: &ExchangeParams) -> Result<&str, ReplicaError> {
        self.proposers
            .keys()
            .find(|tag| params.proposers.iter().any(|p| p == *tag))
            .map(|tag| tag.as_str())
            .ok_or_else(|| ReplicaError::NoSharedProposer {
                requested: params.proposers.clone(),
                registered: self.proposers.keys().cloned().collect(),
            })
    }

    /// Run the selected proposer against the buffered partner entry
    fn evaluate_proposal(&mut self, partner: ActorId, params: &ExchangeParams) -> Result<(f64, f64), ReplicaError> {
        let entry = self
            .buffered_partner
            .as_ref()
            .ok_or(ReplicaError::MissingPartnerState {
                request: "propose_exchange",
            })?;

        let tag = self.pick_proposer(params)?;
        debug!(replica = %self.id, %partner, proposer = tag, "evaluating proposal");

        let local = LocalChain {
            pdf: self.pdf.as_ref(),
            state: self.sampler.state(),
        };
        let trajectory = self.proposers[tag].propose(
            &local,
            &entry.state,
            entry.negative_log_prob,
            &params.proposer_params,
        );

        self.buffered_proposal = Some(trajectory.terminal().clone());
        Ok((trajectory.work, trajectory.heat))
    }

    /// Land the attempt in the accept or reject branch
    ///
    /// The initiating side adopts its buffered proposal; the partner side,
    /// which never proposed, adopts the buffered partner state. Both sides
    /// append the resulting state to the traces so every replica's trace
    /// grows by one entry on an exchange iteration.
    fn commit(&mut self, accept: bool) -> Result<(), ReplicaError> {
        if accept {
            let new_state = self
                .buffered_proposal
                .take()
                .or_else(|| self.buffered_partner.take().map(|entry| entry.state))
                .ok_or(ReplicaError::MissingProposal)?;
            self.sampler.set_state(new_state);
        }

        self.buffered_partner = None;
        self.buffered_proposal = None;
        self.current_coordinator = None;

        self.n_samples_drawn += 1;
        let state = self.sampler.state().clone();
        self.energies.push(self.pdf.negative_log_prob(&state));
        self.samples.push(state);
        Ok(())
    }

    /// Dump the requested sample window and truncate the trace
    fn dump_samples(&mut self, window: &DumpWindow) -> Result<(), ReplicaError> {
        let take = self.samples.len().min(window.len());
        let consumed: Vec<ChainState> = self.samples.drain(..take).collect();
        let thinned: Vec<ChainState> = consumed.into_iter().step_by(window.thinning.max(1)).collect();

        let (start, end) = window.shifted();
        let replica = self.id.replica_index().unwrap_or(0);
        debug!(replica = %self.id, start, end, consumed = take, kept = thinned.len(), "dumping samples");
        self.storage.write_samples(replica, start, end, &thinned)?;
        Ok(())
    }

    /// Dump the requested energy window and truncate the trace
    fn dump_energies(&mut self, window: &DumpWindow) -> Result<(), ReplicaError> {
        let take = self.energies.len().min(window.len());
        let consumed: Vec<f64> = self.energies.drain(..take).collect();
        let thinned: Vec<f64> = consumed.into_iter().step_by(window.thinning.max(1)).collect();

        let (start, end) = window.shifted();
        let replica = self.id.replica_index().unwrap_or(0);
        self.storage.write_energies(replica, start, end, &thinned)?;
        Ok(())
    }
}
