//! The global iteration loop and the exchange protocol

use std::collections::{BTreeMap, HashMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use simstore::SimulationStorage;
use tracing::{debug, info, warn};

use super::pairing::{adjacent_pairs, participants};
use super::{CoordinatorConfig, CoordinatorError};
use crate::proposers::ExchangeParams;
use crate::protocol::{ActorId, DumpWindow, Request};
use crate::statistics::{Aggregator, ReporterHandle};
use crate::transport::Transport;

/// Drives `n_replicas` replica actors through sampling, exchange, statistics
/// and dump rounds, then terminates them.
pub struct Coordinator<T: Transport> {
    transport: T,
    config: CoordinatorConfig,
    n_replicas: u32,
    params: ExchangeParams,
    aggregator: Aggregator,
    reporter: Option<ReporterHandle>,
    storage: Option<SimulationStorage>,
    works: BTreeMap<(u32, u32), Vec<f64>>,
    heats: BTreeMap<(u32, u32), Vec<f64>>,
    rng: StdRng,
    exchange_round: u64,
    last_dump: u64,
}

impl<T: Transport> Coordinator<T> {
    pub fn new(transport: T, n_replicas: u32, config: CoordinatorConfig, params: ExchangeParams) -> Self {
        Self {
            transport,
            config,
            n_replicas,
            params,
            aggregator: Aggregator::new(),
            reporter: None,
            storage: None,
            works: BTreeMap::new(),
            heats: BTreeMap::new(),
            rng: StdRng::from_os_rng(),
            exchange_round: 0,
            last_dump: 0,
        }
    }

    /// Flush statistics snapshots through this reporter
    pub fn with_reporter(mut self, reporter: ReporterHandle) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Dump per-pair work/heat records into this store
    pub fn with_storage(mut self, storage: SimulationStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Seed the acceptance draws for a reproducible run
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    fn replica_ids(&self) -> impl Iterator<Item = ActorId> {
        (1..=self.n_replicas).map(ActorId::Replica)
    }

    /// Run the full loop, dump what remains, and terminate the ladder
    pub async fn run(&mut self) -> Result<(), CoordinatorError> {
        info!(
            replicas = self.n_replicas,
            iterations = self.config.n_iterations,
            swap_interval = self.config.swap_interval,
            "coordinator started"
        );

        for iteration in 1..=self.config.n_iterations {
            let mut exchanging: HashSet<u32> = HashSet::new();

            if self.config.swap_interval > 0 && iteration % self.config.swap_interval == 0 {
                let pairs = adjacent_pairs(self.n_replicas, self.exchange_round);
                self.exchange_round += 1;
                exchanging = participants(&pairs);
                // Replicas in a pair get their trace entry from the commit;
                // everyone else samples locally this iteration.
                self.broadcast_sample(&exchanging).await?;
                if !pairs.is_empty() {
                    self.run_exchange_round(&pairs, iteration).await?;
                }
            } else {
                self.broadcast_sample(&exchanging).await?;
            }

            if self.config.status_interval > 0 && iteration % self.config.status_interval == 0 {
                self.collect_stats(iteration).await?;
            }

            if self.config.dump_interval > 0 && iteration % self.config.dump_interval == 0 {
                self.dump_traces(iteration).await?;
            }
        }

        if self.config.dump_interval > 0 && self.last_dump < self.config.n_iterations {
            self.dump_traces(self.config.n_iterations).await?;
        }

        self.terminate().await?;
        if let Some(reporter) = &self.reporter {
            reporter.shutdown().await;
        }

        info!(rounds = self.exchange_round, "coordinator finished");
        Ok(())
    }

    /// Fire-and-forget local moves for every replica not in `exclude`
    async fn broadcast_sample(&self, exclude: &HashSet<u32>) -> Result<(), CoordinatorError> {
        for id in self.replica_ids() {
            if let Some(n) = id.replica_index()
                && exclude.contains(&n)
            {
                continue;
            }
            self.transport.send(id, Request::Sample).await?;
        }
        Ok(())
    }

    /// One exchange round over disjoint pairs, pipelined per phase
    async fn run_exchange_round(&mut self, pairs: &[(u32, u32)], step: u64) -> Result<(), CoordinatorError> {
        debug!(step, ?pairs, "exchange round");

        // Phase 1: both sides of each pair pull the other's state.
        let mut pending: HashSet<ActorId> = HashSet::new();
        for &(a, b) in pairs {
            self.transport
                .send(ActorId::Replica(a), Request::FetchPartnerState { partner: ActorId::Replica(b) })
                .await?;
            self.transport
                .send(ActorId::Replica(b), Request::FetchPartnerState { partner: ActorId::Replica(a) })
                .await?;
            pending.insert(ActorId::Replica(a));
            pending.insert(ActorId::Replica(b));
        }
        self.gather_acks(pending).await?;

        // Phase 2: the lower ladder member of each pair proposes.
        for &(a, b) in pairs {
            self.transport
                .send(
                    ActorId::Replica(a),
                    Request::ProposeExchange {
                        partner: ActorId::Replica(b),
                        params: self.params.clone(),
                    },
                )
                .await?;
        }
        let initiators: HashSet<ActorId> = pairs.iter().map(|&(a, _)| ActorId::Replica(a)).collect();
        let evaluations = self.gather_evaluations(initiators).await?;

        // Phase 3: decide once per pair, commit symmetrically to both sides.
        let mut pending: HashSet<ActorId> = HashSet::new();
        for &(a, b) in pairs {
            let accept = match evaluations.get(&ActorId::Replica(a)) {
                Some(&Some((work, heat))) => {
                    let accept = self.metropolis(work);
                    self.record_exchange(a, b, step, work, heat, accept);
                    accept
                }
                // Rejected attempt: commit reject so both sides clear their
                // buffers and the traces stay uniform.
                _ => false,
            };
            self.transport
                .send(ActorId::Replica(a), Request::CommitDecision { accept })
                .await?;
            self.transport
                .send(ActorId::Replica(b), Request::CommitDecision { accept })
                .await?;
            pending.insert(ActorId::Replica(a));
            pending.insert(ActorId::Replica(b));
        }
        self.gather_acks(pending).await?;

        Ok(())
    }

    /// The acceptance rule, applied exactly once per pair
    fn metropolis(&mut self, work: f64) -> bool {
        self.rng.random::<f64>().ln() < -work
    }

    fn record_exchange(&mut self, a: u32, b: u32, step: u64, work: f64, heat: f64, accepted: bool) {
        debug!(pair = ?(a, b), step, work, heat, accepted, "exchange decided");
        self.aggregator
            .record_exchange(ActorId::Replica(a), ActorId::Replica(b), step, work, heat, accepted);
        self.works.entry((a, b)).or_default().push(work);
        self.heats.entry((a, b)).or_default().push(heat);
    }

    /// Wait for an Acknowledge from every actor in `pending`
    async fn gather_acks(&mut self, mut pending: HashSet<ActorId>) -> Result<(), CoordinatorError> {
        while !pending.is_empty() {
            let env = self.transport.recv_timeout(self.config.reply_timeout()).await?;
            match env.payload {
                Request::Acknowledge if pending.remove(&env.sender) => {}
                other => {
                    return Err(CoordinatorError::UnexpectedReply {
                        from: env.sender,
                        kind: other.kind(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Wait for a ProposalEvaluated or ExchangeRejected from every initiator
    async fn gather_evaluations(
        &mut self,
        mut pending: HashSet<ActorId>,
    ) -> Result<HashMap<ActorId, Option<(f64, f64)>>, CoordinatorError> {
        let mut evaluations = HashMap::new();
        while !pending.is_empty() {
            let env = self.transport.recv_timeout(self.config.reply_timeout()).await?;
            if !pending.remove(&env.sender) {
                return Err(CoordinatorError::UnexpectedReply {
                    from: env.sender,
                    kind: env.payload.kind(),
                });
            }
            match env.payload {
                Request::ProposalEvaluated { work, heat } => {
                    evaluations.insert(env.sender, Some((work, heat)));
                }
                Request::ExchangeRejected { reason } => {
                    warn!(from = %env.sender, %reason, "exchange attempt rejected");
                    evaluations.insert(env.sender, None);
                }
                other => {
                    return Err(CoordinatorError::UnexpectedReply {
                        from: env.sender,
                        kind: other.kind(),
                    });
                }
            }
        }
        Ok(evaluations)
    }

    /// Pull move statistics from every replica and flush a snapshot
    async fn collect_stats(&mut self, step: u64) -> Result<(), CoordinatorError> {
        for id in self.replica_ids() {
            self.transport.send(id, Request::ReportStats).await?;
        }

        let mut pending: HashSet<ActorId> = self.replica_ids().collect();
        while !pending.is_empty() {
            let env = self.transport.recv_timeout(self.config.reply_timeout()).await?;
            if !pending.remove(&env.sender) {
                return Err(CoordinatorError::UnexpectedReply {
                    from: env.sender,
                    kind: env.payload.kind(),
                });
            }
            match env.payload {
                Request::StatsReport { stats } => {
                    for (move_index, move_stats) in &stats {
                        self.aggregator.record_move_stats(env.sender, *move_index, move_stats);
                    }
                }
                other => {
                    return Err(CoordinatorError::UnexpectedReply {
                        from: env.sender,
                        kind: other.kind(),
                    });
                }
            }
        }

        if let Some(reporter) = &self.reporter {
            reporter.flush(step, self.aggregator.snapshot());
        }
        Ok(())
    }

    /// Ask every replica to dump the window since the previous dump, and
    /// dump the coordinator's own work/heat records
    async fn dump_traces(&mut self, step: u64) -> Result<(), CoordinatorError> {
        let window = DumpWindow {
            from: self.last_dump,
            to: step,
            offset: self.config.sample_offset,
            thinning: self.config.thinning,
        };
        debug!(from = window.from, to = window.to, "dumping traces");

        for id in self.replica_ids() {
            self.transport.send(id, Request::DumpSamples(window)).await?;
            self.transport.send(id, Request::DumpEnergies(window)).await?;
        }

        if let Some(storage) = &self.storage {
            let (start, end) = window.shifted();
            for (&(a, b), works) in &self.works {
                storage.write_works(a, b, start, end, works)?;
            }
            for (&(a, b), heats) in &self.heats {
                storage.write_heats(a, b, start, end, heats)?;
            }
        }
        self.works.clear();
        self.heats.clear();

        self.last_dump = step;
        Ok(())
    }

    /// Drained of outstanding attempts by construction, so replicas can be
    /// told to exit in any order
    async fn terminate(&self) -> Result<(), CoordinatorError> {
        for id in self.replica_ids() {
            self.transport.send(id, Request::Terminate).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdfs::Normal;
    use crate::proposers::{PlainExchange, Proposer};
    use crate::replica::Replica;
    use crate::samplers::RandomWalkSampler;
    use crate::statistics::{ACCEPTANCE_RATE, EXCHANGE_WORK};
    use crate::transport::ChannelHub;
    use std::sync::Arc;

    async fn spawn_ladder(
        hub: &ChannelHub,
        n_replicas: u32,
        storage: &SimulationStorage,
    ) -> Vec<tokio::task::JoinHandle<Result<(), crate::replica::ReplicaError>>> {
        let mut handles = Vec::new();
        for n in 1..=n_replicas {
            let endpoint = hub.endpoint(ActorId::Replica(n)).await;
            let pdf = Arc::new(Normal::new(0.0, n as f64));
            let sampler = RandomWalkSampler::new(pdf.clone(), vec![0.0], 0.5, 100 + n as u64);
            let mut proposers: BTreeMap<String, Box<dyn Proposer>> = BTreeMap::new();
            proposers.insert("re".to_string(), Box::new(PlainExchange));
            let replica = Replica::new(endpoint, pdf, Box::new(sampler), proposers, storage.clone());
            handles.push(tokio::spawn(replica.run()));
        }
        handles
    }

    #[tokio::test]
    async fn test_ten_iterations_pair_adjacent_links_only() {
        let hub = ChannelHub::new(64);
        let endpoint = hub.endpoint(ActorId::Coordinator).await;
        let storage = SimulationStorage::in_memory();
        let handles = spawn_ladder(&hub, 4, &storage).await;

        let config = CoordinatorConfig {
            n_iterations: 10,
            swap_interval: 5,
            status_interval: 10,
            dump_interval: 10,
            ..Default::default()
        };
        let mut coordinator =
            Coordinator::new(endpoint, 4, config, ExchangeParams::plain()).with_seed(7);
        coordinator.run().await.unwrap();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let agg = coordinator.aggregator();
        // Step 5 pairs (1,2),(3,4); step 10 pairs (2,3); 1 and 4 never meet.
        for pair in [(1u32, 2u32), (3, 4), (2, 3)] {
            let origins = [ActorId::Replica(pair.0), ActorId::Replica(pair.1)];
            assert!(agg.get(EXCHANGE_WORK, &origins).is_some(), "missing pair {pair:?}");
            assert!(agg.get(ACCEPTANCE_RATE, &origins).is_some());
        }
        assert!(
            agg.get(EXCHANGE_WORK, &[ActorId::Replica(1), ActorId::Replica(4)])
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_every_replica_trace_grows_one_per_iteration() {
        let hub = ChannelHub::new(64);
        let endpoint = hub.endpoint(ActorId::Coordinator).await;
        let storage = SimulationStorage::in_memory();
        let handles = spawn_ladder(&hub, 3, &storage).await;

        let config = CoordinatorConfig {
            n_iterations: 20,
            swap_interval: 4,
            status_interval: 0,
            dump_interval: 20,
            ..Default::default()
        };
        let mut coordinator =
            Coordinator::new(endpoint, 3, config, ExchangeParams::plain()).with_seed(3);
        coordinator.run().await.unwrap();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // Exchange or not, every replica appended exactly 20 energies.
        for n in 1..=3 {
            let energies = storage.read_energies(n, 0, 20).unwrap();
            assert_eq!(energies.len(), 20, "replica {n}");
        }
    }

    #[tokio::test]
    async fn test_final_partial_window_is_dumped() {
        let hub = ChannelHub::new(64);
        let endpoint = hub.endpoint(ActorId::Coordinator).await;
        let storage = SimulationStorage::in_memory();
        let handles = spawn_ladder(&hub, 2, &storage).await;

        let config = CoordinatorConfig {
            n_iterations: 7,
            swap_interval: 0,
            status_interval: 0,
            dump_interval: 5,
            ..Default::default()
        };
        let mut coordinator =
            Coordinator::new(endpoint, 2, config, ExchangeParams::plain()).with_seed(1);
        coordinator.run().await.unwrap();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(storage.read_energies(1, 0, 5).unwrap().len(), 5);
        assert_eq!(storage.read_energies(1, 5, 7).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_work_records_dumped_to_storage() {
        let hub = ChannelHub::new(64);
        let endpoint = hub.endpoint(ActorId::Coordinator).await;
        let storage = SimulationStorage::in_memory();
        let handles = spawn_ladder(&hub, 2, &storage).await;

        let config = CoordinatorConfig {
            n_iterations: 10,
            swap_interval: 2,
            status_interval: 0,
            dump_interval: 10,
            ..Default::default()
        };
        let mut coordinator = Coordinator::new(endpoint, 2, config, ExchangeParams::plain())
            .with_seed(11)
            .with_storage(storage.clone());
        coordinator.run().await.unwrap();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // Rounds at steps 2,6,10 pair (1,2); rounds at 4,8 idle (odd rounds
        // of a two-member ladder), so three works were recorded.
        let bytes = storage.backend().read("works/works_1-2_0-10.json").unwrap();
        let works: Vec<f64> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(works.len(), 3);
    }
}
