//! Metropolis random-walk sampler

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{MoveStats, Sampler};
use crate::pdfs::Pdf;
use crate::protocol::ChainState;

/// Random-walk Metropolis with uniform proposals and stepsize adaption
///
/// The stepsize is multiplied by `uprate` after an accepted move and by
/// `downrate` after a rejected one, until `adaption_limit` moves have been
/// drawn; after that it stays fixed so the chain samples the unmodified
/// kernel.
pub struct RandomWalkSampler {
    pdf: Arc<dyn Pdf>,
    state: ChainState,
    stepsize: f64,
    adaption_limit: u64,
    uprate: f64,
    downrate: f64,
    last_accepted: bool,
    n_moves: u64,
    rng: StdRng,
}

impl RandomWalkSampler {
    pub fn new(pdf: Arc<dyn Pdf>, state: ChainState, stepsize: f64, seed: u64) -> Self {
        Self {
            pdf,
            state,
            stepsize,
            adaption_limit: 0,
            uprate: 1.05,
            downrate: 0.95,
            last_accepted: false,
            n_moves: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Enable stepsize adaption for the first `limit` moves
    pub fn with_adaption(mut self, limit: u64, uprate: f64, downrate: f64) -> Self {
        self.adaption_limit = limit;
        self.uprate = uprate;
        self.downrate = downrate;
        self
    }

    pub fn stepsize(&self) -> f64 {
        self.stepsize
    }

    fn adapt_stepsize(&mut self) {
        if self.last_accepted {
            self.stepsize *= self.uprate;
        } else {
            self.stepsize *= self.downrate;
        }
    }
}

impl Sampler for RandomWalkSampler {
    fn step(&mut self) -> (ChainState, MoveStats) {
        let energy_old = self.pdf.negative_log_prob(&self.state);
        let proposal: ChainState = self
            .state
            .iter()
            .map(|xi| xi + self.rng.random_range(-self.stepsize..self.stepsize))
            .collect();
        let energy_new = self.pdf.negative_log_prob(&proposal);

        let accepted = self.rng.random::<f64>().ln() < -(energy_new - energy_old);
        if accepted {
            self.state = proposal;
        }
        self.last_accepted = accepted;

        if self.n_moves < self.adaption_limit {
            self.adapt_stepsize();
        }
        self.n_moves += 1;

        let stats = MoveStats {
            accepted,
            stepsize: self.stepsize,
            negative_log_prob: self.pdf.negative_log_prob(&self.state),
            total_moves: self.n_moves,
        };
        (self.state.clone(), stats)
    }

    fn state(&self) -> &ChainState {
        &self.state
    }

    fn set_state(&mut self, state: ChainState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdfs::Normal;

    fn sampler(seed: u64) -> RandomWalkSampler {
        RandomWalkSampler::new(Arc::new(Normal::standard()), vec![0.0], 0.5, seed)
    }

    #[test]
    fn test_step_counts_moves() {
        let mut s = sampler(7);
        let (_, first) = s.step();
        let (_, second) = s.step();

        assert_eq!(first.total_moves, 1);
        assert_eq!(second.total_moves, 2);
    }

    #[test]
    fn test_same_seed_same_trajectory() {
        let mut a = sampler(42);
        let mut b = sampler(42);

        for _ in 0..50 {
            assert_eq!(a.step().0, b.step().0);
        }
    }

    #[test]
    fn test_set_state_replaces_wholesale() {
        let mut s = sampler(1);
        s.set_state(vec![3.5]);
        assert_eq!(s.state(), &vec![3.5]);
    }

    #[test]
    fn test_adaption_stops_at_limit() {
        let mut s = sampler(9).with_adaption(10, 1.05, 0.95);
        for _ in 0..10 {
            s.step();
        }
        let frozen = s.stepsize();
        for _ in 0..10 {
            s.step();
        }
        assert_eq!(s.stepsize(), frozen);
    }

    #[test]
    fn test_moves_from_standard_normal_stay_reasonable() {
        // 200 moves from a standard normal should keep the chain within a
        // few sigma and accept a healthy fraction of proposals.
        let mut s = sampler(123);
        let mut accepted = 0;
        for _ in 0..200 {
            let (state, stats) = s.step();
            assert!(state[0].abs() < 10.0);
            if stats.accepted {
                accepted += 1;
            }
        }
        assert!(accepted > 20, "acceptance collapsed: {accepted}/200");
    }
}
