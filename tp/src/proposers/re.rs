//! Plain replica-exchange proposal

use super::{LocalChain, Proposer, ProposerParams, Trajectory};
use crate::protocol::ChainState;

/// Tag under which [`PlainExchange`] is conventionally registered
pub const PLAIN_EXCHANGE_TAG: &str = "re";

/// The direct swap: the candidate state is the partner's state, and the
/// work is the energy difference the local chain sees in adopting it.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainExchange;

impl Proposer for PlainExchange {
    fn propose(
        &self,
        local: &LocalChain<'_>,
        partner_state: &ChainState,
        partner_negative_log_prob: f64,
        _params: &ProposerParams,
    ) -> Trajectory {
        let work = local.pdf.negative_log_prob(partner_state) - partner_negative_log_prob;
        Trajectory::new(vec![partner_state.clone(), partner_state.clone()], work, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdfs::Pdf;

    /// Target with negative_log_prob(x) = x[0]
    struct LinearEnergy;

    impl Pdf for LinearEnergy {
        fn log_prob(&self, x: &[f64]) -> f64 {
            -x[0]
        }
    }

    #[test]
    fn test_plain_exchange_work() {
        // local nlp(x) = x, partner state 5, partner nlp 3 => work = 5 - 3 = 2
        let local_state = vec![1.0];
        let local = LocalChain {
            pdf: &LinearEnergy,
            state: &local_state,
        };

        let traj = PlainExchange.propose(&local, &vec![5.0], 3.0, &ProposerParams::default());

        assert_eq!(traj.work, 2.0);
        assert_eq!(traj.heat, 0.0);
    }

    #[test]
    fn test_plain_exchange_terminal_is_partner_state() {
        let local_state = vec![0.0];
        let local = LocalChain {
            pdf: &LinearEnergy,
            state: &local_state,
        };

        let partner = vec![7.0, -2.0];
        let traj = PlainExchange.propose(&local, &partner, 0.0, &ProposerParams::default());

        assert_eq!(traj.initial(), &partner);
        assert_eq!(traj.terminal(), &partner);
    }
}
