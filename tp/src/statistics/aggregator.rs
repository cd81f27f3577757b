//! Statistics aggregation
//!
//! The coordinator owns one [`Aggregator`] and feeds it on every relevant
//! event; writers only ever see cloned snapshots. Quantities are indexed by
//! name and then by origin key, so lookups never scan the whole collection.

use std::collections::BTreeMap;

use crate::protocol::ActorId;
use crate::samplers::MoveStats;

use super::{AveragingQuantity, LoggedQuantity, Quantity, QuantityValue};

/// Name under which local and exchange acceptance rates are recorded
pub const ACCEPTANCE_RATE: &str = "acceptance rate";
/// Name under which sampler step sizes are recorded
pub const STEPSIZE: &str = "stepsize";
/// Name under which per-replica energies are recorded
pub const NEGATIVE_LOG_PROB: &str = "negative log prob";
/// Name under which per-pair work/heat pairs are recorded
pub const EXCHANGE_WORK: &str = "exchange work";

/// Identifies one quantity: its name plus the sorted origin ids
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuantityKey {
    pub name: String,
    /// Origins joined in sorted order ("replica1:replica2")
    pub origins: String,
}

impl QuantityKey {
    fn new(name: &str, origins: &[ActorId]) -> Self {
        let mut ids: Vec<String> = origins.iter().map(|o| o.to_string()).collect();
        ids.sort();
        Self {
            name: name.to_string(),
            origins: ids.join(":"),
        }
    }
}

/// Mapping from quantity key to quantity, indexed by name then origins
#[derive(Debug, Default)]
pub struct Aggregator {
    quantities: BTreeMap<String, BTreeMap<String, Quantity>>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn averaging_mut(&mut self, name: &str, origins: &[ActorId]) -> &mut AveragingQuantity {
        let key = QuantityKey::new(name, origins);
        let entry = self
            .quantities
            .entry(key.name.clone())
            .or_default()
            .entry(key.origins)
            .or_insert_with(|| {
                Quantity::Averaging(AveragingQuantity::new(
                    name,
                    origins.iter().map(|o| o.to_string()),
                ))
            });
        match entry {
            Quantity::Averaging(q) => q,
            Quantity::Logged(_) => unreachable!("quantity {name} registered as logged"),
        }
    }

    fn logged_mut(&mut self, name: &str, origins: &[ActorId]) -> &mut LoggedQuantity {
        let key = QuantityKey::new(name, origins);
        let entry = self
            .quantities
            .entry(key.name.clone())
            .or_default()
            .entry(key.origins)
            .or_insert_with(|| {
                Quantity::Logged(LoggedQuantity::new(name, origins.iter().map(|o| o.to_string())))
            });
        match entry {
            Quantity::Logged(q) => q,
            Quantity::Averaging(_) => unreachable!("quantity {name} registered as averaging"),
        }
    }

    /// Fold one local move's statistics in, keyed by its move index
    pub fn record_move_stats(&mut self, replica: ActorId, step: u64, stats: &MoveStats) {
        let origin = [replica];
        self.averaging_mut(ACCEPTANCE_RATE, &origin)
            .update(step, if stats.accepted { 1.0 } else { 0.0 });
        self.logged_mut(STEPSIZE, &origin)
            .update(step, QuantityValue::Scalar(stats.stepsize));
        self.logged_mut(NEGATIVE_LOG_PROB, &origin)
            .update(step, QuantityValue::Scalar(stats.negative_log_prob));
    }

    /// Fold one exchange attempt's outcome in, keyed by the sorted pair
    pub fn record_exchange(&mut self, a: ActorId, b: ActorId, step: u64, work: f64, heat: f64, accepted: bool) {
        let pair = if a <= b { [a, b] } else { [b, a] };
        self.logged_mut(EXCHANGE_WORK, &pair)
            .update(step, QuantityValue::Pair(work, heat));
        self.averaging_mut(ACCEPTANCE_RATE, &pair)
            .update(step, if accepted { 1.0 } else { 0.0 });
    }

    /// All quantities with the given name, in origin order
    pub fn select(&self, name: &str) -> impl Iterator<Item = &Quantity> {
        self.quantities.get(name).into_iter().flat_map(|by_origin| by_origin.values())
    }

    /// The quantity with the given name and exact origin set
    pub fn get(&self, name: &str, origins: &[ActorId]) -> Option<&Quantity> {
        let key = QuantityKey::new(name, origins);
        self.quantities.get(&key.name)?.get(&key.origins)
    }

    /// Read-only copy of every quantity for flushing to writers
    pub fn snapshot(&self) -> Vec<Quantity> {
        self.quantities
            .values()
            .flat_map(|by_origin| by_origin.values().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.quantities.values().map(|by_origin| by_origin.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.quantities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(accepted: bool) -> MoveStats {
        MoveStats {
            accepted,
            stepsize: 0.5,
            negative_log_prob: 1.25,
            total_moves: 1,
        }
    }

    #[test]
    fn test_record_move_stats_creates_three_quantities() {
        let mut agg = Aggregator::new();
        agg.record_move_stats(ActorId::Replica(1), 1, &stats(true));

        assert_eq!(agg.len(), 3);
        let rate = agg.get(ACCEPTANCE_RATE, &[ActorId::Replica(1)]).unwrap();
        assert_eq!(rate.current_value(), Some(QuantityValue::Scalar(1.0)));
    }

    #[test]
    fn test_acceptance_rate_averages() {
        let mut agg = Aggregator::new();
        agg.record_move_stats(ActorId::Replica(1), 1, &stats(true));
        agg.record_move_stats(ActorId::Replica(1), 2, &stats(false));
        agg.record_move_stats(ActorId::Replica(1), 3, &stats(true));

        let rate = agg.get(ACCEPTANCE_RATE, &[ActorId::Replica(1)]).unwrap();
        let QuantityValue::Scalar(mean) = rate.current_value().unwrap() else {
            panic!("acceptance rate should be scalar");
        };
        assert!((mean - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_exchange_keyed_by_sorted_pair() {
        let mut agg = Aggregator::new();
        agg.record_exchange(ActorId::Replica(2), ActorId::Replica(1), 5, 2.0, 0.0, false);

        // Lookup order must not matter
        let work = agg
            .get(EXCHANGE_WORK, &[ActorId::Replica(1), ActorId::Replica(2)])
            .unwrap();
        assert_eq!(work.current_value(), Some(QuantityValue::Pair(2.0, 0.0)));
        assert_eq!(work.origins().len(), 2);
    }

    #[test]
    fn test_select_by_name() {
        let mut agg = Aggregator::new();
        agg.record_move_stats(ActorId::Replica(1), 1, &stats(true));
        agg.record_move_stats(ActorId::Replica(2), 1, &stats(true));
        agg.record_exchange(ActorId::Replica(1), ActorId::Replica(2), 5, 1.0, 0.0, true);

        assert_eq!(agg.select(ACCEPTANCE_RATE).count(), 3);
        assert_eq!(agg.select(EXCHANGE_WORK).count(), 1);
        assert_eq!(agg.select("no such name").count(), 0);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut agg = Aggregator::new();
        agg.record_move_stats(ActorId::Replica(1), 1, &stats(true));

        let snapshot = agg.snapshot();
        agg.record_move_stats(ActorId::Replica(1), 2, &stats(false));

        let rate = snapshot.iter().find(|q| q.name() == ACCEPTANCE_RATE).unwrap();
        assert_eq!(rate.current_value(), Some(QuantityValue::Scalar(1.0)));
    }
}
