//! Time-indexed named quantities
//!
//! Everything the run reports — acceptance rates, step sizes, exchange
//! works — is a named quantity tagged with the actors it originates from
//! and updated under a monotone step key. Writers only ever see read-only
//! snapshots of these.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

mod aggregator;
mod reporter;
pub mod writers;

pub use aggregator::{
    ACCEPTANCE_RATE, Aggregator, EXCHANGE_WORK, NEGATIVE_LOG_PROB, QuantityKey, STEPSIZE,
};
pub use reporter::{ReportCommand, ReporterHandle, StatsReporter};

/// A quantity's recorded value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum QuantityValue {
    Scalar(f64),
    /// Work/heat pairs from exchange attempts
    Pair(f64, f64),
}

impl QuantityValue {
    /// Scalar view; a pair reads as its first component
    pub fn as_scalar(&self) -> f64 {
        match self {
            QuantityValue::Scalar(v) => *v,
            QuantityValue::Pair(first, _) => *first,
        }
    }
}

impl std::fmt::Display for QuantityValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuantityValue::Scalar(v) => write!(f, "{v:.6}"),
            QuantityValue::Pair(a, b) => write!(f, "({a:.6}, {b:.6})"),
        }
    }
}

/// A named, origin-tagged, time-indexed series of values
///
/// The value map is append-only; updating an existing step overwrites that
/// step but the current value always follows the most recent insertion,
/// whatever its key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggedQuantity {
    name: String,
    origins: BTreeSet<String>,
    values: BTreeMap<u64, QuantityValue>,
    last_inserted: Option<u64>,
    default_value: Option<QuantityValue>,
}

impl LoggedQuantity {
    pub fn new(name: impl Into<String>, origins: impl IntoIterator<Item = String>) -> Self {
        Self {
            name: name.into(),
            origins: origins.into_iter().collect(),
            values: BTreeMap::new(),
            last_inserted: None,
            default_value: None,
        }
    }

    /// Value reported before the first update
    pub fn with_default(mut self, value: QuantityValue) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origins(&self) -> &BTreeSet<String> {
        &self.origins
    }

    pub fn update(&mut self, step: u64, value: QuantityValue) {
        self.values.insert(step, value);
        self.last_inserted = Some(step);
    }

    /// Most recently inserted value, or the default if never updated
    pub fn current_value(&self) -> Option<QuantityValue> {
        self.last_inserted
            .and_then(|step| self.values.get(&step).copied())
            .or(self.default_value)
    }

    pub fn value_at(&self, step: u64) -> Option<QuantityValue> {
        self.values.get(&step).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A quantity that keeps the running mean of everything fed into it
///
/// `avg <- avg + (x - avg) / n`, with `n` counting updates; the step key
/// only indexes the recorded series and never enters the mean.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AveragingQuantity {
    inner: LoggedQuantity,
    count: u64,
    mean: f64,
}

impl AveragingQuantity {
    pub fn new(name: impl Into<String>, origins: impl IntoIterator<Item = String>) -> Self {
        Self {
            inner: LoggedQuantity::new(name, origins),
            count: 0,
            mean: 0.0,
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn origins(&self) -> &BTreeSet<String> {
        self.inner.origins()
    }

    pub fn update(&mut self, step: u64, x: f64) {
        self.count += 1;
        self.mean += (x - self.mean) / self.count as f64;
        self.inner.update(step, QuantityValue::Scalar(self.mean));
    }

    /// The running mean, or None before the first update
    pub fn current_value(&self) -> Option<QuantityValue> {
        (self.count > 0).then_some(QuantityValue::Scalar(self.mean))
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Either flavor of quantity, as stored by the aggregator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Quantity {
    Logged(LoggedQuantity),
    Averaging(AveragingQuantity),
}

impl Quantity {
    pub fn name(&self) -> &str {
        match self {
            Quantity::Logged(q) => q.name(),
            Quantity::Averaging(q) => q.name(),
        }
    }

    pub fn origins(&self) -> &BTreeSet<String> {
        match self {
            Quantity::Logged(q) => q.origins(),
            Quantity::Averaging(q) => q.origins(),
        }
    }

    pub fn current_value(&self) -> Option<QuantityValue> {
        match self {
            Quantity::Logged(q) => q.current_value(),
            Quantity::Averaging(q) => q.current_value(),
        }
    }
}
