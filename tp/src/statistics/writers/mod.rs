//! Statistics writer sinks
//!
//! One contract, interchangeable sinks: console, file, remote HTTP and a
//! graphite-style metrics wire. A writer must be idempotent per step
//! (re-writing a step replaces it) and keep its failures to itself — the
//! reporter logs them and the sampling loop never sees them.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use thiserror::Error;

use super::Quantity;

mod console;
mod file;
mod graphite;
mod http;

pub use console::ConsoleWriter;
pub use file::FileWriter;
pub use graphite::GraphiteWriter;
pub use http::HttpWriter;

/// Errors a sink can produce; always recovered locally
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("endpoint rejected payload ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("storage error: {0}")]
    Storage(#[from] simstore::StorageError),

    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Writes one step's worth of quantities to a sink
#[async_trait]
pub trait StatisticsWriter: Send {
    /// Sink name for log messages
    fn name(&self) -> &'static str;

    /// Write `quantities` under `step`; idempotent per step
    async fn write(&mut self, step: u64, quantities: &[Quantity]) -> Result<(), WriteError>;
}

/// The JSON document sent per step by the file and HTTP sinks
///
/// Quantities are grouped by name; per name, current values are listed in
/// origin order with never-updated quantities sanitized to 0.0.
pub(crate) fn step_document(step: u64, quantities: &[Quantity]) -> Value {
    let mut by_name: Map<String, Value> = Map::new();
    for q in quantities {
        let value = match q.current_value() {
            Some(super::QuantityValue::Scalar(v)) => json!(v),
            Some(super::QuantityValue::Pair(a, b)) => json!([a, b]),
            None => json!(0.0),
        };
        let entry = json!({
            "origins": q.origins(),
            "value": value,
        });
        by_name
            .entry(q.name().to_string())
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
            .expect("statistics entries are arrays")
            .push(entry);
    }

    json!({
        "step": step,
        "statistics": by_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::{AveragingQuantity, LoggedQuantity, QuantityValue};

    #[test]
    fn test_step_document_groups_by_name() {
        let mut stepsize = LoggedQuantity::new("stepsize", ["replica1".to_string()]);
        stepsize.update(1, QuantityValue::Scalar(0.5));
        let mut rate = AveragingQuantity::new("acceptance rate", ["replica1".to_string()]);
        rate.update(1, 1.0);

        let doc = step_document(
            7,
            &[Quantity::Logged(stepsize), Quantity::Averaging(rate)],
        );

        assert_eq!(doc["step"], 7);
        assert_eq!(doc["statistics"]["stepsize"][0]["value"], 0.5);
        assert_eq!(doc["statistics"]["acceptance rate"][0]["value"], 1.0);
    }

    #[test]
    fn test_step_document_sanitizes_missing_values() {
        let rate = AveragingQuantity::new("acceptance rate", ["replica1".to_string()]);
        let doc = step_document(1, &[Quantity::Averaging(rate)]);
        assert_eq!(doc["statistics"]["acceptance rate"][0]["value"], 0.0);
    }
}
