//! Storage-backed statistics sink

use async_trait::async_trait;
use serde_json::json;
use simstore::SimulationStorage;

use super::{StatisticsWriter, WriteError, step_document};
use crate::statistics::Quantity;

/// Writes one JSON document per step under `statistics/` in the run's store
///
/// Re-writing a step replaces the whole document, which is what makes this
/// sink idempotent per step.
pub struct FileWriter {
    storage: SimulationStorage,
}

impl FileWriter {
    pub fn new(storage: SimulationStorage) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl StatisticsWriter for FileWriter {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn write(&mut self, step: u64, quantities: &[Quantity]) -> Result<(), WriteError> {
        let mut doc = step_document(step, quantities);
        doc["flushed_at"] = json!(chrono::Utc::now().to_rfc3339());
        self.storage.write_statistics(step, &doc)?;
        Ok(())
    }
}
