//! Remote HTTP statistics sink

use async_trait::async_trait;

use super::{StatisticsWriter, WriteError, step_document};
use crate::statistics::Quantity;

/// POSTs one JSON document per step to an HTTP endpoint
pub struct HttpWriter {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpWriter {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl StatisticsWriter for HttpWriter {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn write(&mut self, step: u64, quantities: &[Quantity]) -> Result<(), WriteError> {
        let doc = step_document(step, quantities);
        let response = self.client.post(&self.endpoint).json(&doc).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(WriteError::Rejected { status, body });
        }
        Ok(())
    }
}
