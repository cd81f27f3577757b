//! Graphite-style metrics sink
//!
//! Speaks the batched pickle-port convention: each flush is one frame, a
//! big-endian u32 payload length followed by a serialized list of
//! `(path, (timestamp, value))` tuples. Timestamp -1 tells the receiver to
//! use the arrival time.

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use super::{StatisticsWriter, WriteError};
use crate::statistics::Quantity;

/// Receiver-assigned timestamp marker
const ARRIVAL_TIME: i64 = -1;

/// Sends scalar quantities as dotted-path metrics over TCP
pub struct GraphiteWriter {
    job_name: String,
    stream: TcpStream,
}

impl GraphiteWriter {
    /// Connect to a metrics receiver
    pub async fn connect(job_name: impl Into<String>, addr: &str) -> Result<Self, WriteError> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            job_name: job_name.into(),
            stream,
        })
    }
}

/// The tuple list a frame carries
pub(crate) fn tuples(job_name: &str, quantities: &[Quantity]) -> Vec<(String, (i64, f64))> {
    quantities
        .iter()
        .filter_map(|q| {
            let value = q.current_value()?.as_scalar();
            let origins: Vec<&str> = q.origins().iter().map(|s| s.as_str()).collect();
            let metric = q.name().replace(' ', "_");
            let path = format!("{}.{}.{}", job_name, origins.join("_"), metric);
            Some((path, (ARRIVAL_TIME, value)))
        })
        .collect()
}

/// Length-prefix a serialized tuple list
pub(crate) fn encode_frame(tuples: &[(String, (i64, f64))]) -> Result<Vec<u8>, WriteError> {
    let payload = serde_json::to_vec(tuples)?;
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

#[async_trait]
impl StatisticsWriter for GraphiteWriter {
    fn name(&self) -> &'static str {
        "graphite"
    }

    async fn write(&mut self, _step: u64, quantities: &[Quantity]) -> Result<(), WriteError> {
        let tuples = tuples(&self.job_name, quantities);
        if tuples.is_empty() {
            return Ok(());
        }
        let frame = encode_frame(&tuples)?;
        self.stream.write_all(&frame).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::{AveragingQuantity, LoggedQuantity, QuantityValue};

    #[test]
    fn test_tuples_skip_empty_quantities() {
        let empty = Quantity::Averaging(AveragingQuantity::new(
            "acceptance rate",
            ["replica1".to_string()],
        ));
        let mut filled = AveragingQuantity::new("acceptance rate", ["replica1".to_string(), "replica2".to_string()]);
        filled.update(1, 1.0);

        let tuples = tuples("job", &[empty, Quantity::Averaging(filled)]);

        assert_eq!(tuples.len(), 1);
        assert_eq!(tuples[0].0, "job.replica1_replica2.acceptance_rate");
        assert_eq!(tuples[0].1, (ARRIVAL_TIME, 1.0));
    }

    #[test]
    fn test_frame_has_big_endian_length_prefix() {
        let mut q = LoggedQuantity::new("stepsize", ["replica1".to_string()]);
        q.update(1, QuantityValue::Scalar(0.5));
        let tuples = tuples("job", &[Quantity::Logged(q)]);

        let frame = encode_frame(&tuples).unwrap();
        let len = u32::from_be_bytes(frame[..4].try_into().unwrap()) as usize;

        assert_eq!(len, frame.len() - 4);
        let decoded: Vec<(String, (i64, f64))> = serde_json::from_slice(&frame[4..]).unwrap();
        assert_eq!(decoded, tuples);
    }
}
