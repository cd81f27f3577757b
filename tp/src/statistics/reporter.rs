//! Reporter actor flushing statistics to the configured writers
//!
//! The coordinator hands snapshots to this actor over a channel and moves
//! on; a slow or failing sink can therefore never stall the sampling loop.
//! Writer failures are logged and swallowed here.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::Quantity;
use super::writers::StatisticsWriter;

/// Commands accepted by the reporter actor
#[derive(Debug)]
pub enum ReportCommand {
    /// Write a snapshot for one step
    Flush { step: u64, quantities: Vec<Quantity> },

    /// Drain and exit
    Shutdown,
}

/// Handle for submitting snapshots to the reporter
#[derive(Clone)]
pub struct ReporterHandle {
    tx: mpsc::Sender<ReportCommand>,
}

impl ReporterHandle {
    /// Submit a snapshot without waiting
    ///
    /// If the reporter is backed up the snapshot is dropped with a warning;
    /// statistics are advisory and must never block sampling.
    pub fn flush(&self, step: u64, quantities: Vec<Quantity>) {
        if let Err(e) = self.tx.try_send(ReportCommand::Flush { step, quantities }) {
            warn!(step, "statistics reporter backed up, dropping snapshot: {e}");
        }
    }

    /// Ask the reporter to finish outstanding flushes and exit
    pub async fn shutdown(&self) {
        let _ = self.tx.send(ReportCommand::Shutdown).await;
    }
}

/// Actor owning the writer sinks
pub struct StatsReporter {
    rx: mpsc::Receiver<ReportCommand>,
    writers: Vec<Box<dyn StatisticsWriter>>,
}

impl StatsReporter {
    /// Create the actor and its handle; spawn [`StatsReporter::run`] on a task
    pub fn new(writers: Vec<Box<dyn StatisticsWriter>>, buffer: usize) -> (Self, ReporterHandle) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { rx, writers }, ReporterHandle { tx })
    }

    pub async fn run(mut self) {
        info!(writers = self.writers.len(), "statistics reporter started");

        while let Some(cmd) = self.rx.recv().await {
            match cmd {
                ReportCommand::Flush { step, quantities } => {
                    debug!(step, quantities = quantities.len(), "flushing statistics");
                    for writer in &mut self.writers {
                        if let Err(e) = writer.write(step, &quantities).await {
                            warn!(step, writer = writer.name(), "statistics write failed: {e}");
                        }
                    }
                }
                ReportCommand::Shutdown => break,
            }
        }

        info!("statistics reporter stopped");
    }
}
