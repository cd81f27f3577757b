//! Human-readable console sink

use async_trait::async_trait;
use colored::*;

use super::{StatisticsWriter, WriteError};
use crate::statistics::Quantity;

/// Prints a compact per-step report to stdout
#[derive(Debug, Default)]
pub struct ConsoleWriter;

impl ConsoleWriter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StatisticsWriter for ConsoleWriter {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn write(&mut self, step: u64, quantities: &[Quantity]) -> Result<(), WriteError> {
        println!("{} {}", "step".bold(), step.to_string().cyan());
        for q in quantities {
            let origins: Vec<&str> = q.origins().iter().map(|s| s.as_str()).collect();
            let value = match q.current_value() {
                Some(v) => v.to_string(),
                None => "-".to_string(),
            };
            println!("  {} [{}]: {}", q.name().yellow(), origins.join(" <> ").dimmed(), value);
        }
        Ok(())
    }
}
