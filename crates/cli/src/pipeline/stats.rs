//! Pipeline statistics and metrics.

use std::time::Duration;

use contracts::TopicName;
use dispatcher::MetricsSnapshot as SinkSnapshot;
use ingestion::{LoopExit, MetricsSnapshot as IngestionSnapshot};
use observability::OutcomeSummary;

use crate::error::CliError;

/// Statistics from a pipeline run
#[derive(Debug, Default)]
pub struct PipelineStats {
    /// Why ingestion stopped; `None` if it failed
    pub exit: Option<LoopExit>,

    /// Ingestion loop counters
    pub ingestion: IngestionSnapshot,

    /// Outcomes seen by the reporter
    pub outcomes: OutcomeSummary,

    /// Per-sink writer counters
    pub sinks: Vec<(TopicName, SinkSnapshot)>,

    /// Total duration of the run
    pub duration: Duration,

    /// Problems hit during shutdown (drain timeout, writer close failures)
    pub shutdown_errors: Vec<String>,

    /// What ended the run early: an unrecoverable source error, or the
    /// ingestion task dying
    pub failure: Option<CliError>,
}

impl PipelineStats {
    /// Records read per second
    pub fn records_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.ingestion.records_read as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Total delivery attempts, decode failures excluded
    pub fn delivery_attempts(&self) -> u64 {
        self.outcomes.total_outcomes - self.outcomes.decode_failures
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                  Log Processor Statistics                    ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        match self.exit {
            Some(exit) => println!("   ├─ Stopped: {exit:?}"),
            None => println!("   ├─ Stopped: failed"),
        }
        println!("   ├─ Records read: {}", self.ingestion.records_read);
        println!("   ├─ Records/s: {:.2}", self.records_per_sec());
        println!("   ├─ Decode failures: {}", self.ingestion.decode_failures);
        println!("   ├─ Read errors: {}", self.ingestion.read_errors);
        println!("   └─ Commit failures: {}", self.ingestion.commit_failures);

        println!("\n📤 Deliveries ({})", self.delivery_attempts());
        for (i, sink) in TopicName::SINKS.iter().enumerate() {
            let prefix = if i == TopicName::SINKS.len() - 1 { "└─" } else { "├─" };
            let tally = self.outcomes.topic(*sink);
            println!(
                "   {} {}: delivered={} failed={}",
                prefix, sink, tally.delivered, tally.failed
            );
        }
        println!("   Failure rate: {:.2}%", self.outcomes.failure_rate);

        if !self.shutdown_errors.is_empty() {
            println!("\n⚠️  Shutdown");
            for error in &self.shutdown_errors {
                println!("   ├─ {}", error);
            }
        }

        if let Some(ref error) = self.failure {
            println!("\n❌ {}", error);
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_per_sec() {
        let stats = PipelineStats {
            ingestion: IngestionSnapshot {
                records_read: 50,
                ..Default::default()
            },
            duration: Duration::from_secs(2),
            ..Default::default()
        };
        assert!((stats.records_per_sec() - 25.0).abs() < 1e-10);
        assert_eq!(PipelineStats::default().records_per_sec(), 0.0);
    }
}
