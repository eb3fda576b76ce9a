//! OutcomeReporter - single consumer of the outcome channel

use chrono::DateTime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use contracts::DispatchOutcome;
use observability::{OutcomeAggregator, OutcomeSummary};

/// Render one outcome as a human-readable line
///
/// `✅ | <time> | <topic> | <LEVEL> | <message>` on success, `❌` otherwise.
/// Decode failures have no level and print `UNKNOWN`.
pub fn render_outcome(outcome: &DispatchOutcome) -> String {
    let marker = if outcome.success { "✅" } else { "❌" };
    let level = outcome.level.map_or("UNKNOWN", |l| l.as_str());
    format!(
        "{marker} | {:.6} | {} | {level} | {}",
        outcome.time, outcome.topic, outcome.message
    )
}

/// RFC 3339 form of an outcome time, if representable
fn iso_time(time: f64) -> Option<String> {
    if !time.is_finite() {
        return None;
    }
    let secs = time.floor();
    let nanos = ((time - secs) * 1e9) as u32;
    DateTime::from_timestamp(secs as i64, nanos).map(|t| t.to_rfc3339())
}

/// Drains outcomes until every sender is gone
pub struct OutcomeReporter {
    rx: mpsc::Receiver<DispatchOutcome>,
    aggregator: OutcomeAggregator,
}

impl OutcomeReporter {
    pub fn new(rx: mpsc::Receiver<DispatchOutcome>) -> Self {
        Self {
            rx,
            aggregator: OutcomeAggregator::new(),
        }
    }

    /// Report every outcome, return the totals once the channel closes
    #[instrument(name = "outcome_reporter_run", skip(self))]
    pub async fn run(mut self) -> OutcomeSummary {
        while let Some(outcome) = self.rx.recv().await {
            self.report(&outcome);
        }

        let summary = self.aggregator.summary();
        info!(
            outcomes = summary.total_outcomes,
            decode_failures = summary.decode_failures,
            "Outcome channel closed"
        );
        summary
    }

    /// Spawn the reporter as a background task
    pub fn spawn(self) -> JoinHandle<OutcomeSummary> {
        tokio::spawn(self.run())
    }

    fn report(&mut self, outcome: &DispatchOutcome) {
        let line = render_outcome(outcome);
        let iso = iso_time(outcome.time).unwrap_or_default();
        if outcome.success {
            info!(topic = %outcome.topic, offset = outcome.offset, time = %iso, "{line}");
        } else {
            warn!(topic = %outcome.topic, offset = outcome.offset, time = %iso, "{line}");
        }
        self.aggregator.update(outcome);
    }
}
