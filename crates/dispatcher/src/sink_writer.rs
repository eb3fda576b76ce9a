//! SinkWriter - one long-lived writer per destination topic

use contracts::{QueueError, QueueWriter, TopicName};
use tracing::{debug, instrument, warn};

use crate::metrics::SinkMetrics;

/// Writer bound to a single sink
///
/// Shared by every concurrent delivery attempt targeting the sink; the
/// underlying `QueueWriter` takes `&self` and must tolerate concurrent writes.
pub struct SinkWriter<W> {
    sink: TopicName,
    writer: W,
    metrics: SinkMetrics,
}

impl<W: QueueWriter + Sync> SinkWriter<W> {
    /// Wrap a connected queue writer
    pub fn new(sink: TopicName, writer: W) -> Self {
        Self {
            sink,
            writer,
            metrics: SinkMetrics::new(),
        }
    }

    /// Logical sink name
    pub fn sink(&self) -> TopicName {
        self.sink
    }

    /// Broker topic written to
    pub fn topic(&self) -> &str {
        self.writer.topic()
    }

    pub fn metrics(&self) -> &SinkMetrics {
        &self.metrics
    }

    /// Deliver one message verbatim
    ///
    /// Transport failures are reported as `false`; nothing is retried here.
    #[instrument(
        name = "sink_writer_deliver",
        skip(self, key, value),
        fields(sink = %self.sink, bytes = value.len())
    )]
    pub async fn deliver(&self, key: &[u8], value: &[u8]) -> bool {
        let _in_flight = self.metrics.start_delivery();

        match self.writer.write(key, value).await {
            Ok(()) => {
                self.metrics.inc_delivered_count();
                true
            }
            Err(e) => {
                self.metrics.inc_failure_count();
                warn!(sink = %self.sink, topic = %self.writer.topic(), error = %e, "Write failed");
                false
            }
        }
    }

    /// Close the underlying writer
    #[instrument(name = "sink_writer_close", skip(self), fields(sink = %self.sink))]
    pub async fn close(&self) -> Result<(), QueueError> {
        let result = self.writer.close().await;
        debug!(sink = %self.sink, ok = result.is_ok(), "SinkWriter closed");
        result
    }
}
