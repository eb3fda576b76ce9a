//! Ingestion loop - sequential reads, classification and hand-off

use std::sync::Arc;

use contracts::{QueueError, QueueReader, RawRecord, RecordDispatcher};
use observability::{record_decode_failure, record_read_error, record_record_read};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::classifier::classify;
use crate::config::{IngestionMetrics, MetricsSnapshot, ReadBackoff};
use crate::error::{IngestionError, Result};

/// Why the loop stopped without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The source reported end of stream
    EndOfStream,
    /// Shutdown was requested
    Cancelled,
    /// `max_records` were read
    RecordLimit,
}

/// Result of a finished ingestion run
#[derive(Debug, Clone)]
pub struct IngestionReport {
    pub exit: LoopExit,
    pub metrics: MetricsSnapshot,
    /// Offset of the last record handed to the dispatcher
    pub last_offset: Option<u64>,
}

enum ReadStep {
    Record(RawRecord),
    Exit(LoopExit),
}

/// The only place that reads from the source and advances its offset
pub struct IngestionLoop<R> {
    reader: R,
    dispatcher: Arc<dyn RecordDispatcher>,
    cancel: CancellationToken,
    backoff: ReadBackoff,
    max_records: Option<u64>,
    commit_offsets: bool,
    metrics: Arc<IngestionMetrics>,
}

impl<R: QueueReader> IngestionLoop<R> {
    pub fn new(
        reader: R,
        dispatcher: Arc<dyn RecordDispatcher>,
        cancel: CancellationToken,
        backoff: ReadBackoff,
    ) -> Self {
        Self {
            reader,
            dispatcher,
            cancel,
            backoff,
            max_records: None,
            commit_offsets: true,
            metrics: Arc::new(IngestionMetrics::new()),
        }
    }

    /// Stop after this many records
    pub fn with_max_records(mut self, max_records: Option<u64>) -> Self {
        self.max_records = max_records;
        self
    }

    /// Disable offset commits (records are replayed on the next start)
    pub fn with_commit_offsets(mut self, commit_offsets: bool) -> Self {
        self.commit_offsets = commit_offsets;
        self
    }

    /// Shared metrics, readable while the loop runs
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run until end of stream, cancellation, the record limit or a fatal
    /// read error
    ///
    /// The reader is closed before this returns, whatever the exit reason.
    #[instrument(name = "ingestion_loop_run", skip(self), fields(topic = %self.reader.topic()))]
    pub async fn run(mut self) -> Result<IngestionReport> {
        info!(max_records = ?self.max_records, "Ingestion loop started");

        let result = self.consume().await;

        if let Err(e) = self.reader.close().await {
            warn!(error = %e, "Failed to close source reader");
        }

        let metrics = self.metrics.snapshot();
        match result {
            Ok((exit, last_offset)) => {
                info!(
                    ?exit,
                    records = metrics.records_read,
                    decode_failures = metrics.decode_failures,
                    "Ingestion loop stopped"
                );
                Ok(IngestionReport {
                    exit,
                    metrics,
                    last_offset,
                })
            }
            Err(e) => {
                error!(error = %e, records = metrics.records_read, "Ingestion loop failed");
                Err(e)
            }
        }
    }

    async fn consume(&mut self) -> Result<(LoopExit, Option<u64>)> {
        let mut last_offset = None;

        loop {
            if self
                .max_records
                .is_some_and(|max| self.metrics.snapshot().records_read >= max)
            {
                return Ok((LoopExit::RecordLimit, last_offset));
            }

            let raw = match self.next().await? {
                ReadStep::Record(raw) => raw,
                ReadStep::Exit(exit) => return Ok((exit, last_offset)),
            };

            let offset = raw.offset;
            self.hand_off(raw);
            last_offset = Some(offset);

            if self.commit_offsets {
                if let Err(e) = self.reader.commit(offset).await {
                    self.metrics.record_commit_failure();
                    warn!(offset, error = %e, "Offset commit failed");
                }
            }
        }
    }

    /// Next record, retrying transient read errors with backoff
    async fn next(&mut self) -> Result<ReadStep> {
        loop {
            let read = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(ReadStep::Exit(LoopExit::Cancelled)),
                read = self.reader.read() => read,
            };

            match read {
                Ok(Some(raw)) => {
                    self.backoff.reset();
                    return Ok(ReadStep::Record(raw));
                }
                Ok(None) => return Ok(ReadStep::Exit(LoopExit::EndOfStream)),
                Err(e) => self.on_read_error(e).await?,
            }

            if self.cancel.is_cancelled() {
                return Ok(ReadStep::Exit(LoopExit::Cancelled));
            }
        }
    }

    async fn on_read_error(&mut self, error: QueueError) -> Result<()> {
        self.metrics.record_read_error();
        record_read_error(error.kind());

        let topic = self.reader.topic().to_string();
        if !error.is_transient() {
            return Err(IngestionError::SourceFatal {
                topic,
                source: error,
            });
        }

        let Some(delay) = self.backoff.next_delay() else {
            return Err(IngestionError::RetriesExhausted {
                topic,
                attempts: self.backoff.consecutive_errors(),
                source: error,
            });
        };

        warn!(
            error = %error,
            attempt = self.backoff.consecutive_errors(),
            ?delay,
            "Transient read error, retrying"
        );
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
        Ok(())
    }

    fn hand_off(&self, raw: RawRecord) {
        self.metrics.record_read();
        record_record_read(&raw.topic);

        match classify(&raw.value) {
            Ok((record, decision)) => {
                debug!(offset = raw.offset, level = %record.level, ?decision, "Record classified");
                self.dispatcher.dispatch(raw, record, decision);
            }
            Err(e) => {
                self.metrics.record_decode_failure();
                record_decode_failure();
                self.dispatcher.report_decode_failure(raw, e);
            }
        }
    }
}
