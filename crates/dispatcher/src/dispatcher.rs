//! Dispatcher - concurrent fan-out of classified records to sink writers

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

use contracts::{
    DecodeError, DispatchConfig, DispatchOutcome, LogRecord, QueueWriter, RawRecord,
    RecordDispatcher, RoutingDecision, SeverityTier, TopicName,
};
use observability::{record_delivery, record_in_flight};

use crate::error::DispatcherError;
use crate::metrics::MetricsSnapshot;
use crate::sink_writer::SinkWriter;

/// Per-attempt retry settings
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryPolicy {
    /// Extra write tries after the first failure
    pub retries: u32,
    pub backoff: Duration,
}

impl From<&DispatchConfig> for RetryPolicy {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            retries: config.delivery_retries,
            backoff: config.retry_backoff(),
        }
    }
}

/// Result of [`Dispatcher::shutdown`]
#[derive(Debug, Default)]
pub struct ShutdownReport {
    pub errors: Vec<DispatcherError>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Everything a delivery attempt needs, detached from the source record
#[derive(Debug, Clone)]
struct Attempt {
    key: Bytes,
    value: Bytes,
    time: f64,
    level: SeverityTier,
    message: String,
    offset: u64,
}

impl Attempt {
    fn new(raw: RawRecord, record: LogRecord) -> Self {
        Self {
            key: raw.key,
            value: raw.value,
            time: record.timestamp,
            level: record.level,
            message: record.message,
            offset: raw.offset,
        }
    }

    fn into_outcome(self, topic: TopicName, success: bool) -> DispatchOutcome {
        DispatchOutcome {
            time: self.time,
            topic,
            success,
            level: Some(self.level),
            message: self.message,
            offset: self.offset,
        }
    }
}

/// Dispatcher owning both sink writers
///
/// Every delivery attempt runs as its own tracked task; attempts never wait
/// on each other, so a slow sink cannot hold back the other one or the
/// ingestion loop.
pub struct Dispatcher<W> {
    database: Arc<SinkWriter<W>>,
    alert: Arc<SinkWriter<W>>,
    /// Taken at shutdown so the reporter sees the channel close
    outcome_tx: Mutex<Option<mpsc::Sender<DispatchOutcome>>>,
    tracker: TaskTracker,
    /// `None` = unbounded
    permits: Option<Arc<Semaphore>>,
    /// Cancels attempts still running when the drain timeout elapses
    abort: CancellationToken,
    retry: RetryPolicy,
}

impl<W: QueueWriter + Sync + 'static> Dispatcher<W> {
    /// Create a dispatcher and the receiving end of its outcome channel
    pub fn new(
        database: SinkWriter<W>,
        alert: SinkWriter<W>,
        config: &DispatchConfig,
    ) -> (Self, mpsc::Receiver<DispatchOutcome>) {
        debug_assert_eq!(database.sink(), TopicName::Database);
        debug_assert_eq!(alert.sink(), TopicName::Alert);

        let (outcome_tx, outcome_rx) = mpsc::channel(config.outcome_buffer.max(1));
        let permits = (config.max_in_flight > 0)
            .then(|| Arc::new(Semaphore::new(config.max_in_flight)));

        let dispatcher = Self {
            database: Arc::new(database),
            alert: Arc::new(alert),
            outcome_tx: Mutex::new(Some(outcome_tx)),
            tracker: TaskTracker::new(),
            permits,
            abort: CancellationToken::new(),
            retry: RetryPolicy::from(config),
        };
        (dispatcher, outcome_rx)
    }

    /// Attempts (and pending decode-failure reports) not yet finished
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Get metrics for both sinks
    pub fn metrics(&self) -> Vec<(TopicName, MetricsSnapshot)> {
        [&self.database, &self.alert]
            .into_iter()
            .map(|w| (w.sink(), w.metrics().snapshot()))
            .collect()
    }

    /// Wait for all outstanding attempts
    ///
    /// New dispatches are refused from here on. With a timeout, attempts
    /// still running when it elapses are aborted; each still reports a
    /// failed outcome before this returns.
    #[instrument(name = "dispatcher_drain", skip(self))]
    pub async fn drain(&self, timeout: Option<Duration>) -> Result<(), DispatcherError> {
        self.tracker.close();
        info!(pending = self.tracker.len(), "Draining in-flight deliveries");

        let Some(timeout) = timeout else {
            self.tracker.wait().await;
            return Ok(());
        };

        if tokio::time::timeout(timeout, self.tracker.wait()).await.is_ok() {
            return Ok(());
        }

        let remaining = self.tracker.len();
        warn!(remaining, ?timeout, "Drain timeout elapsed, aborting remaining deliveries");
        self.abort.cancel();
        self.tracker.wait().await;
        Err(DispatcherError::DrainTimeout { remaining })
    }

    /// Close both writers; a failure on one does not skip the other
    #[instrument(name = "dispatcher_close_writers", skip(self))]
    pub async fn close_writers(&self) -> Vec<DispatcherError> {
        let (database, alert) = tokio::join!(self.database.close(), self.alert.close());

        [(TopicName::Database, database), (TopicName::Alert, alert)]
            .into_iter()
            .filter_map(|(sink, result)| {
                result.err().map(|source| {
                    error!(sink = %sink, error = %source, "Writer close failed");
                    DispatcherError::WriterClose { sink, source }
                })
            })
            .collect()
    }

    /// Drop the dispatcher's own outcome sender
    ///
    /// Once every attempt has finished the channel closes and the reporter
    /// returns.
    pub fn close_outcomes(&self) {
        self.outcome_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Drain, close writers, then close the outcome channel
    #[instrument(name = "dispatcher_shutdown", skip(self))]
    pub async fn shutdown(&self, drain_timeout: Option<Duration>) -> ShutdownReport {
        let mut errors = Vec::new();
        if let Err(e) = self.drain(drain_timeout).await {
            errors.push(e);
        }
        errors.extend(self.close_writers().await);
        self.close_outcomes();

        info!(errors = errors.len(), "Dispatcher shutdown complete");
        ShutdownReport { errors }
    }

    fn outcome_sender(&self) -> Option<mpsc::Sender<DispatchOutcome>> {
        if self.tracker.is_closed() {
            return None;
        }
        self.outcome_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn writer(&self, sink: TopicName) -> &Arc<SinkWriter<W>> {
        match sink {
            TopicName::Alert => &self.alert,
            _ => &self.database,
        }
    }

    fn spawn_attempt(&self, sink: TopicName, attempt: Attempt) {
        let Some(outcome_tx) = self.outcome_sender() else {
            error!(sink = %sink, offset = attempt.offset, "Dispatch after shutdown, record not delivered");
            return;
        };

        let writer = Arc::clone(self.writer(sink));
        let permits = self.permits.clone();
        let abort = self.abort.clone();
        let retry = self.retry;

        self.tracker.spawn(async move {
            // The permit lives until the outcome is pushed
            let (success, _permit) = tokio::select! {
                biased;
                _ = abort.cancelled() => {
                    warn!(sink = %sink, offset = attempt.offset, "Delivery aborted at shutdown");
                    (false, None)
                }
                result = async {
                    let permit = acquire(permits).await;
                    (deliver_with_retry(&writer, &attempt, retry).await, permit)
                } => result,
            };

            record_delivery(sink, success);
            if outcome_tx.send(attempt.into_outcome(sink, success)).await.is_err() {
                error!(sink = %sink, "Outcome channel closed, outcome lost");
            }
        });
    }
}

impl<W: QueueWriter + Sync + 'static> RecordDispatcher for Dispatcher<W> {
    fn dispatch(&self, raw: RawRecord, record: LogRecord, decision: RoutingDecision) {
        let attempt = Attempt::new(raw, record);
        debug!(offset = attempt.offset, level = %attempt.level, ?decision, "Dispatching record");

        if decision == RoutingDecision::AlertAndDatabase {
            self.spawn_attempt(TopicName::Alert, attempt.clone());
        }
        self.spawn_attempt(TopicName::Database, attempt);

        record_in_flight(self.tracker.len());
    }

    fn report_decode_failure(&self, raw: RawRecord, error: DecodeError) {
        warn!(topic = %raw.topic, offset = raw.offset, error = %error, "Undecodable record");

        let Some(outcome_tx) = self.outcome_sender() else {
            error!(offset = raw.offset, "Decode failure after shutdown, outcome not reported");
            return;
        };

        let outcome = DispatchOutcome {
            time: wall_clock_secs(),
            topic: TopicName::Unknown,
            success: false,
            level: None,
            message: error.to_string(),
            offset: raw.offset,
        };
        self.tracker.spawn(async move {
            if outcome_tx.send(outcome).await.is_err() {
                error!("Outcome channel closed, decode failure lost");
            }
        });
    }
}

async fn acquire(permits: Option<Arc<Semaphore>>) -> Option<OwnedSemaphorePermit> {
    match permits {
        // The semaphore is never closed
        Some(semaphore) => semaphore.acquire_owned().await.ok(),
        None => None,
    }
}

async fn deliver_with_retry<W: QueueWriter + Sync>(
    writer: &SinkWriter<W>,
    attempt: &Attempt,
    retry: RetryPolicy,
) -> bool {
    let mut remaining = retry.retries;
    loop {
        if writer.deliver(&attempt.key, &attempt.value).await {
            return true;
        }
        if remaining == 0 {
            return false;
        }
        remaining -= 1;
        debug!(sink = %writer.sink(), offset = attempt.offset, remaining, "Retrying delivery");
        tokio::time::sleep(retry.backoff).await;
    }
}

fn wall_clock_secs() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
