//! In-memory broker
//!
//! Process-local topics for tests and demo runs, with injectable faults:
//! failing topics, slow writes, queued read errors, failing closes, and
//! detection of writes that land after their writer was closed.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use contracts::{QueueError, QueueReader, QueueWriter, RawRecord, SourceConfig, StartOffset};
use tokio::sync::Notify;
use tracing::{debug, instrument};

use crate::client::{QueueClient, Result};

/// Fault injection settings
#[derive(Debug, Default, Clone)]
pub struct FaultConfig {
    /// Fail `connect`
    pub fail_connect: bool,
    /// Topics whose writes fail
    pub fail_writes: HashSet<String>,
    /// Per-topic artificial write latency
    pub write_delay: HashMap<String, Duration>,
    /// Topics whose writer fails to close
    pub fail_close: HashSet<String>,
    /// Topics whose writer fails to open
    pub fail_open: HashSet<String>,
}

#[derive(Default)]
struct TopicLog {
    records: Vec<(Bytes, Bytes)>,
    /// Set by `close_topic`; readers see end of stream once drained
    closed: bool,
}

#[derive(Default)]
struct BrokerState {
    topics: Mutex<HashMap<String, TopicLog>>,
    /// (group, topic) -> last committed offset
    committed: Mutex<HashMap<(String, String), u64>>,
    read_errors: Mutex<VecDeque<QueueError>>,
    faults: Mutex<FaultConfig>,
    notify: Notify,
    connected: AtomicBool,
    writes_after_close: AtomicU64,
    open_writers: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory broker
///
/// Cheap to clone; clones share the same topics.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<BrokerState>,
}

impl MemoryBroker {
    /// Create an empty broker
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a broker with fault injection
    pub fn with_faults(faults: FaultConfig) -> Self {
        let broker = Self::new();
        *lock(&broker.state.faults) = faults;
        broker
    }

    /// Append a message to a topic, returning its offset
    pub fn publish(&self, topic: &str, key: impl Into<Bytes>, value: impl Into<Bytes>) -> u64 {
        let offset = {
            let mut topics = lock(&self.state.topics);
            let log = topics.entry(topic.to_string()).or_default();
            log.records.push((key.into(), value.into()));
            (log.records.len() - 1) as u64
        };
        self.state.notify.notify_waiters();
        offset
    }

    /// Mark a topic as finished: readers get end-of-stream after draining it
    pub fn close_topic(&self, topic: &str) {
        lock(&self.state.topics)
            .entry(topic.to_string())
            .or_default()
            .closed = true;
        self.state.notify.notify_waiters();
    }

    /// All messages written to a topic, in write order
    pub fn messages(&self, topic: &str) -> Vec<(Bytes, Bytes)> {
        lock(&self.state.topics)
            .get(topic)
            .map(|log| log.records.clone())
            .unwrap_or_default()
    }

    /// Last committed offset for a consumer group
    pub fn committed_offset(&self, group_id: &str, topic: &str) -> Option<u64> {
        lock(&self.state.committed)
            .get(&(group_id.to_string(), topic.to_string()))
            .copied()
    }

    /// Queue an error to be returned by the next read of any reader
    pub fn inject_read_error(&self, error: QueueError) {
        lock(&self.state.read_errors).push_back(error);
        self.state.notify.notify_waiters();
    }

    /// Replace the fault configuration at runtime
    pub fn set_faults(&self, faults: FaultConfig) {
        *lock(&self.state.faults) = faults;
    }

    /// Writes that completed on an already closed writer
    pub fn writes_after_close(&self) -> u64 {
        self.state.writes_after_close.load(Ordering::SeqCst)
    }

    /// Writers opened and not closed yet
    pub fn open_writers(&self) -> u64 {
        self.state.open_writers.load(Ordering::SeqCst)
    }

    fn topic_len(&self, topic: &str) -> u64 {
        lock(&self.state.topics)
            .get(topic)
            .map(|log| log.records.len() as u64)
            .unwrap_or(0)
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.state.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(QueueError::connection("not connected"))
        }
    }
}

impl QueueClient for MemoryBroker {
    type Reader = MemoryReader;
    type Writer = MemoryWriter;

    #[instrument(name = "memory_broker_connect", skip(self))]
    async fn connect(&mut self) -> Result<()> {
        if lock(&self.state.faults).fail_connect {
            return Err(QueueError::connection("mock failure"));
        }
        self.state.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    #[instrument(
        name = "memory_broker_reader",
        skip(self, source),
        fields(topic = %source.topic, group_id = %source.group_id)
    )]
    async fn reader(&self, source: &SourceConfig) -> Result<MemoryReader> {
        self.ensure_connected()?;

        let position = match self.committed_offset(&source.group_id, &source.topic) {
            Some(committed) => committed + 1,
            None => match source.start_offset {
                StartOffset::Earliest => 0,
                StartOffset::Latest => self.topic_len(&source.topic),
            },
        };
        debug!(position, "memory reader positioned");

        Ok(MemoryReader {
            topic: source.topic.clone(),
            group_id: source.group_id.clone(),
            position,
            closed: false,
            broker: self.clone(),
        })
    }

    #[instrument(name = "memory_broker_writer", skip(self), fields(topic = %topic))]
    async fn writer(&self, topic: &str) -> Result<MemoryWriter> {
        self.ensure_connected()?;
        if lock(&self.state.faults).fail_open.contains(topic) {
            return Err(QueueError::connection(format!("mock open failure for '{topic}'")));
        }
        self.state.open_writers.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryWriter {
            topic: topic.to_string(),
            closed: AtomicBool::new(false),
            broker: self.clone(),
        })
    }
}

/// Reader over one in-memory topic
pub struct MemoryReader {
    topic: String,
    group_id: String,
    position: u64,
    closed: bool,
    broker: MemoryBroker,
}

impl MemoryReader {
    /// Next offset to be read
    pub fn position(&self) -> u64 {
        self.position
    }

    fn poll_next(&mut self) -> Result<Option<Option<RawRecord>>> {
        if let Some(error) = lock(&self.broker.state.read_errors).pop_front() {
            return Err(error);
        }

        let topics = lock(&self.broker.state.topics);
        let Some(log) = topics.get(&self.topic) else {
            return Ok(None);
        };

        match log.records.get(self.position as usize) {
            Some((key, value)) => {
                let record =
                    RawRecord::new(&self.topic, self.position, key.clone(), value.clone());
                self.position += 1;
                Ok(Some(Some(record)))
            }
            None if log.closed => Ok(Some(None)),
            None => Ok(None),
        }
    }
}

impl QueueReader for MemoryReader {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn read(&mut self) -> Result<Option<RawRecord>> {
        if self.closed {
            return Err(QueueError::closed(&self.topic));
        }

        let state = Arc::clone(&self.broker.state);
        loop {
            let notified = state.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(next) = self.poll_next()? {
                return Ok(next);
            }
            notified.await;
        }
    }

    async fn commit(&mut self, offset: u64) -> Result<()> {
        let key = (self.group_id.clone(), self.topic.clone());
        let mut committed = lock(&self.broker.state.committed);
        let entry = committed.entry(key).or_insert(offset);
        *entry = (*entry).max(offset);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Writer for one in-memory topic
pub struct MemoryWriter {
    topic: String,
    closed: AtomicBool,
    broker: MemoryBroker,
}

impl MemoryWriter {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn record_write_after_close(&self) -> QueueError {
        self.broker
            .state
            .writes_after_close
            .fetch_add(1, Ordering::SeqCst);
        QueueError::closed(&self.topic)
    }
}

impl QueueWriter for MemoryWriter {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn write(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(self.record_write_after_close());
        }

        let (delay, fail) = {
            let faults = lock(&self.broker.state.faults);
            (
                faults.write_delay.get(&self.topic).copied(),
                faults.fail_writes.contains(&self.topic),
            )
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        // The writer may have been closed while this write was in flight
        if self.is_closed() {
            return Err(self.record_write_after_close());
        }
        if fail {
            return Err(QueueError::write(&self.topic, "mock failure"));
        }

        self.broker
            .publish(&self.topic, Bytes::copy_from_slice(key), Bytes::copy_from_slice(value));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.broker.state.open_writers.fetch_sub(1, Ordering::SeqCst);
        }
        if lock(&self.broker.state.faults).fail_close.contains(&self.topic) {
            return Err(QueueError::write(&self.topic, "mock close failure"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(topic: &str, start_offset: StartOffset) -> SourceConfig {
        SourceConfig {
            topic: topic.to_string(),
            start_offset,
            ..Default::default()
        }
    }

    async fn connected() -> MemoryBroker {
        let mut broker = MemoryBroker::new();
        broker.connect().await.unwrap();
        broker
    }

    #[tokio::test]
    async fn test_reader_requires_connection() {
        let broker = MemoryBroker::new();
        let result = broker.reader(&source("logs", StartOffset::Earliest)).await;
        assert!(matches!(result, Err(QueueError::Connection { .. })));
    }

    #[tokio::test]
    async fn test_read_earliest_then_end_of_stream() {
        let broker = connected().await;
        broker.publish("logs", "k1", "v1");
        broker.publish("logs", "k2", "v2");
        broker.close_topic("logs");

        let mut reader = broker
            .reader(&source("logs", StartOffset::Earliest))
            .await
            .unwrap();
        let first = reader.read().await.unwrap().unwrap();
        assert_eq!(first.offset, 0);
        assert_eq!(first.key, Bytes::from("k1"));
        let second = reader.read().await.unwrap().unwrap();
        assert_eq!(second.value, Bytes::from("v2"));
        assert!(reader.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_latest_skips_existing_records() {
        let broker = connected().await;
        broker.publish("logs", "", "old");

        let mut reader = broker
            .reader(&source("logs", StartOffset::Latest))
            .await
            .unwrap();
        assert_eq!(reader.position(), 1);

        broker.publish("logs", "", "new");
        let record = reader.read().await.unwrap().unwrap();
        assert_eq!(record.value, Bytes::from("new"));
    }

    #[tokio::test]
    async fn test_committed_offset_wins_over_policy() {
        let broker = connected().await;
        for i in 0..3 {
            broker.publish("logs", "", format!("v{i}"));
        }

        let mut reader = broker
            .reader(&source("logs", StartOffset::Earliest))
            .await
            .unwrap();
        reader.read().await.unwrap();
        reader.commit(0).await.unwrap();

        let mut resumed = broker
            .reader(&source("logs", StartOffset::Earliest))
            .await
            .unwrap();
        assert_eq!(resumed.position(), 1);
        let record = resumed.read().await.unwrap().unwrap();
        assert_eq!(record.value, Bytes::from("v1"));
    }

    #[tokio::test]
    async fn test_injected_read_error_comes_first() {
        let broker = connected().await;
        broker.publish("logs", "", "v");
        broker.inject_read_error(QueueError::transient("logs", "rebalance"));

        let mut reader = broker
            .reader(&source("logs", StartOffset::Earliest))
            .await
            .unwrap();
        assert!(reader.read().await.unwrap_err().is_transient());
        assert!(reader.read().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_read_waits_for_publish() {
        let broker = connected().await;
        let mut reader = broker
            .reader(&source("logs", StartOffset::Earliest))
            .await
            .unwrap();

        let publisher = broker.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            publisher.publish("logs", "", "late");
        });

        let record = reader.read().await.unwrap().unwrap();
        assert_eq!(record.value, Bytes::from("late"));
    }

    #[tokio::test]
    async fn test_write_after_close_is_detected() {
        let broker = connected().await;
        let writer = broker.writer("database").await.unwrap();
        writer.write(b"k", b"v").await.unwrap();
        writer.close().await.unwrap();

        let result = writer.write(b"k", b"v").await;
        assert!(matches!(result, Err(QueueError::Closed { .. })));
        assert_eq!(broker.writes_after_close(), 1);
        assert_eq!(broker.messages("database").len(), 1);
    }

    #[tokio::test]
    async fn test_failing_topic() {
        let mut faults = FaultConfig::default();
        faults.fail_writes.insert("alert".to_string());
        let mut broker = MemoryBroker::with_faults(faults);
        broker.connect().await.unwrap();

        let alert = broker.writer("alert").await.unwrap();
        let database = broker.writer("database").await.unwrap();
        assert!(alert.write(b"", b"v").await.is_err());
        assert!(database.write(b"", b"v").await.is_ok());
    }

    #[tokio::test]
    async fn test_open_writers_are_tracked() {
        let mut faults = FaultConfig::default();
        faults.fail_open.insert("alert".to_string());
        let mut broker = MemoryBroker::with_faults(faults);
        broker.connect().await.unwrap();

        let database = broker.writer("database").await.unwrap();
        assert!(broker.writer("alert").await.is_err());
        assert_eq!(broker.open_writers(), 1);

        database.close().await.unwrap();
        database.close().await.unwrap();
        assert_eq!(broker.open_writers(), 0);
    }
}
