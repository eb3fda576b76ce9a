//! Queue reader/writer traits - message-queue client interface
//!
//! The processor treats the queue client as an opaque reader/writer; concrete
//! brokers live in the `queue_client` crate.

use crate::{QueueError, RawRecord};

/// Source-topic reader
///
/// Reads are strictly sequential: the next position is not established until
/// the previous `read` returns.
#[trait_variant::make(QueueReader: Send)]
pub trait LocalQueueReader {
    /// Topic this reader consumes
    fn topic(&self) -> &str;

    /// Read the next record
    ///
    /// Returns `Ok(None)` when the stream has ended (connection closed in an
    /// orderly way). Must be cancel-safe: dropping the future loses no record.
    async fn read(&mut self) -> Result<Option<RawRecord>, QueueError>;

    /// Mark every record up to and including `offset` as processed
    async fn commit(&mut self, offset: u64) -> Result<(), QueueError>;

    /// Close the connection; subsequent reads return `Closed`
    async fn close(&mut self) -> Result<(), QueueError>;
}

/// Destination-topic writer
///
/// Shared by many concurrent delivery attempts, hence `&self` everywhere.
#[trait_variant::make(QueueWriter: Send)]
pub trait LocalQueueWriter {
    /// Topic this writer produces to
    fn topic(&self) -> &str;

    /// Write one message; key and value are forwarded verbatim
    async fn write(&self, key: &[u8], value: &[u8]) -> Result<(), QueueError>;

    /// Flush and close; writes after close fail with `Closed`
    async fn close(&self) -> Result<(), QueueError>;
}
