//! Queue client abstraction
//!
//! Defines the broker-facing trait, supporting concrete brokers and mock testing.

use std::future::Future;

use contracts::{QueueError, QueueReader, QueueWriter, SourceConfig};

/// Result alias
pub type Result<T> = std::result::Result<T, QueueError>;

/// Queue client trait
///
/// Abstracts broker operations so the processor never depends on a concrete
/// transport. Readers are owned by the ingestion loop; writers are shared by
/// every concurrent delivery attempt.
pub trait QueueClient: Send + Sync {
    /// Source-topic reader type
    type Reader: QueueReader + 'static;

    /// Sink-topic writer type
    type Writer: QueueWriter + Sync + 'static;

    /// Establish the broker connection
    fn connect(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Subscribe to the source topic
    ///
    /// The start position is the group's committed offset + 1 when one exists,
    /// otherwise `source.start_offset` decides.
    fn reader(&self, source: &SourceConfig) -> impl Future<Output = Result<Self::Reader>> + Send;

    /// Open a writer for a destination topic
    fn writer(&self, topic: &str) -> impl Future<Output = Result<Self::Writer>> + Send;
}
