//! RawRecord - opaque message as handed out by the queue client

use bytes::Bytes;

/// Raw queue message
///
/// Key and value are forwarded to sinks byte-for-byte; the processor only
/// reads `value` to classify it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Source topic
    pub topic: String,
    /// Position within the source topic
    pub offset: u64,
    pub key: Bytes,
    pub value: Bytes,
}

impl RawRecord {
    pub fn new(
        topic: impl Into<String>,
        offset: u64,
        key: impl Into<Bytes>,
        value: impl Into<Bytes>,
    ) -> Self {
        Self {
            topic: topic.into(),
            offset,
            key: key.into(),
            value: value.into(),
        }
    }
}
