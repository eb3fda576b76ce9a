//! Dispatcher error types

use contracts::{QueueError, TopicName};
use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Sink writer failed to close during shutdown
    #[error("failed to close writer for sink '{sink}': {source}")]
    WriterClose {
        sink: TopicName,
        #[source]
        source: QueueError,
    },

    /// Outstanding attempts did not finish within the drain timeout
    #[error("{remaining} delivery attempts still in flight after drain timeout, aborted")]
    DrainTimeout { remaining: usize },
}
