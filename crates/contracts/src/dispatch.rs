//! RecordDispatcher trait - hand-off from ingestion to dispatch
//!
//! Both operations are fire-and-forget: they schedule concurrent work and
//! return immediately. Completion is observable only through outcomes.

use crate::{DecodeError, LogRecord, RawRecord, RoutingDecision};

/// Dispatch entry point used by the ingestion loop
pub trait RecordDispatcher: Send + Sync {
    /// Schedule the delivery attempts for a classified record
    fn dispatch(&self, raw: RawRecord, record: LogRecord, decision: RoutingDecision);

    /// Report a record that could not be classified
    fn report_decode_failure(&self, raw: RawRecord, error: DecodeError);
}
