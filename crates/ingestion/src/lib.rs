//! # Ingestion
//!
//! Log record ingestion module.
//!
//! Responsibilities:
//! - Read raw records from the source topic, strictly one at a time
//! - Classify each record by severity (`classify`)
//! - Hand records to a `RecordDispatcher` without waiting for delivery
//! - Retry transient read errors with backoff, commit offsets after hand-off
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{IngestionLoop, ReadBackoff};
//!
//! let reader = client.reader(&blueprint.source).await?;
//! let report = IngestionLoop::new(reader, dispatcher, cancel, ReadBackoff::new(&blueprint.read_retry))
//!     .with_max_records(Some(1000))
//!     .run()
//!     .await?;
//! println!("stopped: {:?}", report.exit);
//! ```

mod classifier;
mod config;
mod error;
mod ingestion_loop;

// Re-exports
pub use classifier::classify;
pub use config::{IngestionMetrics, MetricsSnapshot, ReadBackoff};
pub use error::{IngestionError, Result};
pub use ingestion_loop::{IngestionLoop, IngestionReport, LoopExit};
