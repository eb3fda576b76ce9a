//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the log processor.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Log records carry their producer timestamp (seconds since epoch, f64)
//! - Queue offsets are per-topic, monotonically increasing `u64`

mod blueprint;
mod dispatch;
mod error;
mod log_record;
mod outcome;
mod queue;
mod raw_record;

pub use blueprint::*;
pub use dispatch::RecordDispatcher;
pub use error::*;
pub use log_record::*;
pub use outcome::*;
pub use queue::*;
pub use raw_record::RawRecord;
