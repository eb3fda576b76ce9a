//! # Dispatcher
//!
//! 投递分发模块。
//!
//! 负责：
//! - 为每条已分类记录调度独立的投递尝试 (database / alert)
//! - 隔离慢 sink，不阻塞摄取链路
//! - 将每次尝试的结果送入 outcome 通道并输出
//! - 有序关闭：排空在途投递后关闭 writer

pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod reporter;
pub mod sink_writer;

pub use contracts::{DispatchOutcome, RecordDispatcher};
pub use dispatcher::{Dispatcher, RetryPolicy, ShutdownReport};
pub use error::DispatcherError;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use reporter::{render_outcome, OutcomeReporter};
pub use sink_writer::SinkWriter;
