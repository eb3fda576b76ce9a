//! # Log Processor
//!
//! 日志处理器的编排层，供 `log-processor` 二进制和端到端测试共用。
//!
//! 提供：
//! - 管道编排与生命周期管理 (`Pipeline`)
//! - 运行统计 (`PipelineStats`)
//! - 错误类型与退出码 (`CliError`)

pub mod error;
pub mod pipeline;

pub use error::{exit_code_for, CliError};
pub use pipeline::{Pipeline, PipelineConfig, PipelineStats};
