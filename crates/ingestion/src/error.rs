//! Ingestion 错误类型

use contracts::QueueError;
use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 源 topic 不可恢复的读取错误
    #[error("unrecoverable read error on topic '{topic}': {source}")]
    SourceFatal {
        /// 源 topic
        topic: String,
        #[source]
        source: QueueError,
    },

    /// 连续瞬时错误次数超过上限
    #[error("giving up on topic '{topic}' after {attempts} consecutive read errors: {source}")]
    RetriesExhausted {
        /// 源 topic
        topic: String,
        /// 连续失败次数
        attempts: u32,
        #[source]
        source: QueueError,
    },
}

impl IngestionError {
    /// 底层队列错误
    pub fn queue_error(&self) -> &QueueError {
        match self {
            Self::SourceFatal { source, .. } | Self::RetriesExhausted { source, .. } => source,
        }
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
