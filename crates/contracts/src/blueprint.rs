//! ProcessorBlueprint - Config Loader 输出
//!
//! 描述完整的处理器配置：broker 连接、源 topic、输出 topic、分发并发、重试与关闭策略。

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::TopicName;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的处理器配置蓝图
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ProcessorBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// Broker 连接配置
    #[serde(default)]
    #[validate(nested)]
    pub broker: BrokerConfig,

    /// 源 topic 订阅配置
    #[serde(default)]
    #[validate(nested)]
    pub source: SourceConfig,

    /// 输出 topic 配置
    #[serde(default)]
    #[validate(nested)]
    pub sinks: SinkTopics,

    /// 分发配置
    #[serde(default)]
    #[validate(nested)]
    pub dispatch: DispatchConfig,

    /// 读取重试配置
    #[serde(default)]
    #[validate(nested)]
    pub read_retry: ReadRetryConfig,

    /// 关闭配置
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

/// Broker 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerKind {
    /// 基于 JSON-lines 文件的 topic
    #[default]
    File,
    /// 进程内 broker (测试 / 演示)
    Memory,
}

/// Broker 连接配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BrokerConfig {
    /// Broker 类型
    #[serde(default)]
    pub kind: BrokerKind,

    /// 文件 broker 数据目录
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// 文件 broker 尾随轮询间隔 (毫秒)
    #[serde(default = "default_poll_interval_ms")]
    #[validate(range(min = 1))]
    pub poll_interval_ms: u64,

    /// 到达文件末尾后是否继续等待新数据
    #[serde(default = "default_follow")]
    pub follow: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            kind: BrokerKind::default(),
            data_dir: None,
            poll_interval_ms: default_poll_interval_ms(),
            follow: default_follow(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    200
}

fn default_follow() -> bool {
    true
}

/// 起始 offset 策略
///
/// 仅在消费组没有已提交 offset 时生效；改变它会改变重放语义。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOffset {
    /// 从 topic 最早的消息开始
    #[default]
    Earliest,
    /// 只消费启动之后写入的消息
    Latest,
}

impl std::str::FromStr for StartOffset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "earliest" | "first" => Ok(StartOffset::Earliest),
            "latest" | "last" => Ok(StartOffset::Latest),
            other => Err(format!("unknown start offset '{other}'")),
        }
    }
}

/// 源 topic 订阅配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SourceConfig {
    /// 源 topic
    #[serde(default = "default_source_topic")]
    #[validate(length(min = 1))]
    pub topic: String,

    /// 消费组 ID
    #[serde(default = "default_group_id")]
    #[validate(length(min = 1))]
    pub group_id: String,

    /// 起始 offset 策略
    #[serde(default)]
    pub start_offset: StartOffset,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            topic: default_source_topic(),
            group_id: default_group_id(),
            start_offset: StartOffset::default(),
        }
    }
}

fn default_source_topic() -> String {
    "logs".to_string()
}

fn default_group_id() -> String {
    "log-processor-group".to_string()
}

/// 输出 topic 配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SinkTopics {
    /// 持久化 topic (所有记录)
    #[serde(default = "default_database_topic")]
    #[validate(length(min = 1))]
    pub database_topic: String,

    /// 告警 topic (ERROR / FATAL)
    #[serde(default = "default_alert_topic")]
    #[validate(length(min = 1))]
    pub alert_topic: String,
}

impl Default for SinkTopics {
    fn default() -> Self {
        Self {
            database_topic: default_database_topic(),
            alert_topic: default_alert_topic(),
        }
    }
}

impl SinkTopics {
    /// 逻辑 sink 对应的 broker topic
    pub fn topic_for(&self, sink: TopicName) -> Option<&str> {
        match sink {
            TopicName::Database => Some(&self.database_topic),
            TopicName::Alert => Some(&self.alert_topic),
            TopicName::Unknown => None,
        }
    }
}

fn default_database_topic() -> String {
    "database".to_string()
}

fn default_alert_topic() -> String {
    "alert".to_string()
}

/// 分发配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DispatchConfig {
    /// 同时进行的投递上限 (0 = 不限)
    #[serde(default)]
    pub max_in_flight: usize,

    /// 结果通道容量
    #[serde(default = "default_outcome_buffer")]
    #[validate(range(min = 1))]
    pub outcome_buffer: usize,

    /// 单次投递失败后的额外重试次数
    #[serde(default)]
    #[validate(range(max = 16))]
    pub delivery_retries: u32,

    /// 投递重试间隔 (毫秒)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 0,
            outcome_buffer: default_outcome_buffer(),
            delivery_retries: 0,
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl DispatchConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

fn default_outcome_buffer() -> usize {
    1024
}

fn default_retry_backoff_ms() -> u64 {
    100
}

/// 读取重试配置 (指数退避)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReadRetryConfig {
    /// 初始退避 (毫秒)
    #[serde(default = "default_initial_backoff_ms")]
    #[validate(range(min = 1))]
    pub initial_backoff_ms: u64,

    /// 最大退避 (毫秒)
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// 退避倍率
    #[serde(default = "default_multiplier")]
    #[validate(range(min = 1.0, max = 10.0))]
    pub multiplier: f64,

    /// 连续瞬时错误上限 (0 = 无限重试)
    #[serde(default)]
    pub max_consecutive_errors: u32,
}

impl Default for ReadRetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
            max_consecutive_errors: 0,
        }
    }
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    5000
}

fn default_multiplier() -> f64 {
    2.0
}

/// 关闭配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// 等待在途投递完成的上限 (秒, 0 = 一直等待)
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}

impl ShutdownConfig {
    pub fn drain_timeout(&self) -> Option<Duration> {
        (self.drain_timeout_secs > 0).then(|| Duration::from_secs(self.drain_timeout_secs))
    }
}

fn default_drain_timeout_secs() -> u64 {
    30
}
