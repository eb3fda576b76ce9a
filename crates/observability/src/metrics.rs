//! 处理器指标收集模块
//!
//! 通过 `metrics` facade 记录计数器，并在内存中聚合投递结果用于运行摘要。

use std::collections::BTreeMap;

use contracts::{DispatchOutcome, TopicName};
use metrics::{counter, gauge};

/// 记录从源 topic 读取的记录
pub fn record_record_read(topic: &str) {
    counter!(
        "log_processor_records_read_total",
        "topic" => topic.to_string()
    )
    .increment(1);
}

/// 记录无法解码的记录
pub fn record_decode_failure() {
    counter!("log_processor_decode_failures_total").increment(1);
}

/// 记录一次投递结果
pub fn record_delivery(topic: TopicName, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "log_processor_deliveries_total",
        "topic" => topic.as_str(),
        "status" => status
    )
    .increment(1);
}

/// 记录读取错误
pub fn record_read_error(kind: &'static str) {
    counter!("log_processor_read_errors_total", "kind" => kind).increment(1);
}

/// 记录在途投递数
pub fn record_in_flight(in_flight: usize) {
    gauge!("log_processor_deliveries_in_flight").set(in_flight as f64);
}

/// 单个 topic 的投递统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopicTally {
    pub delivered: u64,
    pub failed: u64,
}

impl TopicTally {
    pub fn total(&self) -> u64 {
        self.delivered + self.failed
    }
}

/// 投递结果聚合器
///
/// 在内存中聚合结果，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct OutcomeAggregator {
    per_topic: BTreeMap<&'static str, TopicTally>,
    decode_failures: u64,
}

impl OutcomeAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, outcome: &DispatchOutcome) {
        if outcome.is_decode_failure() {
            self.decode_failures += 1;
            return;
        }

        let tally = self.per_topic.entry(outcome.topic.as_str()).or_default();
        if outcome.success {
            tally.delivered += 1;
        } else {
            tally.failed += 1;
        }
    }

    /// 生成摘要
    pub fn summary(&self) -> OutcomeSummary {
        let total_outcomes =
            self.per_topic.values().map(TopicTally::total).sum::<u64>() + self.decode_failures;
        let failed = self.per_topic.values().map(|t| t.failed).sum::<u64>() + self.decode_failures;

        OutcomeSummary {
            total_outcomes,
            decode_failures: self.decode_failures,
            failure_rate: if total_outcomes > 0 {
                failed as f64 / total_outcomes as f64 * 100.0
            } else {
                0.0
            },
            per_topic: self.per_topic.clone(),
        }
    }
}

/// 结果摘要
#[derive(Debug, Clone, Default)]
pub struct OutcomeSummary {
    pub total_outcomes: u64,
    pub decode_failures: u64,
    pub failure_rate: f64,
    pub per_topic: BTreeMap<&'static str, TopicTally>,
}

impl OutcomeSummary {
    pub fn topic(&self, topic: TopicName) -> TopicTally {
        self.per_topic
            .get(topic.as_str())
            .copied()
            .unwrap_or_default()
    }
}

impl std::fmt::Display for OutcomeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Outcome Summary ===")?;
        writeln!(f, "Total outcomes: {}", self.total_outcomes)?;
        writeln!(
            f,
            "Failure rate: {:.2}%",
            self.failure_rate
        )?;
        writeln!(f, "Decode failures: {}", self.decode_failures)?;
        for (topic, tally) in &self.per_topic {
            writeln!(
                f,
                "  {}: delivered={} failed={}",
                topic, tally.delivered, tally.failed
            )?;
        }
        Ok(())
    }
}
