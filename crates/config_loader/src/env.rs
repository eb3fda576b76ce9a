//! 环境变量覆盖
//!
//! 部署相关的字段可以用 `LOG_PROCESSOR_*` 环境变量覆盖，
//! 优先级：命令行参数 > 环境变量 > 配置文件。
//! 消费组、起始 offset 与并发上限由命令行层 (clap `env`) 处理，这里不重复。

use std::path::PathBuf;
use std::str::FromStr;

use contracts::{BrokerKind, ContractError, ProcessorBlueprint};

/// 环境变量前缀
pub const ENV_PREFIX: &str = "LOG_PROCESSOR_";

/// 支持的变量 (不含前缀)
pub const ENV_KEYS: [&str; 8] = [
    "BROKER_KIND",
    "DATA_DIR",
    "FOLLOW",
    "SOURCE_TOPIC",
    "DATABASE_TOPIC",
    "ALERT_TOPIC",
    "OUTCOME_BUFFER",
    "DRAIN_TIMEOUT_SECS",
];

/// 把环境变量覆盖到 blueprint 上
///
/// `lookup` 接收完整变量名。返回实际生效的变量名。
pub fn apply_overrides<F>(
    blueprint: &mut ProcessorBlueprint,
    lookup: F,
) -> Result<Vec<String>, ContractError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut applied = Vec::new();
    for key in ENV_KEYS {
        let name = format!("{ENV_PREFIX}{key}");
        let Some(raw) = lookup(&name) else {
            continue;
        };
        let value = raw.trim();

        match key {
            "BROKER_KIND" => blueprint.broker.kind = parse_broker_kind(&name, value)?,
            "DATA_DIR" => blueprint.broker.data_dir = Some(PathBuf::from(value)),
            "FOLLOW" => blueprint.broker.follow = parse_value(&name, value)?,
            "SOURCE_TOPIC" => blueprint.source.topic = value.to_string(),
            "DATABASE_TOPIC" => blueprint.sinks.database_topic = value.to_string(),
            "ALERT_TOPIC" => blueprint.sinks.alert_topic = value.to_string(),
            "OUTCOME_BUFFER" => blueprint.dispatch.outcome_buffer = parse_value(&name, value)?,
            "DRAIN_TIMEOUT_SECS" => {
                blueprint.shutdown.drain_timeout_secs = parse_value(&name, value)?
            }
            _ => continue,
        }
        applied.push(name);
    }
    Ok(applied)
}

fn parse_value<T>(name: &str, value: &str) -> Result<T, ContractError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| ContractError::config_parse(format!("{name}={value:?}: {e}")))
}

fn parse_broker_kind(name: &str, value: &str) -> Result<BrokerKind, ContractError> {
    match value.to_ascii_lowercase().as_str() {
        "file" => Ok(BrokerKind::File),
        "memory" => Ok(BrokerKind::Memory),
        other => Err(ContractError::config_parse(format!(
            "{name}={other:?}: expected \"file\" or \"memory\""
        ))),
    }
}
