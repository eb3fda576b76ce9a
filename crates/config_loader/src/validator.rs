//! 配置校验模块
//!
//! 校验规则：
//! - 字段级约束 (derive `Validate`)：topic 非空、outcome_buffer > 0、1 <= multiplier <= 10
//! - multiplier 必须是有限数 (NaN 会绕过 range 检查)
//! - 源 / database / alert topic 两两不同
//! - initial_backoff_ms <= max_backoff_ms
//! - file broker 必须配置 data_dir

use std::collections::HashSet;

use contracts::{BrokerKind, ContractError, ProcessorBlueprint};
use validator::Validate;

/// 校验 ProcessorBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &ProcessorBlueprint) -> Result<(), ContractError> {
    validate_fields(blueprint)?;
    validate_topics(blueprint)?;
    validate_read_retry(blueprint)?;
    validate_broker(blueprint)?;
    Ok(())
}

/// 字段级约束
fn validate_fields(blueprint: &ProcessorBlueprint) -> Result<(), ContractError> {
    blueprint.validate().map_err(|errors| {
        let field = errors
            .errors()
            .keys()
            .next()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "blueprint".to_string());
        ContractError::config_validation(field, errors.to_string())
    })
}

/// 校验 topic 两两不同
fn validate_topics(blueprint: &ProcessorBlueprint) -> Result<(), ContractError> {
    let topics = [
        ("source.topic", blueprint.source.topic.as_str()),
        ("sinks.database_topic", blueprint.sinks.database_topic.as_str()),
        ("sinks.alert_topic", blueprint.sinks.alert_topic.as_str()),
    ];

    let mut seen = HashSet::new();
    for (field, topic) in topics {
        if !seen.insert(topic) {
            return Err(ContractError::config_validation(
                field,
                format!("duplicate topic '{topic}'"),
            ));
        }
    }
    Ok(())
}

/// 校验退避范围
fn validate_read_retry(blueprint: &ProcessorBlueprint) -> Result<(), ContractError> {
    let retry = &blueprint.read_retry;
    if !retry.multiplier.is_finite() {
        return Err(ContractError::config_validation(
            "read_retry.multiplier",
            format!("multiplier must be a finite number, got {}", retry.multiplier),
        ));
    }
    if retry.initial_backoff_ms > retry.max_backoff_ms {
        return Err(ContractError::config_validation(
            "read_retry.initial_backoff_ms / read_retry.max_backoff_ms",
            format!(
                "initial_backoff_ms ({}) must be <= max_backoff_ms ({})",
                retry.initial_backoff_ms, retry.max_backoff_ms
            ),
        ));
    }
    Ok(())
}

/// 校验 broker 配置
fn validate_broker(blueprint: &ProcessorBlueprint) -> Result<(), ContractError> {
    if blueprint.broker.kind == BrokerKind::File && blueprint.broker.data_dir.is_none() {
        return Err(ContractError::config_validation(
            "broker.data_dir",
            "data_dir is required for the file broker",
        ));
    }
    Ok(())
}
