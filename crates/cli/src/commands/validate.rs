//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use config_loader::ConfigLoader;
use contracts::{BrokerKind, ProcessorBlueprint, StartOffset};
use log_processor::CliError;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    broker_kind: String,
    source_topic: String,
    group_id: String,
    database_topic: String,
    alert_topic: String,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    match result.error {
        None => Ok(()),
        Some(error) => Err(CliError::Config(contracts::ContractError::Other(error)))
            .context("Configuration validation failed"),
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match ConfigLoader::load_with_env(&args.config) {
        Ok((blueprint, env_overrides)) => {
            let mut warnings = collect_warnings(&blueprint);
            warnings.extend(
                env_overrides
                    .iter()
                    .map(|name| format!("{name} overrides the file value")),
            );

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    broker_kind: format!("{:?}", blueprint.broker.kind),
                    source_topic: blueprint.source.topic.clone(),
                    group_id: blueprint.source.group_id.clone(),
                    database_topic: blueprint.sinks.database_topic.clone(),
                    alert_topic: blueprint.sinks.alert_topic.clone(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &ProcessorBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.broker.kind == BrokerKind::Memory {
        warnings.push(
            "broker.kind = \"memory\" has no external producers - only useful for testing"
                .to_string(),
        );
    }

    if blueprint.source.start_offset == StartOffset::Latest {
        warnings.push(
            "source.start_offset = \"latest\" skips records written before the first start of this group"
                .to_string(),
        );
    }

    if blueprint.dispatch.max_in_flight == 0 {
        warnings.push("dispatch.max_in_flight is 0 - delivery concurrency is unbounded".to_string());
    }

    if blueprint.shutdown.drain_timeout().is_none() {
        warnings.push(
            "shutdown.drain_timeout_secs is 0 - shutdown waits for every delivery".to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Broker: {}", summary.broker_kind);
            println!("  Source: {} (group {})", summary.source_topic, summary.group_id);
            println!("  Database topic: {}", summary.database_topic);
            println!("  Alert topic: {}", summary.alert_topic);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
