//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{error, info, warn};

use config_loader::ConfigLoader;
use contracts::ProcessorBlueprint;
use log_processor::{CliError, Pipeline, PipelineConfig};

use crate::cli::RunArgs;

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    // Validate config path
    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    // Load and parse configuration
    let (mut blueprint, env_overrides) = ConfigLoader::load_with_env(&args.config)
        .map_err(CliError::from)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    if !env_overrides.is_empty() {
        info!(variables = ?env_overrides, "Configuration overridden from environment");
    }

    // Apply CLI overrides, then validate again
    apply_overrides(&mut blueprint, args);
    ConfigLoader::validate(&blueprint)
        .map_err(CliError::from)
        .context("Configuration invalid after CLI overrides")?;

    info!(
        source = %blueprint.source.topic,
        group_id = %blueprint.source.group_id,
        database_topic = %blueprint.sinks.database_topic,
        alert_topic = %blueprint.sinks.alert_topic,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline_config = PipelineConfig {
        blueprint,
        max_records: (args.max_records > 0).then_some(args.max_records),
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        commit_offsets: !args.no_commit,
    };

    info!("Starting pipeline...");
    let mut stats = Pipeline::new(pipeline_config)
        .run(setup_shutdown_signal())
        .await
        .context("Pipeline failed to start")?;

    stats.print_summary();

    if let Some(e) = stats.failure.take() {
        return Err(e).context("Pipeline stopped before its source was drained");
    }
    if !stats.shutdown_errors.is_empty() {
        warn!(errors = ?stats.shutdown_errors, "Shutdown completed with errors");
    }

    info!("Log processor finished");
    Ok(())
}

fn apply_overrides(blueprint: &mut ProcessorBlueprint, args: &RunArgs) {
    if let Some(ref group_id) = args.group_id {
        info!(group_id = %group_id, "Overriding consumer group from CLI");
        blueprint.source.group_id = group_id.clone();
    }
    if let Some(start_offset) = args.start_offset {
        info!(start_offset = ?start_offset, "Overriding start offset from CLI");
        blueprint.source.start_offset = start_offset;
    }
    if let Some(max_in_flight) = args.max_in_flight {
        info!(max_in_flight, "Overriding max in-flight deliveries from CLI");
        blueprint.dispatch.max_in_flight = max_in_flight;
    }
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &ProcessorBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Broker:");
    println!("  Kind: {:?}", blueprint.broker.kind);
    if let Some(ref data_dir) = blueprint.broker.data_dir {
        println!("  Data dir: {}", data_dir.display());
    }
    println!("\nSource:");
    println!("  Topic: {}", blueprint.source.topic);
    println!("  Group: {}", blueprint.source.group_id);
    println!("  Start offset: {:?}", blueprint.source.start_offset);
    println!("\nSinks:");
    println!("  Database: {}", blueprint.sinks.database_topic);
    println!("  Alert (ERROR/FATAL): {}", blueprint.sinks.alert_topic);
    println!("\nDispatch:");
    match blueprint.dispatch.max_in_flight {
        0 => println!("  Max in flight: unbounded"),
        n => println!("  Max in flight: {}", n),
    }
    println!("  Delivery retries: {}", blueprint.dispatch.delivery_retries);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use contracts::StartOffset;

    use crate::cli::{Cli, Commands};

    fn run_args(argv: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Commands::Run(args) => args,
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_apply_overrides() {
        let args = run_args(&[
            "log-processor",
            "run",
            "--group-id",
            "backfill",
            "--start-offset",
            "latest",
            "--max-in-flight",
            "8",
        ]);
        let mut blueprint = ProcessorBlueprint::default();
        apply_overrides(&mut blueprint, &args);

        assert_eq!(blueprint.source.group_id, "backfill");
        assert_eq!(blueprint.source.start_offset, StartOffset::Latest);
        assert_eq!(blueprint.dispatch.max_in_flight, 8);
    }

    #[test]
    fn test_no_overrides_keeps_config() {
        let args = run_args(&["log-processor", "run"]);
        let mut blueprint = ProcessorBlueprint::default();
        apply_overrides(&mut blueprint, &args);

        assert_eq!(blueprint.source.group_id, "log-processor-group");
        assert_eq!(blueprint.dispatch.max_in_flight, 0);
    }

    #[tokio::test]
    async fn test_missing_config_is_config_error() {
        let args = run_args(&["log-processor", "run", "--config", "/nonexistent/processor.toml"]);
        let err = run_pipeline(&args).await.unwrap_err();
        assert_eq!(log_processor::exit_code_for(&err), 2);
    }
}
