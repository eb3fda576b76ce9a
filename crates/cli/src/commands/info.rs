//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use config_loader::ConfigLoader;
use contracts::{ProcessorBlueprint, SeverityTier};
use log_processor::CliError;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    broker: BrokerInfo,
    source: SourceInfo,
    routes: Vec<RouteInfo>,
    dispatch: DispatchInfo,
}

#[derive(Serialize)]
struct BrokerInfo {
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_dir: Option<String>,
    follow: bool,
}

#[derive(Serialize)]
struct SourceInfo {
    topic: String,
    group_id: String,
    start_offset: String,
}

/// Where records of one severity tier end up
#[derive(Serialize)]
struct RouteInfo {
    level: SeverityTier,
    topics: Vec<String>,
}

#[derive(Serialize)]
struct DispatchInfo {
    /// `None` = unbounded
    max_in_flight: Option<usize>,
    outcome_buffer: usize,
    delivery_retries: u32,
    drain_timeout_secs: Option<u64>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let (blueprint, _) = ConfigLoader::load_with_env(&args.config)
        .map_err(CliError::from)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else if args.effective {
        let toml = ConfigLoader::to_toml(&blueprint)
            .map_err(CliError::from)
            .context("Failed to serialize effective configuration")?;
        println!("{}", toml);
    } else {
        print_config_info(&blueprint);
    }

    Ok(())
}

fn routes(blueprint: &ProcessorBlueprint) -> Vec<RouteInfo> {
    SeverityTier::ALL
        .iter()
        .map(|&level| {
            let mut topics = Vec::with_capacity(2);
            if level.is_alert_worthy() {
                topics.push(blueprint.sinks.alert_topic.clone());
            }
            topics.push(blueprint.sinks.database_topic.clone());
            RouteInfo { level, topics }
        })
        .collect()
}

fn build_config_info(blueprint: &ProcessorBlueprint) -> ConfigInfo {
    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        broker: BrokerInfo {
            kind: format!("{:?}", blueprint.broker.kind),
            data_dir: blueprint
                .broker
                .data_dir
                .as_ref()
                .map(|d| d.display().to_string()),
            follow: blueprint.broker.follow,
        },
        source: SourceInfo {
            topic: blueprint.source.topic.clone(),
            group_id: blueprint.source.group_id.clone(),
            start_offset: format!("{:?}", blueprint.source.start_offset),
        },
        routes: routes(blueprint),
        dispatch: DispatchInfo {
            max_in_flight: (blueprint.dispatch.max_in_flight > 0)
                .then_some(blueprint.dispatch.max_in_flight),
            outcome_buffer: blueprint.dispatch.outcome_buffer,
            delivery_retries: blueprint.dispatch.delivery_retries,
            drain_timeout_secs: blueprint.shutdown.drain_timeout().map(|d| d.as_secs()),
        },
    }
}

fn print_config_info(blueprint: &ProcessorBlueprint) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Log Processor Configuration                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    // Broker
    println!("🔌 Broker");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Kind: {:?}", blueprint.broker.kind);
    match &blueprint.broker.data_dir {
        Some(dir) => println!("   ├─ Data dir: {}", dir.display()),
        None => println!("   ├─ Data dir: in-process"),
    }
    println!("   └─ Follow: {}", blueprint.broker.follow);

    // Source
    let source = &blueprint.source;
    println!("\n📥 Source");
    println!("   ├─ Topic: {}", source.topic);
    println!("   ├─ Group: {}", source.group_id);
    println!("   └─ Start offset: {:?} (when the group has no committed offset)", source.start_offset);

    // Routing
    let routes = routes(blueprint);
    println!("\n🔀 Routing");
    for (i, route) in routes.iter().enumerate() {
        let prefix = if i == routes.len() - 1 { "└─" } else { "├─" };
        println!("   {} {:<5} → {}", prefix, route.level.as_str(), route.topics.join(" + "));
    }

    // Dispatch
    let dispatch = &blueprint.dispatch;
    println!("\n⚙️  Dispatch");
    match dispatch.max_in_flight {
        0 => println!("   ├─ Max in flight: unbounded"),
        n => println!("   ├─ Max in flight: {}", n),
    }
    println!("   ├─ Outcome buffer: {}", dispatch.outcome_buffer);
    println!("   ├─ Delivery retries: {}", dispatch.delivery_retries);
    match blueprint.shutdown.drain_timeout() {
        Some(timeout) => println!("   └─ Drain timeout: {}s", timeout.as_secs()),
        None => println!("   └─ Drain timeout: none"),
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_follow_severity() {
        let blueprint = ProcessorBlueprint::default();
        let routes = routes(&blueprint);

        assert_eq!(routes.len(), 5);
        for route in &routes {
            let expected = if route.level >= SeverityTier::Error { 2 } else { 1 };
            assert_eq!(route.topics.len(), expected, "level {}", route.level);
            assert_eq!(route.topics.last().map(String::as_str), Some("database"));
        }
    }

    #[test]
    fn test_config_info_json() {
        let info = build_config_info(&ProcessorBlueprint::default());
        let json = serde_json::to_value(&info).unwrap();

        assert_eq!(json["source"]["group_id"], "log-processor-group");
        assert_eq!(json["routes"][4]["level"], "FATAL");
        assert!(json["dispatch"]["max_in_flight"].is_null());
    }
}
