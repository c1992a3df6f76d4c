//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::RouterBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Parameter names never printed verbatim
const SECRET_PARAMS: &[&str] = &["auth_token", "password", "api_key"];

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    dispatch: DispatchInfo,
    ingestion: IngestionInfo,
    routes: Vec<RouteInfo>,
}

#[derive(Serialize)]
struct DispatchInfo {
    delivery_timeout_ms: u64,
}

#[derive(Serialize)]
struct IngestionInfo {
    workers: usize,
    queue_capacity: usize,
}

#[derive(Serialize)]
struct RouteInfo {
    channel: String,
    sender: String,
    kind: String,
    queue_capacity: usize,
    max_in_flight: usize,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&blueprint, args);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(blueprint: &RouterBlueprint, args: &InfoArgs) -> ConfigInfo {
    let routes = ConfigLoader::routes(blueprint)
        .into_iter()
        .filter_map(|route| {
            let sender = blueprint.senders.iter().find(|s| s.name == route.sender)?;
            let params = if args.params {
                sender
                    .params
                    .iter()
                    .map(|(k, v)| (k.clone(), redact(k, v)))
                    .collect()
            } else {
                BTreeMap::new()
            };
            Some(RouteInfo {
                channel: route.channel.to_string(),
                sender: route.sender,
                kind: route.kind.as_str().to_string(),
                queue_capacity: sender.queue_capacity,
                max_in_flight: sender.max_in_flight,
                params,
            })
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        dispatch: DispatchInfo {
            delivery_timeout_ms: blueprint.dispatch.delivery_timeout_ms,
        },
        ingestion: IngestionInfo {
            workers: blueprint.ingestion.workers,
            queue_capacity: blueprint.ingestion.queue_capacity,
        },
        routes,
    }
}

fn redact(key: &str, value: &str) -> String {
    if SECRET_PARAMS.contains(&key) {
        "***".to_string()
    } else {
        value.to_string()
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Notify Router Configuration                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("⚙️  Settings");
    println!("   ├─ Version: {}", info.version);
    println!(
        "   ├─ Delivery timeout: {} ms",
        info.dispatch.delivery_timeout_ms
    );
    println!("   ├─ Workers: {}", info.ingestion.workers);
    println!("   └─ Queue capacity: {}", info.ingestion.queue_capacity);

    println!("\n📤 Routes ({})", info.routes.len());
    for (i, route) in info.routes.iter().enumerate() {
        let is_last = i == info.routes.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!(
            "   {} {} -> {} ({}, queue={}, in_flight={})",
            prefix,
            route.channel,
            route.sender,
            route.kind,
            route.queue_capacity,
            route.max_in_flight
        );
        for (key, value) in &route.params {
            println!("   {}    {} = {}", child_prefix, key, value);
        }
    }

    println!();
}
