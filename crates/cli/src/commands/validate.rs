//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{RouterBlueprint, SenderKind};
use serde::Serialize;
use tracing::info;

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
    sender_count: usize,
    channels: Vec<String>,
    delivery_timeout_ms: u64,
    workers: usize,
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

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            let channels = config_loader::ConfigLoader::routes(&blueprint)
                .into_iter()
                .map(|route| route.channel.to_string())
                .collect();

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
                    sender_count: blueprint.senders.len(),
                    channels,
                    delivery_timeout_ms: blueprint.dispatch.delivery_timeout_ms,
                    workers: blueprint.ingestion.workers,
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
fn collect_warnings(blueprint: &RouterBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    for sender in &blueprint.senders {
        if sender.kind == SenderKind::Log {
            warnings.push(format!(
                "Sender '{}' only logs notifications for channel '{}'",
                sender.name, sender.channel
            ));
        }
        if sender.max_in_flight > sender.queue_capacity {
            warnings.push(format!(
                "Sender '{}' allows more in-flight deliveries ({}) than its queue holds ({})",
                sender.name, sender.max_in_flight, sender.queue_capacity
            ));
        }
    }

    if blueprint.ingestion.workers > blueprint.ingestion.queue_capacity {
        warnings.push("ingestion.workers exceeds ingestion.queue_capacity".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Senders: {}", summary.sender_count);
            println!("  Channels: {}", summary.channels.join(", "));
            println!("  Delivery timeout: {} ms", summary.delivery_timeout_ms);
            println!("  Workers: {}", summary.workers);
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
