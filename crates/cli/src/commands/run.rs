//! `run` command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use contracts::{MessageSource, RouterBlueprint};
use dispatcher::create_dispatcher;
use ingestion::{IngestionConfig, IngestionPipeline, LineSource, MetricsSnapshot};
use observability::{AggregatingAuditSink, TracingAuditSink};
use tracing::{info, warn};

use crate::cli::RunArgs;

/// Execute the `run` command
pub async fn run_router(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    apply_overrides(&mut blueprint, args)?;

    info!(
        senders = blueprint.senders.len(),
        workers = blueprint.ingestion.workers,
        delivery_timeout_ms = blueprint.dispatch.delivery_timeout_ms,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    let audit = AggregatingAuditSink::new(Arc::new(TracingAuditSink));
    let dispatcher = create_dispatcher(&blueprint)
        .await
        .context("Failed to build sender registry")?
        .with_audit_sink(audit.clone());
    let dispatcher = Arc::new(dispatcher);

    let pipeline = Arc::new(IngestionPipeline::new(
        Arc::clone(&dispatcher),
        IngestionConfig::from(&blueprint.ingestion),
    ));

    info!(input = %args.input, "Starting router...");

    let snapshot = if args.input == "-" {
        drive(&pipeline, LineSource::stdin()).await
    } else {
        let source = LineSource::open(&args.input)
            .await
            .with_context(|| format!("Failed to open input {}", args.input))?;
        drive(&pipeline, source).await
    };

    drop(pipeline);
    let per_sender = dispatcher.metrics();
    match Arc::try_unwrap(dispatcher) {
        Ok(dispatcher) => dispatcher.shutdown().await,
        Err(_) => warn!("Dispatcher still shared, skipping sender shutdown"),
    }

    let snapshot = snapshot.context("Router execution failed")?;
    info!(
        received = snapshot.received,
        dispatched = snapshot.dispatched,
        rejected = snapshot.rejected(),
        "Router finished"
    );

    println!("\n{}", audit.summary());
    print_sender_metrics(&per_sender);

    Ok(())
}

async fn drive<S>(pipeline: &Arc<IngestionPipeline>, source: S) -> Result<MetricsSnapshot>
where
    S: MessageSource,
{
    pipeline
        .run_until(source, shutdown_signal())
        .await
        .map_err(anyhow::Error::from)
}

fn apply_overrides(blueprint: &mut RouterBlueprint, args: &RunArgs) -> Result<()> {
    if let Some(workers) = args.workers {
        if workers == 0 {
            anyhow::bail!("--workers must be greater than 0");
        }
        info!(workers, "Overriding ingestion workers from CLI");
        blueprint.ingestion.workers = workers;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        if timeout_ms == 0 {
            anyhow::bail!("--timeout-ms must be greater than 0");
        }
        info!(timeout_ms, "Overriding delivery timeout from CLI");
        blueprint.dispatch.delivery_timeout_ms = timeout_ms;
    }
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed never resolves.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
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
    warn!("Received shutdown signal, draining queued payloads...");
}

fn print_sender_metrics(metrics: &[(String, dispatcher::MetricsSnapshot)]) {
    if metrics.is_empty() {
        return;
    }
    println!("=== Sender Metrics ===");
    for (name, m) in metrics {
        println!(
            "{}: delivered={}, failed={}, timeouts={}, dropped={}",
            name, m.delivered_count, m.failure_count, m.timeout_count, m.dropped_count
        );
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &RouterBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Dispatch:");
    println!("  Delivery timeout: {} ms", blueprint.dispatch.delivery_timeout_ms);
    println!("Ingestion:");
    println!("  Workers: {}", blueprint.ingestion.workers);
    println!("  Queue capacity: {}", blueprint.ingestion.queue_capacity);

    println!("\nRoutes ({}):", blueprint.senders.len());
    for route in config_loader::ConfigLoader::routes(blueprint) {
        println!("  - {} -> {} ({})", route.channel, route.sender, route.kind.as_str());
    }

    println!();
}
