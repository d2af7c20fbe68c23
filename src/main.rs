use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use log::{info, warn};
use tracemap::config::{ServiceConfig, ServiceMode};
use tracemap::pricer::{ModifierPricing, Pricer};
use tracemap::reference_data::{ReferenceClient, ReferenceSource, with_retry};
use tracemap::route_handler::{Receiver, RouteCalculator, RouteHandler};
use tracemap::snapshot::{compile_snapshot, load_graph};
use tracemap::transport::{AmqpBroker, connect_with_retry};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServiceConfig::from_env().context("Invalid service configuration")?;

    env_logger::builder()
        .filter_level(config.log_level)
        .format_target(false)
        .target(env_logger::Target::Stderr)
        .init();
    info!("Starting tracemap");
    info!("Log level: {}", config.log_level);

    match config.mode {
        ServiceMode::Serve => serve(config).await,
        ServiceMode::Compile => compile(&config),
        ServiceMode::Inspect => inspect(&config),
    }
}

fn compile(config: &ServiceConfig) -> Result<()> {
    info!("Starting in compile mode");
    let written = compile_snapshot(&config.graph_source, &config.graph_snapshot)
        .with_context(|| format!("Failed to compile {}", config.graph_source.display()))?;
    info!("Snapshot written ({} bytes)", written);
    Ok(())
}

fn inspect(config: &ServiceConfig) -> Result<()> {
    info!("Starting in inspect mode");
    let load_start = Instant::now();
    let graph = load_graph(&config.graph_snapshot)
        .with_context(|| format!("Failed to load {}", config.graph_snapshot.display()))?;

    // Reported on stdout regardless of the log level.
    println!(
        "{}: {} nodes, {} edges, loaded in {:?}",
        config.graph_snapshot.display(),
        graph.node_count(),
        graph.edge_count(),
        load_start.elapsed()
    );
    Ok(())
}

async fn serve(config: ServiceConfig) -> Result<()> {
    info!("Starting in router mode");

    let snapshot = config.graph_snapshot.clone();
    let graph = tokio::task::spawn_blocking(move || load_graph(&snapshot))
        .await
        .context("Graph loading task failed")?
        .with_context(|| format!("Failed to load {}", config.graph_snapshot.display()))?;

    let reference = ReferenceClient::new(
        &config.payment_service_url,
        &config.car_service_url,
        config.http_timeout,
    )?;
    let modifiers = with_retry(
        "price modifier lookup",
        config.reference_attempts,
        config.connect_backoff,
        || reference.price_modifiers(),
    )
    .await
    .context("Could not fetch price modifiers")?;
    info!("Loaded {} price modifiers", modifiers.len());

    let pricer = if config.base_price_per_km > 0.0 {
        Pricer::new(Box::new(ModifierPricing {
            base_price_per_km: config.base_price_per_km,
            regions: config.regions.clone(),
        }))
    } else {
        warn!("BASE_PRICE_PER_KM not set, routes will be free");
        Pricer::default()
    };

    let handler = RouteHandler::new(
        RouteCalculator::new(Arc::new(graph)),
        pricer,
        reference,
        modifiers,
    )
    .with_compute_timeout(config.compute_timeout)
    .with_reference_retry(config.reference_attempts, config.connect_backoff);

    let broker = connect_with_retry(config.connect_attempts, config.connect_backoff, || {
        AmqpBroker::connect(
            &config.broker_url,
            &config.consume_queue,
            &config.consume_exchange,
        )
    })
    .await?;

    let mut receiver = Receiver::new(
        broker,
        handler,
        config.publish_exchange.clone(),
        config.route_message_type.clone(),
    );
    let processed = receiver.run().await?;
    info!("Receiver stopped after {} messages", processed);
    Ok(())
}
