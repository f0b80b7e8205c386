//! Claim Fraud Scorer - Main Entry Point
//!
//! Consumes claims from NATS, scores them and publishes the results. Claims
//! are scored concurrently up to the configured number of workers.

use anyhow::{Context, Result};
use claim_fraud_scorer::{
    config::{AppConfig, LoggingConfig},
    consumer::ClaimConsumer,
    metrics::{MetricsReporter, ScoringMetrics},
    models::ArtifactStore,
    producer::ScoreProducer,
    Orchestrator,
};
use futures::StreamExt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("claim_fraud_scorer={}", logging.level).parse()?);

    if logging.format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config.logging)?;

    info!("Starting Claim Fraud Scorer");
    let config_path = AppConfig::path();
    if Path::new(&config_path).exists() {
        info!(path = %config_path, "Configuration loaded");
    } else {
        warn!(path = %config_path, "Configuration file not found, using defaults");
    }

    let bundle = ArtifactStore::new(&config.artifacts, config.scoring.unknown_category_sentinel).load();
    let orchestrator = Arc::new(Orchestrator::new(bundle, &config.scoring, &config.anomaly));
    info!(mode = ?orchestrator.mode(), "Scoring engine ready");

    let metrics = Arc::new(ScoringMetrics::new());

    let client = async_nats::connect(&config.nats.url)
        .await
        .with_context(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
    info!(url = %config.nats.url, "Connected to NATS");

    let consumer = ClaimConsumer::new(client.clone(), &config.nats.claim_subject);
    let producer = Arc::new(ScoreProducer::new(client.clone(), &config.nats.result_subject));

    let num_workers = config.pipeline.workers.max(1);
    info!(
        workers = num_workers,
        claims = %consumer.subject(),
        results = %producer.subject(),
        "Starting claim processing loop"
    );

    let semaphore = Arc::new(Semaphore::new(num_workers));
    let processed_count = Arc::new(AtomicU64::new(0));

    let reporter = MetricsReporter::new(metrics.clone(), config.pipeline.metrics_interval_secs);
    tokio::spawn(reporter.start());

    let mut subscription = consumer.subscribe().await?;

    while let Some(message) = subscription.next().await {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .context("Worker semaphore closed")?;

        let orchestrator = orchestrator.clone();
        let producer = producer.clone();
        let metrics = metrics.clone();
        let processed_count = processed_count.clone();

        tokio::spawn(async move {
            let start_time = Instant::now();

            let claim = match ClaimConsumer::decode(&message.payload) {
                Ok(claim) => claim,
                Err(e) => {
                    warn!(error = %format!("{:#}", e), "Dropping malformed claim payload");
                    metrics.record_rejected();
                    return;
                }
            };

            // Inference is CPU-bound
            let result = match tokio::task::spawn_blocking(move || orchestrator.score(&claim)).await {
                Ok(result) => result,
                Err(e) => {
                    error!(error = %e, "Scoring task failed");
                    return;
                }
            };

            let processing_time = start_time.elapsed();
            metrics.record(&result, processing_time);

            if let Some(reply_to) = message.reply.clone() {
                if let Err(e) = producer.reply(reply_to, &result).await {
                    error!(claim_id = %result.claim_id, error = %e, "Failed to send reply");
                }
            }
            if let Err(e) = producer.publish(&result).await {
                error!(claim_id = %result.claim_id, error = %e, "Failed to publish score result");
            }

            debug!(
                claim_id = %result.claim_id,
                probability = result.probability,
                status = result.status.label(),
                method = result.explanation_method.label(),
                processing_time_us = processing_time.as_micros(),
                "Claim processed"
            );

            let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
            if count % 100 == 0 {
                info!(
                    processed = count,
                    throughput = format!("{:.1} claims/s", metrics.throughput()),
                    avg_latency_us = metrics.processing_stats().mean_us,
                    "Processing milestone"
                );
            }

            drop(permit);
        });
    }

    info!("Scorer shutting down...");
    metrics.print_summary();

    Ok(())
}
