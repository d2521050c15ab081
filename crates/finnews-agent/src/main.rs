use std::sync::Arc;

use anyhow::{Context, Result};
use llm_gateway::InferenceGateway;
use news_radar::{sources, DedupRegistry, HttpFetcher, Ingestor, JinaReader, Radar};
use signal_calibrator::{Calibrator, SignalFilter};
use signal_engine::{Analyzer, Classifier};
use tokio::signal::unix::SignalKind;
use tokio::sync::mpsc;
use tokio::time;

mod config;
mod pipeline;
mod sink;

use config::PipelineConfig;
use pipeline::{run_consumer, Producer, Stages};
use sink::{RawArchive, SignalSink};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter()).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter()).init();
    }

    std::panic::set_hook(Box::new(|info| {
        tracing::error!("PANIC: {info}");
    }));

    tracing::info!("Starting financial news signal pipeline");

    // 2. Configuration
    let config = PipelineConfig::from_env().context("loading configuration")?;
    tracing::info!("  Provider: {:?} ({} permits)", config.gateway.provider, config.gateway.permits());
    tracing::info!(
        "  Thermal gate: limit {}°C, resume {}°C",
        config.gateway.thermal.limit_c,
        config.gateway.thermal.effective_resume()
    );
    tracing::info!("  Harvest interval: {}s", config.harvest_interval.as_secs());
    tracing::info!("  Data dir: {}", config.data_dir.display());

    // 3. Inference
    let gateway = Arc::new(InferenceGateway::from_config(&config.gateway)?);
    tracing::info!("Inference gateway ready ({})", gateway.backend_name());

    // 4. Discovery + ingestion
    let registry = Arc::new(DedupRegistry::new());
    let fetcher = Arc::new(HttpFetcher::new(config.fetch_timeout));
    let radar = Radar::new(fetcher.clone(), sources::default_sources(), Arc::clone(&registry));
    let reader = Arc::new(JinaReader::new(config.jina_reader_base.clone(), config.fetch_timeout));
    let ingestor = Arc::new(Ingestor::new(fetcher, reader, config.ingest_config()));
    tracing::info!("Radar watching {} sources", radar.source_count());

    // 5. Analysis + persistence
    let calibrator = match Calibrator::load(config.calibration_path()) {
        Ok(calibrator) => calibrator,
        Err(e) => {
            tracing::error!("Failed to load calibration history, starting empty: {}", e);
            Calibrator::new(config.calibration_path())
        }
    };
    let archive = if config.archive_raw {
        Some(RawArchive::open(config.raw_dir()).await?)
    } else {
        None
    };
    let stages = Arc::new(Stages {
        classifier: Classifier::new(Arc::clone(&gateway), config.temp_fast),
        analyzer: Analyzer::new(Arc::clone(&gateway), config.analyzer_config()),
        calibrator: Arc::new(calibrator),
        filter: SignalFilter::default(),
        sink: SignalSink::open(config.signal_dir()).await?,
        archive,
    });

    let (tx, rx) = mpsc::channel(config.queue_capacity);
    let producer = Producer::new(ingestor, registry, tx);
    let consumer = tokio::spawn(run_consumer(stages, rx));

    // 6. Harvest loop with graceful shutdown (SIGINT + SIGTERM)
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;
    let shutdown = async {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
    };
    tokio::pin!(shutdown);

    loop {
        tracing::info!("Scanning sources");
        let candidates = radar.harvest().await;
        if candidates.is_empty() {
            tracing::info!("No new candidates, standing by");
        } else {
            let enqueued = producer.feed(&candidates).await;
            tracing::info!("Fed {} items from {} candidates", enqueued, candidates.len());
        }

        tokio::select! {
            _ = time::sleep(config.harvest_interval) => {}
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received, draining queue...");
                break;
            }
        }
    }

    producer.shutdown().await;
    match consumer.await {
        Ok(stats) => tracing::info!(
            "Pipeline stopped after {} batches: {} processed, {} noise, {} dropped, {} persisted, {} tradable, {} failed",
            stats.batches,
            stats.processed,
            stats.noise,
            stats.dropped,
            stats.persisted,
            stats.tradable,
            stats.failed
        ),
        Err(e) => tracing::error!("Consumer task failed: {}", e),
    }

    Ok(())
}
