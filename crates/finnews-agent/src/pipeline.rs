//! Producer/consumer pipeline.
//!
//! The producer resolves one harvest round sequentially and enqueues items,
//! followed by an end-of-batch marker. The single consumer classifies,
//! analyzes and persists items in FIFO order; each item runs on its own task
//! so a panic in one item is logged and the loop moves on.

use std::sync::Arc;

use anyhow::Result;
use finnews_core::NewsItem;
use news_radar::{DedupRegistry, Ingestor, StructuredEndpoint};
use chrono::Utc;
use signal_calibrator::{Calibrator, FilterVerdict, SignalFactors, SignalFilter};
use signal_engine::{Analyzer, Classifier};
use tokio::sync::mpsc;

use crate::sink::{RawArchive, SignalSink};

/// Queue message between producer and consumer.
#[derive(Debug)]
pub enum Dispatch {
    Item(NewsItem),
    /// All items of one harvest round have been enqueued
    EndOfBatch,
    /// Drain and exit
    Shutdown,
}

/// Terminal state of one item.
#[derive(Debug)]
pub enum ItemOutcome {
    Noise,
    Dropped,
    Persisted(FilterVerdict),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConsumerStats {
    pub processed: usize,
    pub noise: usize,
    pub dropped: usize,
    pub persisted: usize,
    pub tradable: usize,
    pub failed: usize,
    pub batches: usize,
}

impl ConsumerStats {
    fn record(&mut self, outcome: &ItemOutcome) {
        self.processed += 1;
        match outcome {
            ItemOutcome::Noise => self.noise += 1,
            ItemOutcome::Dropped => self.dropped += 1,
            ItemOutcome::Persisted(verdict) => {
                self.persisted += 1;
                if verdict.is_tradable() {
                    self.tradable += 1;
                }
            }
        }
    }
}

/// Radar output to queued items.
pub struct Producer {
    ingestor: Arc<Ingestor>,
    registry: Arc<DedupRegistry>,
    tx: mpsc::Sender<Dispatch>,
}

impl Producer {
    pub fn new(ingestor: Arc<Ingestor>, registry: Arc<DedupRegistry>, tx: mpsc::Sender<Dispatch>) -> Self {
        Self {
            ingestor,
            registry,
            tx,
        }
    }

    /// Resolve every candidate in order, enqueue the items, then mark the batch end.
    /// Returns the number of items enqueued.
    pub async fn feed(&self, candidates: &[String]) -> usize {
        let mut enqueued = 0;
        for candidate in candidates {
            let items = match self.ingestor.resolve(candidate).await {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!("Ingestion failed for {}: {}", candidate, e);
                    continue;
                }
            };

            // live feeds are re-polled every round; only their unseen entries go through
            let structured = StructuredEndpoint::classify(candidate).is_some();
            for item in items {
                if structured && !self.registry.insert(&item.id) {
                    continue;
                }
                if self.tx.send(Dispatch::Item(item)).await.is_err() {
                    tracing::warn!("Consumer gone, abandoning batch");
                    return enqueued;
                }
                enqueued += 1;
            }
        }

        if self.tx.send(Dispatch::EndOfBatch).await.is_err() {
            tracing::warn!("Consumer gone before end of batch");
        }
        enqueued
    }

    pub async fn shutdown(&self) {
        if self.tx.send(Dispatch::Shutdown).await.is_err() {
            tracing::debug!("Consumer already stopped");
        }
    }
}

/// Everything the consumer needs to take one item to a terminal state.
pub struct Stages {
    pub classifier: Classifier,
    pub analyzer: Analyzer,
    pub calibrator: Arc<Calibrator>,
    pub filter: SignalFilter,
    pub sink: SignalSink,
    pub archive: Option<RawArchive>,
}

impl Stages {
    pub async fn process(&self, item: NewsItem) -> Result<ItemOutcome> {
        if let Some(archive) = &self.archive {
            if let Err(e) = archive.store(&item).await {
                tracing::error!("Failed to archive raw item {}: {:#}", item.id, e);
            }
        }

        if !self.classifier.is_relevant(&item).await {
            return Ok(ItemOutcome::Noise);
        }

        tracing::info!("Deep analysis: {}", item.title.chars().take(30).collect::<String>());
        let signal = match self.analyzer.analyze(&item).await {
            Some(signal) => signal,
            None => return Ok(ItemOutcome::Dropped),
        };

        let verdict = self.filter.evaluate(&signal, &self.calibrator);
        let age_hours = (Utc::now() - item.discovered_at).num_milliseconds().max(0) as f64 / 3_600_000.0;
        let factors = SignalFactors::compute(&signal, &self.calibrator, age_hours);
        let expected = factors.calibrated_return;
        let path = self.sink.append(&signal).await?;
        if let Err(e) = self.sink.append_factors(&signal, &factors).await {
            tracing::error!("Failed to write factor row for {}: {:#}", signal.source_id(), e);
        }

        tracing::info!(
            "Signal persisted: score={} certainty={} horizon={} stocks={:?} expected={:.3} verdict={} -> {}",
            signal.score(),
            signal.certainty(),
            signal.time_horizon(),
            signal.related_stocks(),
            expected,
            verdict,
            path.display()
        );

        Ok(ItemOutcome::Persisted(verdict))
    }
}

/// Consume until [`Dispatch::Shutdown`] or the channel closes.
pub async fn run_consumer(stages: Arc<Stages>, mut rx: mpsc::Receiver<Dispatch>) -> ConsumerStats {
    let mut stats = ConsumerStats::default();

    while let Some(message) = rx.recv().await {
        match message {
            Dispatch::Item(item) => {
                let id = item.id.clone();
                let stages = Arc::clone(&stages);
                match tokio::spawn(async move { stages.process(item).await }).await {
                    Ok(Ok(outcome)) => stats.record(&outcome),
                    Ok(Err(e)) => {
                        stats.failed += 1;
                        tracing::error!("Pipeline error for {}: {:#}", id, e);
                    }
                    Err(e) => {
                        stats.failed += 1;
                        tracing::error!("Item task for {} aborted: {}", id, e);
                    }
                }
            }
            Dispatch::EndOfBatch => {
                stats.batches += 1;
                tracing::info!(
                    "Batch drained: {} processed, {} persisted, {} tradable so far",
                    stats.processed,
                    stats.persisted,
                    stats.tradable
                );
            }
            Dispatch::Shutdown => break,
        }
    }

    tracing::info!("Consumer stopped after {} items", stats.processed);
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use llm_gateway::{InferenceGateway, InferenceProvider, InferenceRequest, LlmError, LlmResult};
    use news_radar::{DocumentReader, IngestConfig, IngestError, IngestResult, RetryPolicy, TextFetcher};
    use signal_engine::AnalyzerConfig;
    use std::collections::HashMap;

    const ANALYSIS: &str = r#"<think>一阶影响</think>{"reasoning": "降准释放流动性", "score": 6, "certainty": 9,
        "related_stocks": ["600036"], "time_horizon": "Short"}"#;

    /// Relevance prompts get "是" or "否" depending on the title; analysis prompts
    /// get a fixed answer unless the content asks for a crash.
    struct ScriptedModel;

    #[async_trait]
    impl InferenceProvider for ScriptedModel {
        async fn generate(&self, request: &InferenceRequest) -> LlmResult<String> {
            let p = &request.prompt;
            if p.contains("PANIC") && p.contains("[Role]") {
                panic!("model exploded");
            }
            if p.contains("只回答一个字") {
                return Ok(if p.contains("天气") { "否" } else { "是" }.to_string());
            }
            if p.contains("风控审查员") {
                return Ok("基本可靠".to_string());
            }
            if p.contains("UNPARSEABLE") {
                return Err(LlmError::InvalidResponse("garbage".into()));
            }
            Ok(ANALYSIS.to_string())
        }

        fn backend_name(&self) -> &'static str {
            "scripted"
        }
    }

    struct Pages(HashMap<String, String>);

    #[async_trait]
    impl TextFetcher for Pages {
        async fn fetch_text(&self, url: &str) -> IngestResult<String> {
            self.0.get(url).cloned().ok_or(IngestError::Status(404))
        }
    }

    #[async_trait]
    impl DocumentReader for Pages {
        async fn fetch_markdown(&self, url: &str) -> IngestResult<String> {
            self.fetch_text(url).await
        }
    }

    async fn stages(dir: &std::path::Path) -> Arc<Stages> {
        let gateway = Arc::new(InferenceGateway::new(Arc::new(ScriptedModel), 1, None));
        Arc::new(Stages {
            classifier: Classifier::new(Arc::clone(&gateway), 0.1),
            analyzer: Analyzer::new(gateway, AnalyzerConfig::default()),
            calibrator: Arc::new(Calibrator::new(dir.join("calibration_history.json"))),
            filter: SignalFilter::default(),
            sink: SignalSink::open(dir.join("signals")).await.unwrap(),
            archive: Some(RawArchive::open(dir.join("raw")).await.unwrap()),
        })
    }

    fn ingestor(pages: &[(&str, &str)]) -> Arc<Ingestor> {
        let pages: HashMap<String, String> =
            pages.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        let pages = Arc::new(Pages(pages));
        Arc::new(Ingestor::new(
            pages.clone(),
            pages,
            IngestConfig {
                max_concurrency: 2,
                retry: RetryPolicy::immediate(1),
            },
        ))
    }

    #[tokio::test]
    async fn test_round_trip_through_queue() {
        let dir = tempfile::tempdir().unwrap();
        let kuaixun = StructuredEndpoint::EastmoneyKuaixun.poll_url(chrono::Utc::now());
        let ingestor = ingestor(&[
            ("https://a.example/1", "# 周末天气晴朗\n出游人数创新高"),
            ("https://a.example/2", "# 某公司发布新品\n市场反应积极"),
            (
                kuaixun.as_str(),
                r#"var ajaxResult={"LivesList":[{"url_unique":"u1","simtitle":"央行降准","digest":"d1"}]};"#,
            ),
        ]);

        let (tx, rx) = mpsc::channel(4);
        let producer = Producer::new(ingestor, Arc::new(DedupRegistry::new()), tx);
        let consumer = tokio::spawn(run_consumer(stages(dir.path()).await, rx));

        let candidates = vec![
            "https://a.example/1".to_string(),
            "https://a.example/missing".to_string(),
            "https://a.example/2".to_string(),
            kuaixun.clone(),
        ];
        assert_eq!(producer.feed(&candidates).await, 3);
        // second poll of the live feed yields nothing new
        assert_eq!(producer.feed(&[kuaixun]).await, 0);
        producer.shutdown().await;

        let stats = consumer.await.unwrap();
        assert_eq!(stats.processed, 3);
        assert_eq!(stats.noise, 1);
        assert_eq!(stats.persisted, 2);
        assert_eq!(stats.tradable, 0);
        assert_eq!(stats.batches, 2);

        let short = std::fs::read_to_string(dir.path().join("signals/signals_Short.jsonl")).unwrap();
        assert_eq!(short.lines().count(), 2);
        let factors = std::fs::read_to_string(dir.path().join("signals/factors_Short.jsonl")).unwrap();
        assert_eq!(factors.lines().count(), 2);
        assert_eq!(std::fs::read_dir(dir.path().join("raw")).unwrap().count(), 3);
    }

    #[tokio::test]
    async fn test_panicking_item_does_not_stop_consumer() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::channel(8);
        let consumer = tokio::spawn(run_consumer(stages(dir.path()).await, rx));

        let boom = NewsItem::new("x1", "A股 PANIC", "t").with_body("PANIC");
        let fine = NewsItem::new("x2", "A股 收涨", "t").with_body("正常");
        tx.send(Dispatch::Item(boom)).await.unwrap();
        tx.send(Dispatch::Item(fine)).await.unwrap();
        tx.send(Dispatch::Shutdown).await.unwrap();

        let stats = consumer.await.unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.persisted, 1);
    }

    #[tokio::test]
    async fn test_failed_analysis_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let stages = stages(dir.path()).await;

        let item = NewsItem::new("x", "A股 异动", "t").with_body("UNPARSEABLE");
        assert!(matches!(stages.process(item).await.unwrap(), ItemOutcome::Dropped));
    }
}
