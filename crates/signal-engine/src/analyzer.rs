use std::collections::BTreeSet;
use std::sync::Arc;

use finnews_core::{parse_signal, NewsItem, SignalAnalysis};
use llm_gateway::InferenceGateway;

use crate::prompts::{analysis_prompt, critique_prompt};

/// Critique phrasing that marks a serious flaw in the analysis.
const SEVERITY_KEYWORDS: &[&str] = &[
    "严重", "错误", "忽略", "遗漏", "漏洞", "severe", "serious", "error", "overlooked", "flaw",
];
const SEVERE_MULTIPLIER: f64 = 0.7;
const MILD_MULTIPLIER: f64 = 0.95;

const REVIEW_MIN_ABS_SCORE: i32 = 5;
const REVIEW_MIN_CERTAINTY: i32 = 6;

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// One ensemble sample per temperature, all issued at once
    pub ensemble_temperatures: [f32; 3],
    pub critique_temperature: f32,
    pub analysis_max_tokens: u32,
    pub critique_max_tokens: u32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            ensemble_temperatures: [0.1, 0.5, 0.7],
            critique_temperature: 0.6,
            analysis_max_tokens: 4096,
            critique_max_tokens: 1024,
        }
    }
}

/// Slow-path deep analysis: ensemble consensus, then adversarial review.
pub struct Analyzer {
    gateway: Arc<InferenceGateway>,
    config: AnalyzerConfig,
}

impl Analyzer {
    pub fn new(gateway: Arc<InferenceGateway>, config: AnalyzerConfig) -> Self {
        Self { gateway, config }
    }

    pub async fn analyze(&self, item: &NewsItem) -> Option<SignalAnalysis> {
        let prompt = analysis_prompt(item.content());
        let [low, mid, high] = self.config.ensemble_temperatures;
        let max_tokens = self.config.analysis_max_tokens;

        let (a, b, c) = tokio::join!(
            self.gateway.infer(&prompt, low, max_tokens),
            self.gateway.infer(&prompt, mid, max_tokens),
            self.gateway.infer(&prompt, high, max_tokens),
        );

        let samples: Vec<SignalAnalysis> = [a, b, c]
            .iter()
            .filter_map(|raw| match parse_signal(raw, &item.id) {
                Ok(signal) => Some(signal),
                Err(e) => {
                    tracing::warn!("Dropping ensemble sample for {}: {}", item.id, e);
                    None
                }
            })
            .collect();

        let sample_count = samples.len();
        let ensemble = match consensus(samples) {
            Some(signal) => signal,
            None => {
                tracing::warn!("No usable analysis for {}", item.id);
                return None;
            }
        };
        tracing::debug!(
            "Ensemble for {}: {} samples, score={} certainty={}",
            item.id,
            sample_count,
            ensemble.score(),
            ensemble.certainty()
        );

        if !needs_adversarial_review(&ensemble) {
            return Some(ensemble);
        }

        let critique = self
            .gateway
            .infer(
                &critique_prompt(item.content(), &ensemble),
                self.config.critique_temperature,
                self.config.critique_max_tokens,
            )
            .await;
        let revised = revise_with_critique(&ensemble, &critique);
        if revised.certainty() != ensemble.certainty() {
            tracing::info!(
                "Adversarial review lowered certainty {} -> {} for {}",
                ensemble.certainty(),
                revised.certainty(),
                item.id
            );
        }
        Some(revised)
    }
}

/// Reduce ensemble samples to one signal.
///
/// No samples gives `None` and a single sample passes through untouched. With
/// more, score and certainty are medians, the longest reasoning wins, stocks are
/// unioned, the horizon is the first sample's, and reported confidence ranges
/// are widened to cover every sample.
pub fn consensus(mut samples: Vec<SignalAnalysis>) -> Option<SignalAnalysis> {
    if samples.len() <= 1 {
        return samples.pop();
    }

    let first = &samples[0];
    let score = median(samples.iter().map(SignalAnalysis::score).collect());
    let certainty = median(samples.iter().map(SignalAnalysis::certainty).collect());
    let reasoning = samples
        .iter()
        .map(SignalAnalysis::reasoning)
        .fold("", |best, r| if r.chars().count() > best.chars().count() { r } else { best });
    let stocks: BTreeSet<String> = samples
        .iter()
        .flat_map(|s| s.related_stocks().iter().cloned())
        .collect();

    let ranges: Vec<(i32, i32)> = samples.iter().filter_map(SignalAnalysis::confidence_range).collect();
    let widened = ranges
        .iter()
        .copied()
        .reduce(|(lo, hi), (l, h)| (lo.min(l), hi.max(h)));

    let signal = SignalAnalysis::new(
        first.source_id(),
        reasoning,
        score,
        certainty,
        first.time_horizon(),
    )
    .with_related_stocks(stocks);

    Some(match widened.or_else(|| first.confidence_range()) {
        Some((low, high)) => signal.with_confidence_range(low.into(), high.into()),
        None => signal,
    })
}

/// Middle value; the two middle values are averaged and rounded for even counts.
fn median(mut values: Vec<i32>) -> i64 {
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid].into()
    } else {
        ((f64::from(values[mid - 1]) + f64::from(values[mid])) / 2.0).round() as i64
    }
}

/// Strong, confident signals are worth the cost of a critique.
pub fn needs_adversarial_review(signal: &SignalAnalysis) -> bool {
    signal.score().abs() >= REVIEW_MIN_ABS_SCORE && signal.certainty() >= REVIEW_MIN_CERTAINTY
}

/// Certainty multiplier implied by a critique.
pub fn critique_multiplier(critique: &str) -> f64 {
    let text = critique.to_lowercase();
    if SEVERITY_KEYWORDS.iter().any(|k| text.contains(k)) {
        SEVERE_MULTIPLIER
    } else {
        MILD_MULTIPLIER
    }
}

/// New signal with certainty scaled (truncated) by the critique's multiplier.
/// An empty critique means the review never happened and changes nothing.
pub fn revise_with_critique(signal: &SignalAnalysis, critique: &str) -> SignalAnalysis {
    if critique.trim().is_empty() {
        return signal.clone();
    }
    let scaled = (f64::from(signal.certainty()) * critique_multiplier(critique)).trunc() as i64;
    signal.with_certainty(scaled)
}
