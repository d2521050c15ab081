use finnews_core::SignalAnalysis;
use serde::Serialize;

use crate::calibrator::Calibrator;
use crate::decay::apply_time_decay;

const POLICY_TERMS: &[&str] = &["政策", "监管", "policy", "regulat"];
const EARNINGS_TERMS: &[&str] = &["业绩", "财报", "earnings"];
const RISK_TERMS: &[&str] = &["风险", "不确定", "risk", "uncertain"];
const STRONG_POSITIVE_TERMS: &[&str] = &["重大利好", "显著", "暴涨"];
const STRONG_NEGATIVE_TERMS: &[&str] = &["重大利空", "暴跌", "危机"];
const DEPTH_MARKERS: &[&str] = &["一阶", "二阶"];

/// Quantities read off a signal's reasoning text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextFeatures {
    pub mentions_policy: bool,
    pub mentions_earnings: bool,
    pub mentions_risk: bool,
    pub strong_positive: usize,
    pub strong_negative: usize,
    /// Characters, not bytes
    pub reasoning_length: usize,
    /// First/second-order reasoning markers
    pub reasoning_depth: usize,
    pub num_stocks: usize,
}

pub fn extract_text_features(signal: &SignalAnalysis) -> TextFeatures {
    let reasoning = signal.reasoning().to_lowercase();
    let mentions = |terms: &[&str]| terms.iter().any(|t| reasoning.contains(t));
    let count = |terms: &[&str]| -> usize { terms.iter().map(|t| reasoning.matches(t).count()).sum() };

    TextFeatures {
        mentions_policy: mentions(POLICY_TERMS),
        mentions_earnings: mentions(EARNINGS_TERMS),
        mentions_risk: mentions(RISK_TERMS),
        strong_positive: count(STRONG_POSITIVE_TERMS),
        strong_negative: count(STRONG_NEGATIVE_TERMS),
        reasoning_length: reasoning.chars().count(),
        reasoning_depth: count(DEPTH_MARKERS),
        num_stocks: signal.related_stocks().len(),
    }
}

/// Flat factor record for backtests. The agent writes one per persisted signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalFactors {
    pub llm_score: i32,
    pub llm_certainty: i32,
    pub calibrated_return: f64,
    pub historical_hit_rate: f64,
    #[serde(flatten)]
    pub text: TextFeatures,
    pub decay_adjusted_score: f64,
}

impl SignalFactors {
    pub fn compute(signal: &SignalAnalysis, calibrator: &Calibrator, hours_since: f64) -> Self {
        let score = signal.score();
        Self {
            llm_score: score,
            llm_certainty: signal.certainty(),
            calibrated_return: calibrator.calibrated_score(signal),
            historical_hit_rate: calibrator.hit_rate(score - 2..=score + 2, signal.time_horizon()),
            text: extract_text_features(signal),
            decay_adjusted_score: apply_time_decay(signal, hours_since),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finnews_core::TimeHorizon;

    #[test]
    fn test_text_features() {
        let signal = SignalAnalysis::new(
            "id",
            "一阶：政策重大利好，业绩显著改善；二阶：供应链受益，但估值风险仍在",
            8,
            7,
            TimeHorizon::Medium,
        )
        .with_related_stocks(["600519", "000858"]);

        let f = extract_text_features(&signal);
        assert!(f.mentions_policy);
        assert!(f.mentions_earnings);
        assert!(f.mentions_risk);
        assert_eq!(f.strong_positive, 2);
        assert_eq!(f.strong_negative, 0);
        assert_eq!(f.reasoning_depth, 2);
        assert_eq!(f.num_stocks, 2);
        assert_eq!(f.reasoning_length, signal.reasoning().chars().count());
    }

    #[test]
    fn test_factors_without_history() {
        let dir = tempfile::tempdir().unwrap();
        let calibrator = Calibrator::new(dir.path().join("h.json"));
        let signal = SignalAnalysis::new("id", "plain", -6, 8, TimeHorizon::Short);

        let factors = SignalFactors::compute(&signal, &calibrator, 12.0);
        assert_eq!(factors.llm_score, -6);
        assert_eq!(factors.calibrated_return, -0.6);
        assert_eq!(factors.historical_hit_rate, 0.5);
        assert!((factors.decay_adjusted_score + 3.0).abs() < 1e-9);

        let row = serde_json::to_value(&factors).unwrap();
        assert_eq!(row["num_stocks"], 0);
        assert_eq!(row["llm_certainty"], 8);
    }
}
