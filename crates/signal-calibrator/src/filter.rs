use std::fmt;

use finnews_core::SignalAnalysis;

use crate::calibrator::Calibrator;

/// Gate thresholds; every gate must pass.
#[derive(Debug, Clone)]
pub struct FilterThresholds {
    pub min_certainty: i32,
    pub min_abs_score: i32,
    pub min_hit_rate: f64,
}

impl Default for FilterThresholds {
    fn default() -> Self {
        Self {
            min_certainty: 7,
            min_abs_score: 5,
            min_hit_rate: 0.55,
        }
    }
}

/// Outcome of the tradability check; rejections name the first failing gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterVerdict {
    Tradable,
    LowCertainty(i32),
    NearNeutral(i32),
    PoorHitRate(f64),
    NoRelatedStocks,
}

impl FilterVerdict {
    pub fn is_tradable(&self) -> bool {
        matches!(self, FilterVerdict::Tradable)
    }
}

impl fmt::Display for FilterVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterVerdict::Tradable => write!(f, "tradable"),
            FilterVerdict::LowCertainty(c) => write!(f, "certainty {c} too low"),
            FilterVerdict::NearNeutral(s) => write!(f, "score {s} too close to neutral"),
            FilterVerdict::PoorHitRate(r) => write!(f, "historical hit rate {:.0}%", r * 100.0),
            FilterVerdict::NoRelatedStocks => write!(f, "no related stocks"),
        }
    }
}

/// Hard-AND tradability gate, checked in order: certainty, score magnitude,
/// historical hit rate over `[score - 2, score + 2]`, related stocks.
#[derive(Debug, Clone, Default)]
pub struct SignalFilter {
    thresholds: FilterThresholds,
}

impl SignalFilter {
    pub fn new(thresholds: FilterThresholds) -> Self {
        Self { thresholds }
    }

    pub fn evaluate(&self, signal: &SignalAnalysis, calibrator: &Calibrator) -> FilterVerdict {
        let t = &self.thresholds;
        let score = signal.score();

        if signal.certainty() < t.min_certainty {
            return FilterVerdict::LowCertainty(signal.certainty());
        }
        if score.abs() < t.min_abs_score {
            return FilterVerdict::NearNeutral(score);
        }
        let hit_rate = calibrator.hit_rate(score - 2..=score + 2, signal.time_horizon());
        if hit_rate < t.min_hit_rate {
            return FilterVerdict::PoorHitRate(hit_rate);
        }
        if signal.related_stocks().is_empty() {
            return FilterVerdict::NoRelatedStocks;
        }
        FilterVerdict::Tradable
    }

    pub fn is_tradable(&self, signal: &SignalAnalysis, calibrator: &Calibrator) -> bool {
        self.evaluate(signal, calibrator).is_tradable()
    }
}
