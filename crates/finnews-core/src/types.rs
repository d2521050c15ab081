use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SCORE_MIN: i32 = -10;
pub const SCORE_MAX: i32 = 10;
pub const CERTAINTY_MIN: i32 = 0;
pub const CERTAINTY_MAX: i32 = 10;

/// A normalized news entry produced by the ingestor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    /// Source URL or synthetic handle; the uniqueness key
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    /// Where the item came from (feed host, API name, ...)
    pub source: String,
    pub discovered_at: DateTime<Utc>,
}

impl NewsItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            body: None,
            source: source.into(),
            discovered_at: Utc::now(),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        let body = body.into();
        self.body = if body.is_empty() { None } else { Some(body) };
        self
    }

    /// Body text, or the title when the source carried no body.
    pub fn content(&self) -> &str {
        self.body.as_deref().unwrap_or(&self.title)
    }
}

/// Time scale over which a signal is expected to play out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeHorizon {
    Short,
    Medium,
    Long,
}

const SHORT_MARKERS: &[&str] = &[
    "day", "hour", "short", "intraday", "短期", "短线", "日内", "小时", "天内", "几天", "数天",
];
const LONG_MARKERS: &[&str] = &[
    "year", "month", "long", "长期", "长线", "一年", "数年", "多年", "个月",
];

impl TimeHorizon {
    pub const ALL: [TimeHorizon; 3] = [TimeHorizon::Short, TimeHorizon::Medium, TimeHorizon::Long];

    /// Normalize free-form horizon text.
    ///
    /// Short markers win over Long; week/medium wording and anything
    /// unrecognized land on Medium.
    pub fn from_text(text: &str) -> Self {
        let lower = text.to_lowercase();
        let has = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

        if has(SHORT_MARKERS) {
            TimeHorizon::Short
        } else if has(LONG_MARKERS) {
            TimeHorizon::Long
        } else {
            TimeHorizon::Medium
        }
    }

    /// Normalize a loosely typed JSON value; non-strings fall back to Medium.
    pub fn from_value(value: Option<&serde_json::Value>) -> Self {
        match value.and_then(|v| v.as_str()) {
            Some(text) => Self::from_text(text),
            None => TimeHorizon::Medium,
        }
    }

    /// Half-life in hours used for score decay.
    pub fn half_life_hours(&self) -> f64 {
        match self {
            TimeHorizon::Short => 12.0,
            TimeHorizon::Medium => 72.0,
            TimeHorizon::Long => 720.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TimeHorizon::Short => "Short",
            TimeHorizon::Medium => "Medium",
            TimeHorizon::Long => "Long",
        }
    }
}

impl fmt::Display for TimeHorizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Judged trading signal for one news item.
///
/// `score` is always within [-10, 10] and `certainty` within [0, 10]; every
/// constructor clamps, including deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredSignal")]
pub struct SignalAnalysis {
    reasoning: String,
    score: i32,
    certainty: i32,
    confidence_range: Option<(i32, i32)>,
    related_stocks: BTreeSet<String>,
    time_horizon: TimeHorizon,
    source_id: String,
}

impl SignalAnalysis {
    pub fn new(
        source_id: impl Into<String>,
        reasoning: impl Into<String>,
        score: i64,
        certainty: i64,
        time_horizon: TimeHorizon,
    ) -> Self {
        Self {
            reasoning: reasoning.into(),
            score: clamp_score(score),
            certainty: clamp_certainty(certainty),
            confidence_range: None,
            related_stocks: BTreeSet::new(),
            time_horizon,
            source_id: source_id.into(),
        }
    }

    /// Tickers are trimmed, uppercased and deduplicated; blanks are dropped.
    pub fn with_related_stocks<I, S>(mut self, stocks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.related_stocks = stocks
            .into_iter()
            .map(|s| s.as_ref().trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    /// Bounds are clamped to the score range and reordered so `low <= high`.
    pub fn with_confidence_range(mut self, low: i64, high: i64) -> Self {
        let (a, b) = (clamp_score(low), clamp_score(high));
        self.confidence_range = Some((a.min(b), a.max(b)));
        self
    }

    /// A copy of this record carrying a revised certainty.
    pub fn with_certainty(&self, certainty: i64) -> Self {
        Self {
            certainty: clamp_certainty(certainty),
            ..self.clone()
        }
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn certainty(&self) -> i32 {
        self.certainty
    }

    pub fn confidence_range(&self) -> Option<(i32, i32)> {
        self.confidence_range
    }

    pub fn related_stocks(&self) -> &BTreeSet<String> {
        &self.related_stocks
    }

    pub fn time_horizon(&self) -> TimeHorizon {
        self.time_horizon
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }
}

/// On-disk shape of a signal; routed through the clamping constructors.
#[derive(Deserialize)]
struct StoredSignal {
    reasoning: String,
    score: i64,
    certainty: i64,
    #[serde(default)]
    confidence_range: Option<(i64, i64)>,
    #[serde(default)]
    related_stocks: Vec<String>,
    time_horizon: TimeHorizon,
    source_id: String,
}

impl From<StoredSignal> for SignalAnalysis {
    fn from(s: StoredSignal) -> Self {
        let signal = SignalAnalysis::new(s.source_id, s.reasoning, s.score, s.certainty, s.time_horizon)
            .with_related_stocks(s.related_stocks);
        match s.confidence_range {
            Some((low, high)) => signal.with_confidence_range(low, high),
            None => signal,
        }
    }
}

pub fn clamp_score(score: i64) -> i32 {
    score.clamp(SCORE_MIN as i64, SCORE_MAX as i64) as i32
}

pub fn clamp_certainty(certainty: i64) -> i32 {
    certainty.clamp(CERTAINTY_MIN as i64, CERTAINTY_MAX as i64) as i32
}

/// One (prediction, realized outcome) pair in the calibration history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub score: i32,
    pub certainty: i32,
    /// `score * certainty / 100`
    pub predicted: f64,
    #[serde(alias = "actual")]
    pub actual_return: f64,
    pub horizon: TimeHorizon,
    #[serde(alias = "days")]
    pub holding_days: u32,
    #[serde(default = "Utc::now", deserialize_with = "lenient_timestamp")]
    pub recorded_at: DateTime<Utc>,
}

/// Accepts RFC 3339, a naive `YYYY-MM-DD HH:MM:SS[.f]` stamp (taken as UTC),
/// or anything else (empty string, null) as "now".
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    Ok(Utc::now())
}

impl CalibrationRecord {
    pub fn from_outcome(signal: &SignalAnalysis, actual_return: f64, holding_days: u32) -> Self {
        Self {
            score: signal.score(),
            certainty: signal.certainty(),
            predicted: signal.score() as f64 * signal.certainty() as f64 / 100.0,
            actual_return,
            horizon: signal.time_horizon(),
            holding_days,
            recorded_at: Utc::now(),
        }
    }

    /// Direction of the prediction matched the realized return.
    pub fn is_hit(&self) -> bool {
        (self.score > 0 && self.actual_return > 0.0) || (self.score < 0 && self.actual_return < 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizon_precedence() {
        assert_eq!(TimeHorizon::from_text("1-3 days"), TimeHorizon::Short);
        assert_eq!(TimeHorizon::from_text("Intraday"), TimeHorizon::Short);
        assert_eq!(TimeHorizon::from_text("6 months"), TimeHorizon::Long);
        assert_eq!(TimeHorizon::from_text("LONG"), TimeHorizon::Long);
        assert_eq!(TimeHorizon::from_text("two weeks"), TimeHorizon::Medium);
        assert_eq!(TimeHorizon::from_text("Medium"), TimeHorizon::Medium);
        assert_eq!(TimeHorizon::from_text("whenever"), TimeHorizon::Medium);
        // Short beats Long when both appear
        assert_eq!(TimeHorizon::from_text("short to long term"), TimeHorizon::Short);
        // Long beats Medium
        assert_eq!(TimeHorizon::from_text("weeks to months"), TimeHorizon::Long);
        assert_eq!(TimeHorizon::from_text("短期"), TimeHorizon::Short);
        assert_eq!(TimeHorizon::from_text("三个月"), TimeHorizon::Long);
        assert_eq!(TimeHorizon::from_text("长线布局"), TimeHorizon::Long);
    }

    #[test]
    fn test_horizon_ignores_incidental_characters() {
        // "growth" and "today" carry 长 / 天 but say nothing about horizon
        assert_eq!(TimeHorizon::from_text("业绩增长"), TimeHorizon::Medium);
        assert_eq!(TimeHorizon::from_text("今天公布"), TimeHorizon::Medium);
        assert_eq!(TimeHorizon::from_text("今年以来"), TimeHorizon::Medium);
        assert_eq!(TimeHorizon::from_text("三天内"), TimeHorizon::Short);
    }

    #[test]
    fn test_record_timestamp_is_lenient() {
        let record = |stamp: &str| {
            serde_json::from_str::<CalibrationRecord>(&format!(
                r#"{{"score": 7, "certainty": 8, "predicted": 0.56, "actual": 0.03,
                    "horizon": "Short", "days": 2, "recorded_at": {stamp}}}"#
            ))
            .unwrap()
        };

        let before = Utc::now();
        assert!(record(r#""""#).recorded_at >= before);
        assert!(record("null").recorded_at >= before);
        assert_eq!(
            record(r#""2025-01-02T03:04:05Z""#).recorded_at.to_rfc3339(),
            "2025-01-02T03:04:05+00:00"
        );
        assert_eq!(
            record(r#""2025-01-02 03:04:05.250000""#).recorded_at.timestamp_millis() % 1000,
            250
        );
    }

    #[test]
    fn test_horizon_from_non_string() {
        assert_eq!(TimeHorizon::from_value(Some(&serde_json::json!(3))), TimeHorizon::Medium);
        assert_eq!(TimeHorizon::from_value(None), TimeHorizon::Medium);
        assert_eq!(
            TimeHorizon::from_value(Some(&serde_json::json!("hours"))),
            TimeHorizon::Short
        );
    }

    #[test]
    fn test_signal_clamps() {
        let s = SignalAnalysis::new("u", "r", 42, -3, TimeHorizon::Short)
            .with_confidence_range(9, -20)
            .with_related_stocks(["sh.600519", " SZ.000001 ", "sh.600519", ""]);
        assert_eq!(s.score(), 10);
        assert_eq!(s.certainty(), 0);
        assert_eq!(s.confidence_range(), Some((-10, 9)));
        assert_eq!(s.related_stocks().len(), 2);
        assert!(s.related_stocks().contains("SH.600519"));
    }

    #[test]
    fn test_deserialize_clamps() {
        let json = r#"{"reasoning":"x","score":-15,"certainty":12,"related_stocks":["aapl"],
            "time_horizon":"Long","source_id":"s","confidence_range":[3,1]}"#;
        let s: SignalAnalysis = serde_json::from_str(json).unwrap();
        assert_eq!(s.score(), -10);
        assert_eq!(s.certainty(), 10);
        assert_eq!(s.confidence_range(), Some((1, 3)));
        assert!(s.related_stocks().contains("AAPL"));
    }

    #[test]
    fn test_with_certainty_leaves_receiver_untouched() {
        let s = SignalAnalysis::new("u", "r", 6, 8, TimeHorizon::Medium);
        let revised = s.with_certainty(5);
        assert_eq!(s.certainty(), 8);
        assert_eq!(revised.certainty(), 5);
        assert_eq!(revised.score(), 6);
    }

    #[test]
    fn test_calibration_record_legacy_fields() {
        let json = r#"{"score":6,"certainty":8,"predicted":0.48,"actual":0.02,"horizon":"Short","days":3}"#;
        let r: CalibrationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(r.actual_return, 0.02);
        assert_eq!(r.holding_days, 3);
        assert!(r.is_hit());
    }
}
