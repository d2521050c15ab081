//! Strict parsing of loosely typed model output into [`SignalAnalysis`].
//!
//! Models answer with free-form reasoning (often a `<think>` block) followed by
//! a JSON object whose numbers may arrive as floats or strings. Fields are
//! coerced explicitly (float -> rounded int, numeric string -> int) before the
//! range clamps in [`SignalAnalysis::new`] apply.

use std::borrow::Cow;

use serde_json::{Map, Value};

use crate::error::{ParseResult, SignalParseError};
use crate::types::{SignalAnalysis, TimeHorizon};

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// Remove every closed `<think>...</think>` span.
pub fn strip_think_block(text: &str) -> Cow<'_, str> {
    if !text.contains(THINK_OPEN) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(THINK_OPEN) {
        let after_open = &rest[start + THINK_OPEN.len()..];
        match after_open.find(THINK_CLOSE) {
            Some(end) => {
                out.push_str(&rest[..start]);
                rest = &after_open[end + THINK_CLOSE.len()..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// The span from the first `{` to the last `}`, if any.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Parse one deep-analysis response.
pub fn parse_signal(raw: &str, source_id: &str) -> ParseResult<SignalAnalysis> {
    let text = strip_think_block(raw);
    let json = extract_json_object(&text).ok_or(SignalParseError::NoJsonObject)?;
    let value: Value = serde_json::from_str(json)?;
    let obj = value.as_object().ok_or(SignalParseError::NotAnObject)?;

    let reasoning = match obj.get("reasoning") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => return Err(invalid("reasoning", other)),
        None => return Err(SignalParseError::MissingField("reasoning")),
    };
    let score = required_int(obj, "score")?;
    let certainty = required_int(obj, "certainty")?;
    let stocks = tickers(obj.get("related_stocks"))?;
    let horizon = TimeHorizon::from_value(obj.get("time_horizon"));

    let signal = SignalAnalysis::new(source_id, reasoning, score, certainty, horizon)
        .with_related_stocks(stocks);

    match obj.get("confidence_range") {
        None | Some(Value::Null) => Ok(signal),
        Some(range) => {
            let (low, high) = interval(range).ok_or_else(|| invalid("confidence_range", range))?;
            Ok(signal.with_confidence_range(low, high))
        }
    }
}

/// Float -> rounded int, numeric string -> int; anything else is rejected.
pub fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(round_finite)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(round_finite))
        }
        _ => None,
    }
}

fn round_finite(f: f64) -> Option<i64> {
    f.is_finite().then(|| f.round() as i64)
}

fn required_int(obj: &Map<String, Value>, field: &'static str) -> ParseResult<i64> {
    let value = obj.get(field).ok_or(SignalParseError::MissingField(field))?;
    coerce_int(value).ok_or_else(|| invalid(field, value))
}

fn tickers(value: Option<&Value>) -> ParseResult<Vec<String>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                other => Err(invalid("related_stocks", other)),
            })
            .collect(),
        // "600519, 000001" style answers
        Some(Value::String(s)) => Ok(s.split([',', '，', ' ']).map(str::to_string).collect()),
        Some(other) => Err(invalid("related_stocks", other)),
    }
}

fn interval(value: &Value) -> Option<(i64, i64)> {
    match value {
        Value::Array(bounds) if bounds.len() == 2 => {
            Some((coerce_int(&bounds[0])?, coerce_int(&bounds[1])?))
        }
        Value::Object(bounds) => Some((
            coerce_int(bounds.get("low")?)?,
            coerce_int(bounds.get("high")?)?,
        )),
        _ => None,
    }
}

fn invalid(field: &'static str, value: &Value) -> SignalParseError {
    SignalParseError::InvalidField {
        field,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_object() {
        assert_eq!(extract_json_object("abc {\"a\":1} tail"), Some("{\"a\":1}"));
        assert_eq!(extract_json_object("} nothing {"), None);
        assert_eq!(extract_json_object("no braces"), None);
    }

    #[test]
    fn test_strip_think_block() {
        let raw = "<think>maybe {not json}</think>\n{\"a\":1}";
        assert_eq!(strip_think_block(raw), "\n{\"a\":1}");
        assert_eq!(strip_think_block("plain"), "plain");
    }

    #[test]
    fn test_parse_after_think_block() {
        let raw = r#"<think>
            first-order: {demand rises}
            </think>
            {"reasoning": "Policy support", "score": 7, "certainty": 8,
             "related_stocks": ["sh.600519"], "time_horizon": "Medium"}"#;
        let s = parse_signal(raw, "http://a").unwrap();
        assert_eq!(s.score(), 7);
        assert_eq!(s.certainty(), 8);
        assert_eq!(s.time_horizon(), TimeHorizon::Medium);
        assert!(s.related_stocks().contains("SH.600519"));
        assert_eq!(s.source_id(), "http://a");
    }

    #[test]
    fn test_parse_coerces_and_clamps() {
        let raw = r#"{"reasoning": "r", "score": "12.4", "certainty": 7.6,
            "time_horizon": 5, "confidence_range": ["-3", 14.2]}"#;
        let s = parse_signal(raw, "id").unwrap();
        assert_eq!(s.score(), 10);
        assert_eq!(s.certainty(), 8);
        assert_eq!(s.time_horizon(), TimeHorizon::Medium);
        assert_eq!(s.confidence_range(), Some((-3, 10)));
        assert!(s.related_stocks().is_empty());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(parse_signal("nothing here", "id"), Err(SignalParseError::NoJsonObject)));
        assert!(matches!(
            parse_signal(r#"{"score": 3, "certainty": 4}"#, "id"),
            Err(SignalParseError::MissingField("reasoning"))
        ));
        assert!(matches!(
            parse_signal(r#"{"reasoning": "r", "score": "high", "certainty": 4}"#, "id"),
            Err(SignalParseError::InvalidField { field: "score", .. })
        ));
        assert!(matches!(
            parse_signal(r#"{"reasoning": "r", "score": 1, "certainty": 4, "confidence_range": [1]}"#, "id"),
            Err(SignalParseError::InvalidField { field: "confidence_range", .. })
        ));
        assert!(matches!(parse_signal("{broken", "id"), Err(SignalParseError::NoJsonObject)));
        assert!(matches!(parse_signal("{ nope }", "id"), Err(SignalParseError::InvalidJson(_))));
    }

    #[test]
    fn test_coerce_int() {
        assert_eq!(coerce_int(&serde_json::json!(3)), Some(3));
        assert_eq!(coerce_int(&serde_json::json!(-2.5)), Some(-3));
        assert_eq!(coerce_int(&serde_json::json!(" 4 ")), Some(4));
        assert_eq!(coerce_int(&serde_json::json!(true)), None);
    }
}
