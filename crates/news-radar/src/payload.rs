//! Structured live-feed payloads.
//!
//! Envelopes are JSON, sometimes wrapped in a JavaScript assignment
//! (`var ajaxResult={...};`). Known shapes:
//!
//! - `{"LivesList": [...]}` (Eastmoney kuaixun)
//! - `{"result": {"data": {"feed": {"list": [...]}}}}` (Sina 7x24)
//! - `{"list": [...]}` / `{"data": {"list": [...]}}` (generic list endpoints)
//!
//! Anything else yields no items rather than an error.

use finnews_core::{extract_json_object, NewsItem};
use serde_json::Value;

use crate::error::{IngestError, IngestResult};

const ID_FIELDS: &[&str] = &["url_unique", "docurl", "url", "link"];
const TITLE_FIELDS: &[&str] = &["simtitle", "title"];
const BODY_FIELDS: &[&str] = &["digest", "rich_text", "summary", "content"];
const DERIVED_TITLE_CHARS: usize = 60;

/// Parse an envelope, falling back to the `{ ... }` literal inside a JS wrapper.
pub fn parse_envelope(text: &str) -> IngestResult<Value> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(value) => Ok(value),
        Err(strict) => {
            let literal = extract_json_object(text)
                .ok_or_else(|| IngestError::Malformed(format!("no JSON object: {strict}")))?;
            serde_json::from_str(literal).map_err(|e| IngestError::Malformed(e.to_string()))
        }
    }
}

/// Map an envelope to news items; unknown shapes give an empty list.
pub fn items_from_envelope(envelope: &Value, source: &str) -> Vec<NewsItem> {
    let entries = envelope
        .get("LivesList")
        .or_else(|| envelope.pointer("/result/data/feed/list"))
        .or_else(|| envelope.get("list"))
        .or_else(|| envelope.pointer("/data/list"))
        .and_then(Value::as_array);

    match entries {
        Some(entries) => entries
            .iter()
            .filter_map(|entry| entry_to_item(entry, source))
            .collect(),
        None => Vec::new(),
    }
}

/// Parse a raw structured payload straight into items.
pub fn parse_structured_payload(text: &str, source: &str) -> IngestResult<Vec<NewsItem>> {
    let envelope = parse_envelope(text)?;
    Ok(items_from_envelope(&envelope, source))
}

fn entry_to_item(entry: &Value, source: &str) -> Option<NewsItem> {
    let body = first_string(entry, BODY_FIELDS);
    let id = first_string(entry, ID_FIELDS).or_else(|| {
        // Sina entries without a docurl still carry a numeric id
        entry
            .get("id")
            .filter(|v| v.is_number() || v.is_string())
            .map(|v| format!("{source}:{}", v.as_str().map_or_else(|| v.to_string(), str::to_string)))
    })?;
    let title = first_string(entry, TITLE_FIELDS)
        .or_else(|| body.as_deref().map(derive_title))
        .unwrap_or_else(|| id.clone());

    let item = NewsItem::new(id, title, source);
    Some(match body {
        Some(body) => item.with_body(body),
        None => item,
    })
}

fn first_string(entry: &Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|f| entry.get(*f).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Headline from a live-feed blurb: the 【bracketed】 lead if present, else a prefix.
fn derive_title(text: &str) -> String {
    let text = text.trim();
    if let Some(rest) = text.strip_prefix('【') {
        if let Some(end) = rest.find('】') {
            let lead = rest[..end].trim();
            if !lead.is_empty() {
                return lead.to_string();
            }
        }
    }
    text.chars().take(DERIVED_TITLE_CHARS).collect()
}
