// Canonical capture records shared by every analysis stage

use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Initial request priority as assigned by the browser's loader.
///
/// Variant order matters: `VeryLow < Low < Medium < High < VeryHigh`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl Priority {
    /// Render-blocking class: Medium and above.
    pub fn is_critical(&self) -> bool {
        *self >= Priority::Medium
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::VeryLow => "VeryLow",
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::VeryHigh => "VeryHigh",
        }
    }
}

/// One observed network fetch. Timings are kept in the units the capture used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub request_id: String,
    pub initial_priority: Priority,
    #[serde(default)]
    pub start_time: f64,
    #[serde(default)]
    pub response_received_time: f64,
    #[serde(default)]
    pub end_time: f64,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiator_url: Option<String>,
}

/// Transport field names (after one leading underscore is dropped) and their
/// canonical counterparts. Anything not listed keeps its stripped name.
const FIELD_RENAMES: &[(&str, &str)] = &[
    ("requestId", "request_id"),
    ("initialPriority", "initial_priority"),
    ("startTime", "start_time"),
    ("responseReceivedTime", "response_received_time"),
    ("endTime", "end_time"),
    ("initiatorUrl", "initiator_url"),
    ("initiatorURL", "initiator_url"),
    ("documentURL", "document_url"),
    ("frameId", "frame_id"),
    ("loaderId", "loader_id"),
    ("mimeType", "mime_type"),
    ("resourceType", "resource_type"),
    ("requestHeaders", "request_headers"),
    ("responseHeaders", "response_headers"),
];

/// Map one raw transport key onto the canonical schema.
pub fn canonical_field_name(raw: &str) -> String {
    let stripped = match raw.strip_prefix('_') {
        Some(rest) if !rest.starts_with('_') && !rest.is_empty() => rest,
        _ => raw,
    };

    FIELD_RENAMES
        .iter()
        .find(|(from, _)| *from == stripped)
        .map(|(_, to)| to.to_string())
        .unwrap_or_else(|| stripped.to_string())
}

/// Rewrite every key of a raw record object into canonical form. When two
/// raw keys land on the same canonical name the later one wins.
pub fn canonicalize_fields(raw: &Map<String, Value>) -> Map<String, Value> {
    let mut canonical = Map::with_capacity(raw.len());
    for (key, value) in raw {
        let name = canonical_field_name(key);
        if let Some(previous) = canonical.insert(name.clone(), value.clone())
            && previous != *value
        {
            warn!(
                "Raw record key '{}' overwrote a different value for '{}'",
                key, name
            );
        }
    }
    canonical
}

impl RequestRecord {
    /// Build a record from a raw capture object, normalizing transport field
    /// names first. Internal code never sees the raw names.
    pub fn from_raw(raw: &Value) -> Result<Self> {
        let object = raw.as_object().ok_or_else(|| {
            AnalysisError::InvalidInput("network record is not a JSON object".to_string())
        })?;

        let mut canonical = canonicalize_fields(object);

        // Captures sometimes carry numeric request ids
        if let Some(Value::Number(id)) = canonical.get("request_id") {
            let id = id.to_string();
            canonical.insert("request_id".to_string(), Value::String(id));
        }

        serde_json::from_value(Value::Object(canonical))
            .map_err(|e| AnalysisError::InvalidInput(format!("network record: {}", e)))
    }

    /// Normalize a whole capture. Fails on the first unusable record.
    pub fn from_raw_records(raw: &[Value]) -> Result<Vec<Self>> {
        raw.iter().map(Self::from_raw).collect()
    }

    pub fn is_critical(&self) -> bool {
        self.initial_priority.is_critical()
    }
}

/// One scheduled unit of main-thread work, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub start: f64,
    pub end: f64,
    pub duration: f64,
}

impl Interval {
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            duration: end - start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::VeryLow < Priority::Low);
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::High < Priority::VeryHigh);
        assert!(Priority::Medium.is_critical());
        assert!(!Priority::Low.is_critical());
    }

    #[test]
    fn test_canonical_field_name() {
        assert_eq!(canonical_field_name("_requestId"), "request_id");
        assert_eq!(canonical_field_name("_documentURL"), "document_url");
        assert_eq!(canonical_field_name("startTime"), "start_time");
        assert_eq!(canonical_field_name("_transferSize"), "transferSize");
        assert_eq!(canonical_field_name("__proto"), "__proto");
        assert_eq!(canonical_field_name("url"), "url");
    }

    #[test]
    fn test_from_raw_devtools_record() {
        let raw = json!({
            "_requestId": 17,
            "_initialPriority": "VeryHigh",
            "_url": "https://example.com/",
            "_startTime": 1.5,
            "_responseReceivedTime": 1.7,
            "_endTime": 2.0,
            "_mimeType": "text/html"
        });

        let record = RequestRecord::from_raw(&raw).unwrap();
        assert_eq!(record.request_id, "17");
        assert_eq!(record.initial_priority, Priority::VeryHigh);
        assert_eq!(record.url, "https://example.com/");
        assert_eq!(record.end_time, 2.0);
        assert!(record.initiator_url.is_none());
    }

    #[test]
    fn test_colliding_keys_keep_one_canonical_field() {
        let raw = json!({"_requestId": "a", "requestId": "b", "_url": "https://example.com/"});
        let canonical = canonicalize_fields(raw.as_object().unwrap());

        assert_eq!(canonical.len(), 2);
        let id = canonical["request_id"].as_str().unwrap();
        assert!(id == "a" || id == "b");
        assert_eq!(canonical["url"], "https://example.com/");
    }

    #[test]
    fn test_from_raw_rejects_unknown_priority() {
        let raw = json!({"_requestId": "1", "_initialPriority": "Urgent"});
        assert!(matches!(
            RequestRecord::from_raw(&raw),
            Err(AnalysisError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_interval_duration() {
        let interval = Interval::new(1000.0, 1110.0);
        assert_eq!(interval.duration, 110.0);
    }
}
