use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::Level;

/// A single structured log event, immutable once built.
///
/// `level`, `logger`, `application` and `request_id` are promoted out of
/// `fields` because every event carries them and they double as stream
/// labels. Everything else the caller attached lives in `fields`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub logger: String,
    pub application: String,
    pub message: String,
    pub request_id: Option<String>,
    pub fields: BTreeMap<String, Value>,
}

/// Lowercase level name as it appears in labels and log lines.
pub fn level_name(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warning",
        _ => "error",
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    event: &'a str,
    level: &'a str,
    logger: &'a str,
    application: &'a str,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<&'a str>,
    #[serde(flatten)]
    fields: &'a BTreeMap<String, Value>,
}

impl LogEvent {
    pub fn new(
        level: Level,
        logger: impl Into<String>,
        application: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            level: level_name(level).to_string(),
            logger: logger.into(),
            application: application.into(),
            message: message.into(),
            request_id: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Epoch nanoseconds, the timestamp unit of the Loki push API.
    pub fn timestamp_nanos(&self) -> i64 {
        self.timestamp.timestamp_nanos_opt().unwrap_or_default()
    }

    /// Resolve a key against the promoted attributes first, then `fields`.
    ///
    /// Non-string field values are rendered with their JSON form, so a
    /// `status_code` of `200` yields `"200"`. Absent keys yield `None`.
    pub fn lookup(&self, key: &str) -> Option<String> {
        match key {
            "level" => Some(self.level.clone()),
            "logger" => Some(self.logger.clone()),
            "application" => Some(self.application.clone()),
            "request_id" => self.request_id.clone().or_else(|| self.field_string(key)),
            _ => self.field_string(key),
        }
    }

    fn field_string(&self, key: &str) -> Option<String> {
        self.fields.get(key).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Render the raw JSON log line shipped as the stream value.
    ///
    /// Promoted attributes win over same-named caller fields.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let mut fields = self.fields.clone();
        for key in ["event", "level", "logger", "application", "timestamp"] {
            fields.remove(key);
        }
        if self.request_id.is_some() {
            fields.remove("request_id");
        }

        serde_json::to_string(&JsonLine {
            event: &self.message,
            level: &self.level,
            logger: &self.logger,
            application: &self.application,
            timestamp: self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            request_id: self.request_id.as_deref(),
            fields: &fields,
        })
    }
}

/// Convert an arbitrary JSON object into event fields.
pub(crate) fn fields_from_object(object: Map<String, Value>) -> BTreeMap<String, Value> {
    object.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_prefers_promoted_attributes() {
        let event = LogEvent::new(Level::INFO, "api", "api", "request_completed")
            .with_request_id("abc")
            .with_field("level", "bogus")
            .with_field("status_code", 201);

        assert_eq!(event.lookup("level").as_deref(), Some("info"));
        assert_eq!(event.lookup("request_id").as_deref(), Some("abc"));
        assert_eq!(event.lookup("status_code").as_deref(), Some("201"));
        assert_eq!(event.lookup("user_id"), None);
    }

    #[test]
    fn json_line_carries_required_keys() {
        let event = LogEvent::new(Level::WARN, "claims", "api", "claim_denied")
            .with_request_id("r-1")
            .with_field("claim_id", "c-9");

        let line: Value = serde_json::from_str(&event.to_json_line().unwrap()).unwrap();
        assert_eq!(line["event"], json!("claim_denied"));
        assert_eq!(line["level"], json!("warning"));
        assert_eq!(line["logger"], json!("claims"));
        assert_eq!(line["request_id"], json!("r-1"));
        assert_eq!(line["claim_id"], json!("c-9"));
        assert!(line["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn json_line_omits_missing_request_id() {
        let event = LogEvent::new(Level::INFO, "app", "api", "Starting application");
        let line: Value = serde_json::from_str(&event.to_json_line().unwrap()).unwrap();
        assert!(line.get("request_id").is_none());
    }
}
