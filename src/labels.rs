use crate::record::LogEvent;
use serde::Serialize;
use std::collections::BTreeMap;

/// Keys that may be promoted to stream labels. Anything else stays in the
/// log line only, keeping label cardinality bounded.
pub const LABEL_KEYS: [&str; 9] = [
    "level",
    "logger",
    "application",
    "request_id",
    "method",
    "path",
    "status_code",
    "client_ip",
    "user_id",
];

/// Label set of one stream. Serializes as a flat JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    /// Pick the allow-listed keys present on `event`. Missing keys are
    /// omitted, never defaulted.
    pub fn extract(event: &LogEvent) -> Self {
        let labels = LABEL_KEYS
            .iter()
            .filter_map(|key| event.lookup(key).map(|value| (key.to_string(), value)))
            .collect();
        LabelSet(labels)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn minimal_event_yields_only_fixed_labels() {
        let event = LogEvent::new(Level::INFO, "api", "api", "ping");
        let labels = LabelSet::extract(&event);

        let expected: Vec<(&str, &str)> =
            vec![("application", "api"), ("level", "info"), ("logger", "api")];
        assert_eq!(labels.iter().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn non_allow_listed_fields_are_not_labels() {
        let event = LogEvent::new(Level::ERROR, "api", "api", "request_failed")
            .with_request_id("r-7")
            .with_field("method", "POST")
            .with_field("error", "boom")
            .with_field("error_type", "StoreError");
        let labels = LabelSet::extract(&event);

        assert_eq!(labels.get("request_id"), Some("r-7"));
        assert_eq!(labels.get("method"), Some("POST"));
        assert_eq!(labels.get("error"), None);
        assert_eq!(labels.get("error_type"), None);
        assert_eq!(labels.get("path"), None);
        assert_eq!(labels.len(), 5);
    }

    #[test]
    fn numeric_fields_are_stringified() {
        let event = LogEvent::new(Level::INFO, "api", "api", "request_completed")
            .with_field("status_code", 404);
        assert_eq!(LabelSet::extract(&event).get("status_code"), Some("404"));
    }
}
