use crate::labels::LabelSet;
use crate::record::LogEvent;
use serde::Serialize;

/// One Loki stream: a label set plus `[timestamp_ns, line]` pairs.
///
/// The shipper builds one stream per event and never merges streams that
/// share labels; Loki groups them server side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stream {
    pub stream: LabelSet,
    pub values: Vec<[String; 2]>,
}

impl Stream {
    pub fn from_event(event: &LogEvent) -> Result<Self, serde_json::Error> {
        let line = event.to_json_line()?;
        Ok(Stream {
            stream: LabelSet::extract(event),
            values: vec![[event.timestamp_nanos().to_string(), line]],
        })
    }
}

/// Body of a `POST /loki/api/v1/push` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PushPayload {
    pub streams: Vec<Stream>,
}

impl PushPayload {
    pub fn new(streams: Vec<Stream>) -> Self {
        Self { streams }
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Total number of log lines across all streams.
    pub fn value_count(&self) -> usize {
        self.streams.iter().map(|s| s.values.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tracing::Level;

    #[test]
    fn payload_matches_push_api_shape() {
        let event = LogEvent::new(Level::INFO, "api", "api", "request_started")
            .with_field("method", "GET");
        let payload = PushPayload::new(vec![Stream::from_event(&event).unwrap()]);

        let body: Value = serde_json::to_value(&payload).unwrap();
        let stream = &body["streams"][0];
        assert_eq!(stream["stream"]["method"], json!("GET"));
        assert_eq!(stream["stream"]["level"], json!("info"));

        let pair = stream["values"][0].as_array().unwrap();
        assert_eq!(pair.len(), 2);
        assert_eq!(pair[0], json!(event.timestamp_nanos().to_string()));
        let line: Value = serde_json::from_str(pair[1].as_str().unwrap()).unwrap();
        assert_eq!(line["event"], json!("request_started"));
    }
}
