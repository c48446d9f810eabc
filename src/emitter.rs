use crate::context;
use crate::diagnostics;
use crate::record::{fields_from_object, LogEvent};
use crate::worker::ShipperHandle;
use serde::Serialize;
use serde_json::Value;
use tracing::Level;

/// Why an event could not be built from caller fields.
#[derive(thiserror::Error, Debug)]
pub enum EmitError {
    #[error("fields could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("fields must serialize to a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Builds structured [`LogEvent`]s for one named logger and hands them to
/// the shipping pipeline.
#[derive(Clone)]
pub struct EventEmitter {
    logger: String,
    application: String,
    handle: ShipperHandle,
}

impl EventEmitter {
    pub fn new(logger: impl Into<String>, application: impl Into<String>, handle: ShipperHandle) -> Self {
        Self {
            logger: logger.into(),
            application: application.into(),
            handle,
        }
    }

    pub fn logger(&self) -> &str {
        &self.logger
    }

    /// Emit an event with `fields` attached and return it.
    ///
    /// The event is stamped with the current time and enriched with the
    /// request id and user id of the surrounding
    /// [`RequestContext`](crate::context::RequestContext), if one is in
    /// scope. When `fields` cannot be turned into a JSON object the event is
    /// dropped, reported on the diagnostic channel, and `None` is returned;
    /// the caller never sees the error.
    pub fn emit<F: Serialize>(&self, level: Level, message: &str, fields: F) -> Option<LogEvent> {
        match self.build(level, message, fields) {
            Ok(event) => {
                self.handle.submit(event.clone());
                Some(event)
            }
            Err(e) => {
                diagnostics::event_unserializable(&e);
                None
            }
        }
    }

    pub fn info<F: Serialize>(&self, message: &str, fields: F) -> Option<LogEvent> {
        self.emit(Level::INFO, message, fields)
    }

    pub fn error<F: Serialize>(&self, message: &str, fields: F) -> Option<LogEvent> {
        self.emit(Level::ERROR, message, fields)
    }

    fn build<F: Serialize>(&self, level: Level, message: &str, fields: F) -> Result<LogEvent, EmitError> {
        let fields = match serde_json::to_value(fields)? {
            Value::Object(map) => fields_from_object(map),
            Value::Null => Default::default(),
            Value::Bool(_) => return Err(EmitError::NotAnObject("bool")),
            Value::Number(_) => return Err(EmitError::NotAnObject("number")),
            Value::String(_) => return Err(EmitError::NotAnObject("string")),
            Value::Array(_) => return Err(EmitError::NotAnObject("array")),
        };

        let mut event = LogEvent::new(level, self.logger.as_str(), self.application.as_str(), message);
        event.fields = fields;

        context::enrich(&mut event);

        Ok(event)
    }
}
