use crate::context;
use crate::record::{level_name, LogEvent};
use crate::worker::ShipperHandle;
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Targets under this prefix are never shipped.
pub const SELF_TARGET_PREFIX: &str = "claims_log_shipper";

/// `tracing_subscriber` layer that turns `tracing` events into
/// [`LogEvent`]s and queues them on a [`ShipperHandle`].
///
/// Only events at `min_level` or more severe are forwarded. Events from this
/// crate's own targets are skipped so pipeline diagnostics stay local.
pub struct ShippingLayer {
    handle: ShipperHandle,
    application: String,
    min_level: Level,
    /// Total events seen by the layer (before filtering).
    pub total_events: Arc<AtomicU64>,
}

impl ShippingLayer {
    pub fn new(handle: ShipperHandle, application: impl Into<String>, min_level: Level) -> Self {
        Self {
            handle,
            application: application.into(),
            min_level,
            total_events: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<S> Layer<S> for ShippingLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let meta = event.metadata();
        // More verbose levels compare greater.
        if *meta.level() > self.min_level || meta.target().starts_with(SELF_TARGET_PREFIX) {
            return;
        }

        let mut fields = BTreeMap::new();
        let mut message: Option<String> = None;
        let mut visitor = FieldVisitor {
            fields: &mut fields,
            message: &mut message,
        };
        event.record(&mut visitor);

        let mut record = LogEvent {
            timestamp: Utc::now(),
            level: level_name(*meta.level()).to_string(),
            logger: meta.target().to_string(),
            application: self.application.clone(),
            message: message.unwrap_or_default(),
            request_id: None,
            fields,
        };

        context::enrich(&mut record);

        self.handle.submit(record);
    }
}

pub struct FieldVisitor<'a> {
    pub fields: &'a mut BTreeMap<String, Value>,
    pub message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.fields.insert(field.name().to_string(), Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(field.name().to_string(), Value::String(format!("{:?}", value)));
        }
    }
}
