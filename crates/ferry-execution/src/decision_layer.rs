//! Tracing layer that streams decision events to a channel.
//!
//! The engine logs one event per decided message. This layer turns those
//! events into [`DecisionEvent`] values so a caller (the CLI's `--trace`
//! mode, a dashboard) can consume them without parsing log output.

use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{Event, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// A captured tracing event.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DecisionEvent {
    /// Event target (e.g. "ferry::decision")
    pub target: String,
    /// Log level (INFO, DEBUG, WARN, ERROR)
    pub level: String,
    pub message: String,
    /// Structured fields, `message` included
    pub fields: HashMap<String, Value>,
    pub timestamp: String,
}

impl DecisionEvent {
    /// String value of a recorded field.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// `"emit"` or `"suppress"` for engine decisions.
    pub fn decision(&self) -> Option<&str> {
        self.field_str("decision")
    }
}

/// Sends every event it sees to a channel.
///
/// Combine it with a per-layer filter to restrict it to decision events.
pub struct DecisionEventLayer {
    sender: mpsc::UnboundedSender<DecisionEvent>,
}

impl DecisionEventLayer {
    pub fn new(sender: mpsc::UnboundedSender<DecisionEvent>) -> Self {
        Self { sender }
    }
}

impl<S> Layer<S> for DecisionEventLayer
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = HashMap::new();
        event.record(&mut FieldVisitor(&mut fields));

        let decision_event = DecisionEvent {
            target: event.metadata().target().to_string(),
            level: event.metadata().level().to_string(),
            message: fields
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            fields,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        // receiver gone: nobody is listening any more
        let _ = self.sender.send(decision_event);
    }
}

/// Collects event fields into a map of JSON values.
struct FieldVisitor<'a>(&'a mut HashMap<String, Value>);

impl tracing::field::Visit for FieldVisitor<'_> {
    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        // `%x` fields and the message arrive here already formatted
        self.0
            .insert(field.name().to_string(), serde_json::json!(format!("{:?}", value)));
    }
}
