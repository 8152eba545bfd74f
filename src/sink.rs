//! The sink contract (§4.F): where a finished [`Capsule`] goes once it has
//! been validated, redacted, and enveloped.

use std::collections::HashSet;

use crate::envelope::Capsule;

/// A sink-local error, opaque to this crate. The emitter wraps it in
/// `TelemetryError::Sink` alongside the sink's name.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Something an [`EventEmitter`](crate::emitter::EventEmitter) can hand a
/// finished capsule to.
///
/// Implementations are responsible for their own I/O; a sink failure is
/// wrapped in `TelemetryError::Sink` by the emitter.
pub trait Sink: Send + Sync {
    /// Accept a capsule that has already passed validation and redaction.
    fn accept(&self, capsule: &Capsule) -> Result<(), SinkError>;

    /// A human-readable name used in `TelemetryError::Sink` messages and
    /// diagnostic logs.
    fn name(&self) -> &str;

    /// An optional per-sink override of the schema-level `allowed_categories`.
    ///
    /// When present, the emitter redacts a capsule destined for this sink
    /// using this set (plus the implicit `unrestricted` member) instead of
    /// the schema's configured policy, so one sink can see more or less of
    /// an event than the others. `None` (the default) means "use the
    /// schema's policy unchanged".
    fn allowed_categories(&self) -> Option<&HashSet<String>> {
        None
    }
}

/// A sink that collects every capsule it receives, in order.
///
/// Grounded in nothing fancier than a `Vec` behind a lock; useful as a
/// test double and as the simplest possible "write events somewhere"
/// implementation to build real sinks (file, stdout, network) against.
pub struct CollectorSink {
    name: String,
    received: std::sync::Mutex<Vec<serde_json::Value>>,
    allowed_categories: Option<HashSet<String>>,
}

impl CollectorSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            received: std::sync::Mutex::new(Vec::new()),
            allowed_categories: None,
        }
    }

    /// As [`new`](Self::new), but overriding the schema-level
    /// `allowed_categories` for every capsule routed to this sink.
    pub fn with_allowed_categories(name: impl Into<String>, allowed_categories: HashSet<String>) -> Self {
        Self {
            name: name.into(),
            received: std::sync::Mutex::new(Vec::new()),
            allowed_categories: Some(allowed_categories),
        }
    }

    pub fn received(&self) -> Vec<serde_json::Value> {
        self.received.lock().expect("collector sink poisoned").clone()
    }
}

impl Sink for CollectorSink {
    fn accept(&self, capsule: &Capsule) -> Result<(), SinkError> {
        self.received
            .lock()
            .expect("collector sink poisoned")
            .push(capsule.as_value().clone());
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn allowed_categories(&self) -> Option<&HashSet<String>> {
        self.allowed_categories.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use serde_json::json;

    #[test]
    fn collector_sink_records_every_capsule_in_order() {
        let sink = CollectorSink::new("test");
        let schema = Schema::from_value(json!({
            "$id": "t", "version": 1,
            "properties": {"a": {"type": "string", "categories": ["unrestricted"]}}
        }))
        .unwrap();

        sink.accept(&Capsule::wrap(json!({"a": "1"}), &schema)).unwrap();
        sink.accept(&Capsule::wrap(json!({"a": "2"}), &schema)).unwrap();

        let received = sink.received();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0]["a"], json!("1"));
        assert_eq!(received[1]["a"], json!("2"));
    }

    #[test]
    fn default_sink_has_no_allowed_categories_override() {
        let sink = CollectorSink::new("test");
        assert!(sink.allowed_categories().is_none());
    }

    #[test]
    fn with_allowed_categories_exposes_the_override() {
        let categories: HashSet<String> = ["pii".to_string()].into_iter().collect();
        let sink = CollectorSink::with_allowed_categories("test", categories.clone());
        assert_eq!(sink.allowed_categories(), Some(&categories));
    }
}
