//! The event emitter (§4.E): orchestrates lookup, validation, category
//! extraction, redaction, and sink fan-out for a single `record_event`
//! call.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::envelope::Capsule;
use crate::error::{Result, TelemetryError};
use crate::extractor;
use crate::filter;
use crate::policy::{AllowedSchemas, EmitterConfig, Settings};
use crate::registry::SchemaRegistry;
use crate::schema::DuplicatePolicy;
use crate::sink::Sink;
use crate::validator::{CompiledValidator, SchemaValidator};

/// Constructs an [`EventEmitter`] with explicit setters and a validating
/// `build()`, mirroring this crate's layered settings-with-defaults
/// configuration style.
pub struct EmitterBuilder {
    sinks: Vec<Arc<dyn Sink>>,
    allowed_schemas: AllowedSchemas,
    settings: Settings,
}

impl EmitterBuilder {
    pub fn new() -> Self {
        Self {
            sinks: Vec::new(),
            allowed_schemas: AllowedSchemas::new(),
            settings: Settings::default(),
        }
    }

    pub fn sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn allowed_schemas(mut self, allowed_schemas: AllowedSchemas) -> Self {
        self.allowed_schemas = allowed_schemas;
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Seed `allowed_schemas` and `settings` from a parsed
    /// [`EmitterConfig`] (§4.H). `config.sink_hints` are not materialized
    /// into sinks here — resolving a hint into a live `Arc<dyn Sink>` is
    /// the host process's job — so the caller still attaches sinks with
    /// [`sink`](Self::sink) after this call.
    pub fn config(mut self, config: &EmitterConfig) -> Self {
        self.allowed_schemas = config.allowed_schemas.clone();
        self.settings = config.settings.clone();
        self
    }

    /// Assemble the emitter. Infallible today (there is nothing left to
    /// validate once `AllowedSchemas`/`Settings` are already-parsed,
    /// valid values) but returns `Result` to leave room for future
    /// cross-field checks without a breaking signature change.
    pub fn build(self) -> Result<EventEmitter> {
        Ok(EventEmitter {
            registry: SchemaRegistry::new(),
            validator: CompiledValidator::new(),
            sinks: self.sinks,
            allowed_schemas: self.allowed_schemas,
            settings: self.settings,
        })
    }
}

impl Default for EmitterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Ties the registry, validator, extractor, filter, and envelope together
/// behind one `record_event` call, fanning the result out to every
/// configured sink.
///
/// Each `EventEmitter` owns its own registry and sink list; nothing here
/// is process-global, so multiple emitters in one process never cross
/// each other's diagnostics or redaction policy.
pub struct EventEmitter {
    registry: SchemaRegistry,
    validator: CompiledValidator,
    sinks: Vec<Arc<dyn Sink>>,
    allowed_schemas: AllowedSchemas,
    settings: Settings,
}

impl EventEmitter {
    pub fn builder() -> EmitterBuilder {
        EmitterBuilder::new()
    }

    /// Register a parsed schema document.
    pub fn register_schema(&self, document: Value, duplicate_policy: DuplicatePolicy) -> Result<()> {
        let result = self.registry.register_from_value(document, duplicate_policy);
        match &result {
            Ok(()) => tracing::info!("schema registered"),
            Err(TelemetryError::SchemaConflict { id, version, .. }) => {
                tracing::warn!("schema registration conflict for '{id}' version {version}")
            }
            Err(_) => {}
        }
        result
    }

    /// Register a schema from a YAML- or JSON-encoded source.
    pub fn register_schema_source<R: std::io::Read>(
        &self,
        source: R,
        duplicate_policy: DuplicatePolicy,
    ) -> Result<()> {
        self.registry.register_from_source(source, duplicate_policy)
    }

    /// Record `event` against the schema `(id, version)`, stamped with the
    /// current UTC time.
    pub fn record_event(&self, id: &str, version: i64, event: &Value) -> Result<()> {
        self.record_event_at(id, version, event, Utc::now())
    }

    /// As [`record_event`](Self::record_event), with an explicit
    /// timestamp — the seam tests use to assert on exact envelope
    /// contents without depending on wall-clock time.
    pub fn record_event_at(
        &self,
        id: &str,
        version: i64,
        event: &Value,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let span = tracing::info_span!("record_event", schema_id = id, schema_version = version);
        let _enter = span.enter();

        if self.sinks.is_empty() || !self.allowed_schemas.is_allowed(id) {
            tracing::debug!("record_event is a no-op: no sinks configured or schema not allow-listed");
            return Ok(());
        }

        let schema = match self.registry.lookup(id, version) {
            Ok(schema) => schema,
            Err(err) => {
                tracing::warn!("record_event referenced an unregistered schema: {err}");
                return Err(err);
            }
        };

        if let Err(err) = self.validator.validate(event, &schema) {
            tracing::warn!("event failed schema validation: {err}");
            if self.settings.fail_open_on_validation_error {
                return Ok(());
            }
            return Err(err);
        }

        let annotations = extractor::extract_with_depth(event, &schema, self.settings.max_traversal_depth);
        let policy = self.allowed_schemas.policy_for(id);

        let count_redacted = |allowed_categories: &std::collections::HashSet<String>| {
            annotations
                .iter()
                .filter(|(path, categories)| {
                    let top_level_ancestor = match path.first() {
                        Some(crate::extractor::PathSegment::Key(key)) => key.as_str(),
                        _ => return false,
                    };
                    let allowed = categories
                        .iter()
                        .all(|c| c == "unrestricted" || allowed_categories.contains(c))
                        || policy.allowed_properties.contains(top_level_ancestor);
                    !allowed
                })
                .count()
        };

        let build_capsule = |allowed_categories: &std::collections::HashSet<String>| {
            let filtered = filter::apply(event, &annotations, allowed_categories, &policy.allowed_properties);
            Capsule::wrap_at(filtered, &schema, timestamp)
        };

        // The common case: every sink shares the schema's policy, so build
        // one capsule and reuse it. A sink with its own `allowed_categories`
        // hint (§4.F) gets its own filtered capsule computed on demand —
        // other sinks in the same call are unaffected.
        let default_capsule = build_capsule(&policy.allowed_categories);
        tracing::debug!(
            "emitting event for '{id}' version {version}, {} properties redacted",
            count_redacted(&policy.allowed_categories)
        );

        for sink in &self.sinks {
            let capsule = match sink.allowed_categories() {
                Some(overridden) => build_capsule(overridden),
                None => default_capsule.clone(),
            };

            if let Err(source) = sink.accept(&capsule) {
                let err = TelemetryError::Sink {
                    sink: sink.name().to_string(),
                    source,
                };
                tracing::warn!("sink '{}' failed to accept event: {err}", sink.name());
                return Err(err);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::CollectorSink;
    use chrono::TimeZone;
    use serde_json::json;

    fn schema_doc() -> Value {
        json!({
            "$id": "test.event",
            "version": 1,
            "properties": {
                "name": {"type": "string", "categories": ["unrestricted"]},
                "email": {"type": "string", "categories": ["pii"]}
            },
            "required": ["name"]
        })
    }

    #[test]
    fn builder_config_seeds_allowed_schemas_and_settings() {
        let config = EmitterConfig::from_value(&json!({
            "allowed_schemas": ["test.event"],
            "settings": {"fail_open_on_validation_error": true}
        }))
        .unwrap();

        let sink = Arc::new(CollectorSink::new("test"));
        let emitter = EventEmitter::builder().config(&config).sink(sink.clone()).build().unwrap();
        emitter.register_schema(schema_doc(), DuplicatePolicy::Raise).unwrap();

        // fail_open_on_validation_error came from the config, so an
        // invalid event is swallowed rather than propagated.
        emitter.record_event("test.event", 1, &json!({})).unwrap();
        assert!(sink.received().is_empty());
    }

    #[test]
    fn record_event_is_noop_without_sinks() {
        let emitter = EventEmitter::builder()
            .allowed_schemas(AllowedSchemas::from_value(&json!(["test.event"])).unwrap())
            .build()
            .unwrap();
        emitter.register_schema(schema_doc(), DuplicatePolicy::Raise).unwrap();

        emitter
            .record_event("test.event", 1, &json!({"name": "a", "email": "e"}))
            .unwrap();
    }

    #[test]
    fn record_event_is_noop_for_unlisted_schema() {
        let sink = Arc::new(CollectorSink::new("test"));
        let emitter = EventEmitter::builder().sink(sink.clone()).build().unwrap();
        emitter.register_schema(schema_doc(), DuplicatePolicy::Raise).unwrap();

        emitter
            .record_event("test.event", 1, &json!({"name": "a"}))
            .unwrap();
        assert!(sink.received().is_empty());
    }

    #[test]
    fn record_event_redacts_and_stamps_envelope() {
        let sink = Arc::new(CollectorSink::new("test"));
        let emitter = EventEmitter::builder()
            .sink(sink.clone())
            .allowed_schemas(AllowedSchemas::from_value(&json!(["test.event"])).unwrap())
            .build()
            .unwrap();
        emitter.register_schema(schema_doc(), DuplicatePolicy::Raise).unwrap();

        let ts = Utc.with_ymd_and_hms(2026, 7, 28, 0, 0, 0).unwrap();
        emitter
            .record_event_at("test.event", 1, &json!({"name": "a", "email": "e"}), ts)
            .unwrap();

        let received = sink.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["name"], json!("a"));
        assert_eq!(received[0]["email"], json!(null));
        assert_eq!(received[0]["__schema__"], json!("test.event"));
    }

    #[test]
    fn sink_with_allowed_categories_override_sees_a_differently_redacted_capsule() {
        let plain_sink = Arc::new(CollectorSink::new("plain"));
        let pii_sink = Arc::new(CollectorSink::with_allowed_categories(
            "pii-allowed",
            ["pii".to_string()].into_iter().collect(),
        ));
        let emitter = EventEmitter::builder()
            .sink(plain_sink.clone())
            .sink(pii_sink.clone())
            .allowed_schemas(AllowedSchemas::from_value(&json!(["test.event"])).unwrap())
            .build()
            .unwrap();
        emitter.register_schema(schema_doc(), DuplicatePolicy::Raise).unwrap();

        emitter
            .record_event("test.event", 1, &json!({"name": "a", "email": "e"}))
            .unwrap();

        // Schema policy has no allowed_categories, so the plain sink only
        // sees the unrestricted "name" field.
        let plain_received = plain_sink.received();
        assert_eq!(plain_received[0]["name"], json!("a"));
        assert_eq!(plain_received[0]["email"], json!(null));

        // The overridden sink allows "pii", so it sees the email too.
        let pii_received = pii_sink.received();
        assert_eq!(pii_received[0]["name"], json!("a"));
        assert_eq!(pii_received[0]["email"], json!("e"));
    }

    #[test]
    fn record_event_propagates_unregistered_schema_error() {
        let sink = Arc::new(CollectorSink::new("test"));
        let emitter = EventEmitter::builder()
            .sink(sink)
            .allowed_schemas(AllowedSchemas::from_value(&json!(["test.event"])).unwrap())
            .build()
            .unwrap();

        let err = emitter
            .record_event("test.event", 1, &json!({"name": "a"}))
            .unwrap_err();
        assert!(matches!(err, TelemetryError::UnregisteredSchema { .. }));
    }

    #[test]
    fn record_event_propagates_validation_error_by_default() {
        let sink = Arc::new(CollectorSink::new("test"));
        let emitter = EventEmitter::builder()
            .sink(sink.clone())
            .allowed_schemas(AllowedSchemas::from_value(&json!(["test.event"])).unwrap())
            .build()
            .unwrap();
        emitter.register_schema(schema_doc(), DuplicatePolicy::Raise).unwrap();

        let err = emitter.record_event("test.event", 1, &json!({})).unwrap_err();
        assert!(matches!(err, TelemetryError::Validation { .. }));
        assert!(sink.received().is_empty());
    }

    #[test]
    fn fail_open_setting_swallows_validation_error() {
        let sink = Arc::new(CollectorSink::new("test"));
        let emitter = EventEmitter::builder()
            .sink(sink.clone())
            .allowed_schemas(AllowedSchemas::from_value(&json!(["test.event"])).unwrap())
            .settings(Settings {
                fail_open_on_validation_error: true,
                ..Settings::default()
            })
            .build()
            .unwrap();
        emitter.register_schema(schema_doc(), DuplicatePolicy::Raise).unwrap();

        emitter.record_event("test.event", 1, &json!({})).unwrap();
        assert!(sink.received().is_empty());
    }

    #[test]
    fn original_event_is_never_mutated_by_record_event() {
        let sink = Arc::new(CollectorSink::new("test"));
        let emitter = EventEmitter::builder()
            .sink(sink)
            .allowed_schemas(AllowedSchemas::from_value(&json!(["test.event"])).unwrap())
            .build()
            .unwrap();
        emitter.register_schema(schema_doc(), DuplicatePolicy::Raise).unwrap();

        let event = json!({"name": "a", "email": "e"});
        let before = event.clone();
        emitter.record_event("test.event", 1, &event).unwrap();
        assert_eq!(event, before);
    }
}
