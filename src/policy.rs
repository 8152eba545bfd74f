//! Redaction policy configuration (§4.F data model): which categories and
//! which individually-whitelisted properties an emitter is allowed to let
//! through, per schema `$id`.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::error::{Result, TelemetryError};

const KNOWN_POLICY_KEYS: &[&str] = &["allowed_categories", "allowed_properties"];

/// The categories and individually-whitelisted properties one schema is
/// allowed to emit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaPolicy {
    pub allowed_categories: HashSet<String>,
    pub allowed_properties: HashSet<String>,
}

impl SchemaPolicy {
    pub fn new(allowed_categories: HashSet<String>, allowed_properties: HashSet<String>) -> Self {
        Self {
            allowed_categories,
            allowed_properties,
        }
    }

    fn from_value(id: &str, value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            TelemetryError::schema(format!(
                "allowed_schemas[{id:?}] must be an object with optional \"allowed_categories\"/\"allowed_properties\" keys"
            ))
        })?;

        for key in object.keys() {
            if !KNOWN_POLICY_KEYS.contains(&key.as_str()) {
                return Err(TelemetryError::policy(key.clone(), format!("allowed_schemas[{id:?}]")));
            }
        }

        let allowed_categories = object
            .get("allowed_categories")
            .and_then(Value::as_array)
            .map(string_set)
            .unwrap_or_default();
        let allowed_properties = object
            .get("allowed_properties")
            .and_then(Value::as_array)
            .map(string_set)
            .unwrap_or_default();

        Ok(Self::new(allowed_categories, allowed_properties))
    }
}

fn string_set(values: &[Value]) -> HashSet<String> {
    values.iter().filter_map(|v| v.as_str()).map(str::to_string).collect()
}

/// Per-schema redaction policy, keyed by schema `$id`.
///
/// A schema with no entry here gets an all-empty [`SchemaPolicy`] — every
/// annotated property is redacted except those tagged `unrestricted`
/// (F5), which is always implicitly allowed regardless of policy.
#[derive(Debug, Clone, Default)]
pub struct AllowedSchemas {
    policies: HashMap<String, SchemaPolicy>,
}

impl AllowedSchemas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an `allowed_schemas` configuration document.
    ///
    /// Two shapes are accepted: the legacy `[id, ...]` form (each listed id
    /// is allowed with an empty, redact-everything-but-`unrestricted`
    /// policy — this crate's ancestor originally tracked allowed schema
    /// ids as a bare list with no per-schema category policy at all), and
    /// the explicit `{id: {allowed_categories?, allowed_properties?}}`
    /// map form.
    pub fn from_value(document: &Value) -> Result<Self> {
        if let Some(ids) = document.as_array() {
            let mut policies = HashMap::new();
            for id in ids {
                let id = id.as_str().ok_or_else(|| {
                    TelemetryError::policy("<non-string-id>".to_string(), "allowed_schemas".to_string())
                })?;
                policies.insert(id.to_string(), SchemaPolicy::default());
            }
            return Ok(Self { policies });
        }

        let object = document
            .as_object()
            .ok_or_else(|| TelemetryError::policy("<root>".to_string(), "allowed_schemas".to_string()))?;

        let mut policies = HashMap::new();
        for (id, value) in object {
            policies.insert(id.clone(), SchemaPolicy::from_value(id, value)?);
        }
        Ok(Self { policies })
    }

    pub fn insert(&mut self, id: impl Into<String>, policy: SchemaPolicy) {
        self.policies.insert(id.into(), policy);
    }

    /// Whether `id` is explicitly allow-listed at all. `record_event`'s
    /// precondition is membership here, distinct from what the resulting
    /// policy permits through the filter.
    pub fn is_allowed(&self, id: &str) -> bool {
        self.policies.contains_key(id)
    }

    /// The policy for `id`, or an empty (redact-everything-but-unrestricted)
    /// default if `id` has no explicit entry.
    pub fn policy_for(&self, id: &str) -> SchemaPolicy {
        self.policies.get(id).cloned().unwrap_or_default()
    }
}

/// Emitter-wide behavioral knobs, distinct from per-schema redaction
/// policy.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// When `true`, a `record_event` call whose event fails schema
    /// validation logs a warning and returns `Ok(())` instead of
    /// propagating `TelemetryError::Validation`. Defaults to `false`:
    /// validation failures are bugs in the caller and should surface as
    /// such unless explicitly opted out of.
    pub fail_open_on_validation_error: bool,
    /// Recursion ceiling passed to the category extractor.
    pub max_traversal_depth: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fail_open_on_validation_error: false,
            max_traversal_depth: crate::extractor::DEFAULT_MAX_TRAVERSAL_DEPTH,
        }
    }
}

const KNOWN_SETTINGS_KEYS: &[&str] = &["fail_open_on_validation_error", "max_traversal_depth"];

impl Settings {
    /// Parse a `settings` sub-block from an emitter configuration document.
    /// Keys not present fall back to [`Settings::default`]; unrecognized
    /// keys are rejected.
    pub fn from_value(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| TelemetryError::schema("\"settings\" must be an object".to_string()))?;

        for key in object.keys() {
            if !KNOWN_SETTINGS_KEYS.contains(&key.as_str()) {
                return Err(TelemetryError::policy(key.clone(), "settings".to_string()));
            }
        }

        let mut settings = Self::default();

        if let Some(value) = object.get("fail_open_on_validation_error") {
            settings.fail_open_on_validation_error = value.as_bool().ok_or_else(|| {
                TelemetryError::schema("\"settings.fail_open_on_validation_error\" must be a boolean".to_string())
            })?;
        }

        if let Some(value) = object.get("max_traversal_depth") {
            settings.max_traversal_depth = value.as_u64().ok_or_else(|| {
                TelemetryError::schema("\"settings.max_traversal_depth\" must be a non-negative integer".to_string())
            })? as usize;
        }

        Ok(settings)
    }
}

const KNOWN_CONFIG_KEYS: &[&str] = &["sinks", "allowed_schemas", "settings"];

/// A fully parsed emitter configuration document (§3's "Emitter
/// configuration document" / §4.H): sink hints, the `allowed_schemas`
/// policy, and a `settings` block, all assembled from one already-parsed
/// YAML/JSON value.
///
/// Turning a `sinks` hint into a live `Arc<dyn Sink>` — and loading the
/// document itself off disk — is the host process's job; this crate only
/// turns an already-parsed document into typed configuration (§1's
/// out-of-scope "YAML/JSON file loading").
#[derive(Debug, Clone, Default)]
pub struct EmitterConfig {
    /// Opaque per-sink hints (e.g. `{"kind": "file", "path": "..."}`) the
    /// host process resolves into constructed sinks before calling
    /// `EmitterBuilder::sink`. Shape is left to the host; this crate does
    /// not interpret it.
    pub sink_hints: Vec<Value>,
    pub allowed_schemas: AllowedSchemas,
    pub settings: Settings,
}

impl EmitterConfig {
    /// Parse a complete emitter configuration document: the optional
    /// `sinks` (a list of opaque hints), `allowed_schemas`, and `settings`
    /// keys. Unrecognized top-level keys are rejected.
    pub fn from_value(document: &Value) -> Result<Self> {
        let object = document
            .as_object()
            .ok_or_else(|| TelemetryError::schema("emitter configuration document must be an object".to_string()))?;

        for key in object.keys() {
            if !KNOWN_CONFIG_KEYS.contains(&key.as_str()) {
                return Err(TelemetryError::policy(key.clone(), "emitter configuration".to_string()));
            }
        }

        let sink_hints = match object.get("sinks") {
            Some(value) => value
                .as_array()
                .ok_or_else(|| TelemetryError::schema("\"sinks\" must be a list".to_string()))?
                .clone(),
            None => Vec::new(),
        };

        let allowed_schemas = match object.get("allowed_schemas") {
            Some(value) => AllowedSchemas::from_value(value)?,
            None => AllowedSchemas::new(),
        };

        let settings = match object.get("settings") {
            Some(value) => Settings::from_value(value)?,
            None => Settings::default(),
        };

        Ok(Self {
            sink_hints,
            allowed_schemas,
            settings,
        })
    }
}
