//! Event envelopes (§4.E data model): the `__`-prefixed fields stitched
//! onto a redacted event body before it reaches a sink.

use chrono::{SecondsFormat, Utc};
use serde_json::Value;

use crate::schema::Schema;

/// Version of the envelope's own shape, independent of any individual
/// event schema's `version`. Bumped only if the set of `__`-prefixed
/// fields themselves changes.
pub const TELEMETRY_METADATA_VERSION: i64 = 1;

/// A redacted event body plus the envelope fields every capsule carries,
/// regardless of which schema produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Capsule {
    body: Value,
}

impl Capsule {
    /// Stitch `redacted_body` (already schema-validated and filtered) into
    /// a capsule for `schema`, stamped with the current UTC time.
    ///
    /// `redacted_body` must be a JSON object; reserved fields are merged
    /// in alongside its keys, which are themselves guaranteed free of the
    /// `__` prefix by schema registration (I2).
    pub fn wrap(redacted_body: Value, schema: &Schema) -> Self {
        Self::wrap_at(redacted_body, schema, Utc::now())
    }

    /// As [`wrap`](Self::wrap), with an explicit timestamp — the seam
    /// tests use to assert on exact envelope contents.
    pub fn wrap_at(redacted_body: Value, schema: &Schema, timestamp: chrono::DateTime<Utc>) -> Self {
        let mut object = redacted_body.as_object().cloned().unwrap_or_default();

        object.insert(
            "__timestamp__".to_string(),
            Value::String(timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        object.insert("__schema__".to_string(), Value::String(schema.id().to_string()));
        object.insert(
            "__schema_version__".to_string(),
            Value::Number(schema.version().into()),
        );
        object.insert(
            "__metadata_version__".to_string(),
            Value::Number(TELEMETRY_METADATA_VERSION.into()),
        );

        Self {
            body: Value::Object(object),
        }
    }

    /// The complete capsule, ready for serialization to a sink.
    pub fn as_value(&self) -> &Value {
        &self.body
    }

    pub fn into_value(self) -> Value {
        self.body
    }
}
