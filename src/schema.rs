//! Schema documents: shape validation and the `(id, version)` identity that
//! keys the [registry](crate::registry).
//!
//! A [`Schema`] wraps an already-parsed JSON Schema document. Registration
//! never accepts a document that violates the invariants from the data
//! model: required top-level fields, no `__`-prefixed direct properties,
//! and a well-formed `categories` list on every direct property.

use serde_json::Value;

use crate::error::{Result, TelemetryError};
use crate::extractor;

/// Duplicate-registration resolution strategy for [`crate::registry::SchemaRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Fail the registration with `SchemaConflictError`. The default.
    #[default]
    Raise,
    /// Keep the existing entry; the new document is discarded silently.
    Skip,
    /// Overwrite the existing entry with the new document.
    Allow,
}

impl std::str::FromStr for DuplicatePolicy {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "raise" => Ok(Self::Raise),
            "skip" => Ok(Self::Skip),
            "allow" => Ok(Self::Allow),
            other => Err(TelemetryError::conflict(
                "<unknown>",
                0,
                format!("unrecognized duplicate policy token {other:?}"),
            )),
        }
    }
}

/// An immutable, shape-validated JSON Schema document.
///
/// Cloning a `Schema` is cheap-ish (an `Arc`-free clone of the underlying
/// `serde_json::Value`); schemas are registered once and looked up many
/// times, never mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    document: Value,
}

impl Schema {
    /// Wrap and shape-validate a parsed schema document.
    ///
    /// Checks, in order: the document is a JSON Schema (Draft 7 semantics),
    /// the required top-level keys `$id`, `version`, `properties` are
    /// present, no direct property name starts with `__`, and every direct
    /// property carries a `categories` list honoring the `unrestricted`
    /// stand-alone rule.
    pub fn from_value(document: Value) -> Result<Self> {
        check_schema_shape(&document)?;
        Ok(Self { document })
    }

    /// The schema's `$id`.
    pub fn id(&self) -> &str {
        // Presence and type were checked in `from_value`.
        self.document["$id"].as_str().unwrap_or_default()
    }

    /// The schema's `version`.
    pub fn version(&self) -> i64 {
        self.document["version"].as_i64().unwrap_or_default()
    }

    /// The raw schema document, exactly as registered.
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// The `properties` object of the schema document.
    pub fn properties(&self) -> &serde_json::Map<String, Value> {
        static EMPTY: std::sync::OnceLock<serde_json::Map<String, Value>> = std::sync::OnceLock::new();
        self.document["properties"]
            .as_object()
            .unwrap_or_else(|| EMPTY.get_or_init(serde_json::Map::new))
    }
}

/// Generic JSON-Schema-validity check (Draft 7 semantics suffice), with no
/// opinion on this crate's own `categories`/`$id`/`version` conventions.
///
/// This is the primitive [`crate::validator::SchemaValidator::check_schema`]
/// delegates to; [`check_schema_shape`] layers the registry's stricter
/// requirements on top of it.
pub fn validate_is_json_schema(document: &Value) -> Result<()> {
    jsonschema::meta::validate(document)
        .map_err(|e| TelemetryError::schema(format!("document is not valid JSON Schema: {e}")))
}

/// Verify that `document` is well-formed JSON Schema and satisfies this
/// crate's required-field and `categories` invariants (I1, I2).
///
/// This is the `check_schema` half of the validator contract (§4.A):
/// distinct from `validate`, which checks an *instance* against an
/// already-accepted schema.
pub fn check_schema_shape(document: &Value) -> Result<()> {
    validate_is_json_schema(document)?;

    let id = document
        .get("$id")
        .and_then(Value::as_str)
        .ok_or_else(|| TelemetryError::schema("schema is missing required field \"$id\""))?;

    let _version = document
        .get("version")
        .and_then(Value::as_i64)
        .ok_or_else(|| TelemetryError::schema("schema is missing required integer field \"version\""))?;

    let properties = document
        .get("properties")
        .and_then(Value::as_object)
        .ok_or_else(|| TelemetryError::schema("schema is missing required field \"properties\""))?;

    for (name, prop_schema) in properties {
        if name.starts_with("__") {
            return Err(TelemetryError::schema(format!(
                "schema {id:?} has property {name:?} beginning with \"__\", which is reserved for envelope fields"
            )));
        }

        // A property's categories may live on the node directly, or be
        // reached through `$ref`/`allOf` (§3); resolve the same way the
        // extractor does at walk time rather than requiring a literal key.
        let fragments = extractor::categories_fragments(document, prop_schema);

        if fragments.is_empty() {
            return Err(TelemetryError::schema(format!(
                "all properties must have a \"categories\" field describing the type of data being collected; {name:?} does not have one"
            )));
        }

        let mut union = std::collections::HashSet::new();

        for fragment in &fragments {
            let categories = fragment.as_array().ok_or_else(|| {
                TelemetryError::schema(format!(
                    "the \"categories\" field of property {name:?} must be a list"
                ))
            })?;

            if categories.is_empty() {
                return Err(TelemetryError::schema(format!(
                    "the \"categories\" field of property {name:?} must not be empty"
                )));
            }

            for token in categories {
                let token = token.as_str().ok_or_else(|| {
                    TelemetryError::schema(format!(
                        "every entry in the \"categories\" list of property {name:?} must be a string"
                    ))
                })?;
                union.insert(token.to_string());
            }
        }

        if union.contains("unrestricted") && union.len() > 1 {
            return Err(TelemetryError::schema(format!(
                "\"unrestricted\" is a special category; properties with \"unrestricted\" in their categories list (here, {name:?}) cannot have other categories listed too"
            )));
        }
    }

    Ok(())
}
