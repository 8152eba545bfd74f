//! The schema registry (§4.D): a `(id, version) -> Schema` map guarded by
//! a read-write lock, so a long-lived [`EventEmitter`](crate::emitter::EventEmitter)
//! can register schemas once at startup and look them up on every
//! `record_event` call without contention in the common case.

use std::collections::HashMap;
use std::io::Read as _;
use std::sync::RwLock;

use serde_json::Value;

use crate::error::{Result, TelemetryError};
use crate::schema::{DuplicatePolicy, Schema};

/// Thread-safe `(id, version) -> Schema` registry.
///
/// Registration takes a write lock; lookups and introspection take a read
/// lock, so concurrent `record_event` calls against already-registered
/// schemas never block each other.
#[derive(Default)]
pub struct SchemaRegistry {
    schemas: RwLock<HashMap<(String, i64), Schema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an already-parsed schema document under `duplicate_policy`.
    ///
    /// - `Raise` (default): a pre-existing `(id, version)` entry is an
    ///   error.
    /// - `Skip`: a pre-existing entry is kept; `schema` is discarded
    ///   without error.
    /// - `Allow`: `schema` overwrites any pre-existing entry.
    pub fn register(&self, schema: Schema, duplicate_policy: DuplicatePolicy) -> Result<()> {
        let key = (schema.id().to_string(), schema.version());
        let mut schemas = self.schemas.write().expect("schema registry poisoned");

        if schemas.contains_key(&key) {
            match duplicate_policy {
                DuplicatePolicy::Raise => {
                    return Err(TelemetryError::conflict(
                        key.0,
                        key.1,
                        "a schema with this id and version is already registered",
                    ));
                }
                DuplicatePolicy::Skip => return Ok(()),
                DuplicatePolicy::Allow => {}
            }
        }

        schemas.insert(key, schema);
        Ok(())
    }

    /// Parse `document` as a schema (shape-validating it) and register it.
    pub fn register_from_value(&self, document: Value, duplicate_policy: DuplicatePolicy) -> Result<()> {
        self.register(Schema::from_value(document)?, duplicate_policy)
    }

    /// Parse a YAML- or JSON-encoded schema source and register it.
    ///
    /// JSON is valid YAML, so this one entry point covers both; the
    /// original event schemas this crate's data model is drawn from ship
    /// as YAML files on disk.
    pub fn register_from_source<R: std::io::Read>(
        &self,
        mut source: R,
        duplicate_policy: DuplicatePolicy,
    ) -> Result<()> {
        let mut text = String::new();
        source
            .read_to_string(&mut text)
            .map_err(|e| TelemetryError::schema(format!("failed to read schema source: {e}")))?;
        let document: Value = serde_yaml::from_str(&text)
            .map_err(|e| TelemetryError::schema(format!("failed to parse schema source: {e}")))?;
        self.register_from_value(document, duplicate_policy)
    }

    /// Look up a registered schema by `(id, version)`.
    pub fn lookup(&self, id: &str, version: i64) -> Result<Schema> {
        self.schemas
            .read()
            .expect("schema registry poisoned")
            .get(&(id.to_string(), version))
            .cloned()
            .ok_or_else(|| TelemetryError::unregistered(id, version))
    }

    /// Whether `(id, version)` is currently registered.
    pub fn contains(&self, id: &str, version: i64) -> bool {
        self.schemas
            .read()
            .expect("schema registry poisoned")
            .contains_key(&(id.to_string(), version))
    }

    /// Number of registered `(id, version)` entries.
    pub fn len(&self) -> usize {
        self.schemas.read().expect("schema registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every registered `(id, version)` pair, in unspecified order.
    pub fn ids(&self) -> Vec<(String, i64)> {
        self.schemas
            .read()
            .expect("schema registry poisoned")
            .keys()
            .cloned()
            .collect()
    }
}
